//! 2D math primitives for the BROADSIDE simulation.
//!
//! All simulation geometry lives on a flat water plane, so the whole engine
//! runs on `nalgebra::Vector2<f32>` plus a handful of game-specific
//! operations (perpendicular, 2D cross product, rotation by angle) and the
//! polygon routines shared by collision, carrier detection, and the swept
//! tests.

use nalgebra::Vector2;

/// The 2D vector type used throughout the simulation.
pub type Vec2 = Vector2<f32>;

/// Length below which a vector is treated as zero when normalizing.
pub const NORMALIZE_EPSILON: f32 = 1e-6;

/// Game-specific extensions over the nalgebra vector type.
pub trait Vec2Ext {
    /// Counter-clockwise perpendicular: `perp(x, y) = (-y, x)`.
    fn perp_ccw(&self) -> Vec2;
    /// 2D cross product, returning the scalar z component.
    fn cross2(&self, other: &Vec2) -> f32;
    /// Rotate by `angle` radians (counter-clockwise).
    fn rotated(&self, angle: f32) -> Vec2;
    /// Unit vector in the same direction, or zero if shorter than
    /// [`NORMALIZE_EPSILON`].
    fn normalized_or_zero(&self) -> Vec2;
    /// Component-wise equality within `tolerance`.
    fn approx_eq(&self, other: &Vec2, tolerance: f32) -> bool;
    /// Whether both components are finite.
    fn is_finite(&self) -> bool;
}

impl Vec2Ext for Vec2 {
    fn perp_ccw(&self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    fn cross2(&self, other: &Vec2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    fn rotated(&self, angle: f32) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    fn normalized_or_zero(&self) -> Vec2 {
        let len = self.norm();
        if len < NORMALIZE_EPSILON {
            Vec2::zeros()
        } else {
            self / len
        }
    }

    fn approx_eq(&self, other: &Vec2, tolerance: f32) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Wrap an angle into `[-π, π]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let two_pi = std::f32::consts::TAU;
    let mut wrapped = angle % two_pi;
    if wrapped > std::f32::consts::PI {
        wrapped -= two_pi;
    } else if wrapped < -std::f32::consts::PI {
        wrapped += two_pi;
    }
    wrapped
}

/// Shortest signed difference `a - b`, wrapped into `[-π, π]`.
pub fn angle_diff(a: f32, b: f32) -> f32 {
    wrap_angle(a - b)
}

/// Map an angle into `[0, 2π)`.
pub fn positive_angle(angle: f32) -> f32 {
    let wrapped = angle % std::f32::consts::TAU;
    if wrapped < 0.0 {
        wrapped + std::f32::consts::TAU
    } else {
        wrapped
    }
}

/// Closest point to `point` on the segment `[a, b]`.
pub fn closest_point_on_segment(point: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < NORMALIZE_EPSILON {
        return a;
    }
    let t = ((point - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Point-in-polygon test by ray crossing. The polygon is closed implicitly
/// (last vertex connects back to the first).
pub fn point_in_polygon(point: Vec2, polygon: &[Vec2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Distance from `point` to the nearest edge of `polygon`.
pub fn distance_to_polygon_edge(point: Vec2, polygon: &[Vec2]) -> f32 {
    let mut best = f32::MAX;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        let closest = closest_point_on_segment(point, a, b);
        best = best.min((point - closest).norm());
    }
    best
}

/// Depth of `point` inside `polygon`: the inward distance to the nearest
/// edge when inside, `None` when outside.
pub fn polygon_penetration(point: Vec2, polygon: &[Vec2]) -> Option<f32> {
    if point_in_polygon(point, polygon) {
        Some(distance_to_polygon_edge(point, polygon))
    } else {
        None
    }
}
