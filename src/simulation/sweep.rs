//! Swept circle vs plank-aware hull
//!
//! Continuous collision of a player's motion segment against a ship
//! boundary. With every plank healthy the boundary is a closed polygon and a
//! standard swept-disc cast applies, honoring container semantics for
//! players already on deck. With any plank destroyed the boundary decays
//! into individual solid segments with gaps between them, and each segment
//! is tested on its own, so a path through a gap produces no collision.

use crate::math::{closest_point_on_segment, point_in_polygon, Vec2, Vec2Ext};
use crate::models::Ship;
use crate::simulation::planks;

/// Motion shorter than this is ignored outright.
const MIN_MOTION: f32 = 1e-3;
/// Segments shorter than this (squared) are degenerate and skipped.
const MIN_SEGMENT_LENGTH_SQ: f32 = 1e-4;

/// Outcome of a swept collision test.
#[derive(Debug, Clone, Copy)]
pub struct SweepResult {
    /// Where the mover ends up.
    pub new_position: Vec2,
    /// Velocity after tangential projection (no friction; callers apply
    /// their own).
    pub new_velocity: Vec2,
    /// Whether any boundary was hit.
    pub collided: bool,
    /// Surface normal at the hit, pointing away from the surface toward the
    /// mover.
    pub normal: Vec2,
    /// How deep the proposed end point sat behind the surface.
    pub penetration: f32,
    /// Closest boundary point of the hit.
    pub contact_point: Vec2,
}

impl SweepResult {
    fn miss(end: Vec2, velocity: Vec2) -> Self {
        Self {
            new_position: end,
            new_velocity: velocity,
            collided: false,
            normal: Vec2::zeros(),
            penetration: 0.0,
            contact_point: end,
        }
    }
}

/// Sweep a disc of `radius` from `start` to `end` against a ship's
/// plank-aware boundary. `epsilon` widens the disc into a skin band so
/// resolved positions do not re-collide next tick.
pub fn swept_circle_vs_ship(
    start: Vec2,
    end: Vec2,
    radius: f32,
    velocity: Vec2,
    ship: &Ship,
    epsilon: f32,
) -> SweepResult {
    if (end - start).norm() < MIN_MOTION {
        return SweepResult::miss(end, velocity);
    }

    if planks::has_destroyed_planks(ship) {
        swept_vs_segments(start, end, radius + epsilon, velocity, &planks::solid_world_segments(ship))
    } else {
        swept_vs_polygon(start, end, radius + epsilon, velocity, &ship.world_hull())
    }
}

/// Minimum distance between two segments.
fn segment_distance(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> f32 {
    if segments_intersect(p1, p2, q1, q2) {
        return 0.0;
    }
    let d1 = (p1 - closest_point_on_segment(p1, q1, q2)).norm();
    let d2 = (p2 - closest_point_on_segment(p2, q1, q2)).norm();
    let d3 = (q1 - closest_point_on_segment(q1, p1, p2)).norm();
    let d4 = (q2 - closest_point_on_segment(q2, p1, p2)).norm();
    d1.min(d2).min(d3).min(d4)
}

/// Proper segment intersection via orientation signs.
fn segments_intersect(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> bool {
    let d = |a: Vec2, b: Vec2, c: Vec2| (b - a).cross2(&(c - a));
    let d1 = d(q1, q2, p1);
    let d2 = d(q1, q2, p2);
    let d3 = d(p1, p2, q1);
    let d4 = d(p1, p2, q2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Gap case: every solid segment is a free-standing barrier.
fn swept_vs_segments(
    start: Vec2,
    end: Vec2,
    skin: f32,
    velocity: Vec2,
    segments: &[(Vec2, Vec2)],
) -> SweepResult {
    let mut best: Option<(f32, Vec2)> = None;
    for &(a, b) in segments {
        if (b - a).norm_squared() < MIN_SEGMENT_LENGTH_SQ {
            continue;
        }
        if segment_distance(start, end, a, b) >= skin {
            continue;
        }
        let closest = closest_point_on_segment(end, a, b);
        let distance = (end - closest).norm();
        if best.is_none_or(|(d, _)| distance < d) {
            best = Some((distance, closest));
        }
    }

    let Some((distance, closest)) = best else {
        return SweepResult::miss(end, velocity);
    };

    let mut normal = (end - closest).normalized_or_zero();
    if normal == Vec2::zeros() {
        // End landed exactly on the barrier; push back the way we came.
        normal = (start - closest).normalized_or_zero();
    }
    let new_velocity = velocity - normal * velocity.dot(&normal);
    SweepResult {
        new_position: closest + normal * skin,
        new_velocity,
        collided: true,
        normal,
        penetration: (skin - distance).max(0.0),
        contact_point: closest,
    }
}

/// Closed-polygon case with container semantics for movers already inside.
fn swept_vs_polygon(
    start: Vec2,
    end: Vec2,
    skin: f32,
    velocity: Vec2,
    polygon: &[Vec2],
) -> SweepResult {
    if point_in_polygon(start, polygon) {
        if point_in_polygon(end, polygon) {
            return SweepResult::miss(end, velocity);
        }
        // Exiting without permission: clamp back just inside the boundary.
        let (closest, _) = closest_boundary_point(end, polygon);
        let outward = (end - closest).normalized_or_zero();
        let new_velocity = velocity - outward * velocity.dot(&outward);
        return SweepResult {
            new_position: closest - outward * skin,
            new_velocity,
            collided: true,
            normal: -outward,
            penetration: (end - closest).norm() + skin,
            contact_point: closest,
        };
    }

    // Approaching from open water: earliest time of impact over all edges
    // and vertex caps.
    let motion = end - start;
    let mut best: Option<(f32, Vec2, Vec2)> = None; // (t, normal, contact)

    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        let edge = b - a;
        if edge.norm_squared() < MIN_SEGMENT_LENGTH_SQ {
            continue;
        }
        // CCW polygon: the interior lies left of the edge, outward is right.
        let outward = -edge.perp_ccw().normalized_or_zero();

        let approach = motion.dot(&outward);
        let start_height = (start - a).dot(&outward);
        if approach < 0.0 && start_height >= 0.0 {
            // Starting already inside the skin band counts as contact at
            // t = 0 so slow approaches cannot seep through.
            let t = ((skin - start_height) / approach).max(0.0);
            if t <= 1.0 {
                let hit = start + motion * t;
                let along = (hit - a).dot(&edge) / edge.norm_squared();
                if (0.0..=1.0).contains(&along) {
                    if best.is_none_or(|(bt, _, _)| t < bt) {
                        best = Some((t, outward, a + edge * along));
                    }
                }
            }
        }

        // Vertex cap at `a` (each vertex is the start of exactly one edge).
        if let Some(t) = circle_cast(start, motion, a, skin) {
            if best.is_none_or(|(bt, _, _)| t < bt) {
                let hit = start + motion * t;
                best = Some((t, (hit - a).normalized_or_zero(), a));
            }
        }
    }

    let Some((t, normal, contact)) = best else {
        return SweepResult::miss(end, velocity);
    };

    let new_position = start + motion * t;
    let new_velocity = velocity - normal * velocity.dot(&normal);
    SweepResult {
        new_position,
        new_velocity,
        collided: true,
        normal,
        penetration: ((end - contact).norm() - skin).max(0.0),
        contact_point: contact,
    }
}

/// Closest point on the polygon boundary, with its distance.
fn closest_boundary_point(point: Vec2, polygon: &[Vec2]) -> (Vec2, f32) {
    let mut best_point = polygon[0];
    let mut best_distance = f32::MAX;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        let closest = closest_point_on_segment(point, a, b);
        let distance = (point - closest).norm();
        if distance < best_distance {
            best_distance = distance;
            best_point = closest;
        }
    }
    (best_point, best_distance)
}

/// Earliest `t ∈ [0, 1]` at which `start + motion·t` comes within `r` of
/// `center`, if the motion approaches at all.
fn circle_cast(start: Vec2, motion: Vec2, center: Vec2, r: f32) -> Option<f32> {
    let to_start = start - center;
    let a = motion.norm_squared();
    if a < MIN_SEGMENT_LENGTH_SQ {
        return None;
    }
    let b = 2.0 * to_start.dot(&motion);
    let c = to_start.norm_squared() - r * r;
    if c < 0.0 {
        // Already inside the cap; not an entry event.
        return None;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / (2.0 * a);
    (0.0..=1.0).contains(&t).then_some(t)
}
