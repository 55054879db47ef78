//! Ship-ship collision
//!
//! Broad phase over bounding radii, SAT narrow phase over both hull
//! polygons, and an impulse response tuned for slow, heavy hulls. Position
//! integration runs here, split into substeps, so that fast ships cannot
//! tunnel through each other inside a single tick.

use crate::config::SimConfig;
use crate::events::{EventQueue, SimEvent};
use crate::math::{wrap_angle, Vec2, Vec2Ext};
use crate::models::{Ship, WorldState};
use crate::simulation::planks;

/// Effective mass used for every ship in the impulse calculation. Collision
/// response is intentionally uniform; `Ship.mass` only shapes thrust.
pub const COLLISION_EFFECTIVE_MASS: f32 = 1000.0;
/// Restitution of hull-on-hull impacts.
pub const RESTITUTION: f32 = 0.05;

/// Result of a positive SAT test.
#[derive(Debug, Clone, Copy)]
pub struct SatContact {
    /// Collision normal, oriented from ship A toward ship B.
    pub normal: Vec2,
    /// Overlap depth along the normal.
    pub penetration: f32,
    /// Approximate contact point (midpoint of the two centers).
    pub contact_point: Vec2,
}

/// Project a polygon onto an axis, returning the `(min, max)` interval.
fn project(polygon: &[Vec2], axis: Vec2) -> (f32, f32) {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for vertex in polygon {
        let d = vertex.dot(&axis);
        min = min.min(d);
        max = max.max(d);
    }
    (min, max)
}

/// Separating Axis Theorem over the union of both polygons' edge normals.
///
/// Returns the minimum-overlap axis and depth when the polygons intersect,
/// `None` as soon as any axis separates them.
pub fn sat_overlap(poly_a: &[Vec2], poly_b: &[Vec2]) -> Option<(Vec2, f32)> {
    let mut best_axis = Vec2::zeros();
    let mut best_overlap = f32::MAX;

    for polygon in [poly_a, poly_b] {
        for i in 0..polygon.len() {
            let edge = polygon[(i + 1) % polygon.len()] - polygon[i];
            let axis = edge.perp_ccw().normalized_or_zero();
            if axis == Vec2::zeros() {
                continue;
            }
            let (min_a, max_a) = project(poly_a, axis);
            let (min_b, max_b) = project(poly_b, axis);
            let overlap = max_a.min(max_b) - min_a.max(min_b);
            if overlap <= 0.0 {
                return None;
            }
            if overlap < best_overlap {
                best_overlap = overlap;
                best_axis = axis;
            }
        }
    }
    Some((best_axis, best_overlap))
}

/// Narrow-phase test between two ships. Uses the deck polygon when one is
/// fitted, the hull otherwise.
pub fn ship_contact(a: &Ship, b: &Ship) -> Option<SatContact> {
    let poly_a: Vec<Vec2> = match a.deck_polygon() {
        Some(deck) => deck.iter().map(|v| a.local_to_world(*v)).collect(),
        None => a.world_hull(),
    };
    let poly_b: Vec<Vec2> = match b.deck_polygon() {
        Some(deck) => deck.iter().map(|v| b.local_to_world(*v)).collect(),
        None => b.world_hull(),
    };

    let (mut normal, penetration) = sat_overlap(&poly_a, &poly_b)?;
    // Orient the normal from A toward B.
    if (b.position - a.position).dot(&normal) < 0.0 {
        normal = -normal;
    }
    Some(SatContact {
        normal,
        penetration,
        contact_point: (a.position + b.position) * 0.5,
    })
}

/// Apply positional separation, impulse, angular kick, and post-impact
/// damping to a colliding pair.
pub fn resolve_ship_collision(a: &mut Ship, b: &mut Ship, contact: &SatContact) {
    let n = contact.normal;

    // Each ship gives way by half the penetration.
    let half = n * (contact.penetration * 0.5);
    a.position -= half;
    b.position += half;

    let v_n = (b.velocity - a.velocity).dot(&n);
    if v_n > 0.0 {
        // Already separating.
        return;
    }

    let m_a = COLLISION_EFFECTIVE_MASS;
    let m_b = COLLISION_EFFECTIVE_MASS;
    let j = -(1.0 + RESTITUTION) * v_n / (m_a + m_b);
    a.velocity -= n * (j * m_b);
    b.velocity += n * (j * m_a);

    // Angular kick from the impact arm, kept tiny so collisions nudge
    // headings rather than spin ships.
    let spin_scale = (v_n.abs() * 0.0005).min(0.002);
    let arm_a = contact.contact_point - a.position;
    let arm_b = contact.contact_point - b.position;
    a.angular_velocity -= arm_a.cross2(&n) * spin_scale;
    b.angular_velocity += arm_b.cross2(&n) * spin_scale;

    let linear_damp = (1.0 - v_n.abs() * 0.01).max(0.7);
    let angular_damp = (1.0 - v_n.abs() * 0.015).max(0.6);
    a.velocity *= linear_damp;
    b.velocity *= linear_damp;
    a.angular_velocity *= angular_damp;
    b.angular_velocity *= angular_damp;
}

/// One collision pass over every ship pair in ascending id order.
fn resolve_all_pairs(world: &mut WorldState, config: &SimConfig, events: &mut EventQueue) {
    let tick = world.tick;
    let count = world.ships.len();
    for i in 0..count {
        for j in (i + 1)..count {
            let (head, tail) = world.ships.split_at_mut(j);
            let a = &mut head[i];
            let b = &mut tail[0];

            let reach = a.bounding_radius() + b.bounding_radius() + 2.0 * config.broad_phase_margin;
            if (b.position - a.position).norm() >= reach {
                continue;
            }
            let Some(contact) = ship_contact(a, b) else {
                continue;
            };

            resolve_ship_collision(a, b, &contact);
            planks::apply_radial_damage(a, contact.contact_point, contact.penetration, tick, events);
            planks::apply_radial_damage(b, contact.contact_point, contact.penetration, tick, events);
            events.push(SimEvent::ShipsCollided {
                ship_a: a.id,
                ship_b: b.id,
                penetration: contact.penetration,
                tick,
            });
        }
    }
}

/// Integrate ship positions and resolve collisions, in
/// `config.collision_substeps` substeps of `dt / K` each.
pub fn integrate_and_collide(
    world: &mut WorldState,
    config: &SimConfig,
    dt: f32,
    events: &mut EventQueue,
) {
    let substeps = config.collision_substeps.max(1);
    let sub_dt = dt / substeps as f32;
    for _ in 0..substeps {
        for ship in &mut world.ships {
            ship.position += ship.velocity * sub_dt;
            ship.rotation = wrap_angle(ship.rotation + ship.angular_velocity * sub_dt);
        }
        resolve_all_pairs(world, config, events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(center: Vec2, half: f32) -> Vec<Vec2> {
        vec![
            center + Vec2::new(-half, -half),
            center + Vec2::new(half, -half),
            center + Vec2::new(half, half),
            center + Vec2::new(-half, half),
        ]
    }

    #[test]
    fn test_sat_detects_overlap() {
        let a = square(Vec2::zeros(), 10.0);
        let b = square(Vec2::new(15.0, 0.0), 10.0);
        let (axis, depth) = sat_overlap(&a, &b).unwrap();
        assert!((depth - 5.0).abs() < 1e-4);
        assert!(axis.x.abs() > 0.99);
    }

    #[test]
    fn test_sat_rejects_separated() {
        let a = square(Vec2::zeros(), 10.0);
        let b = square(Vec2::new(25.0, 0.0), 10.0);
        assert!(sat_overlap(&a, &b).is_none());
    }

    #[test]
    fn test_head_on_collision_separates_and_bounces() {
        let mut a = Ship::new(1, Vec2::new(0.0, 0.0), Ship::rectangle_hull(80.0, 80.0));
        let mut b = Ship::new(2, Vec2::new(120.0, 0.0), Ship::rectangle_hull(80.0, 80.0));
        a.velocity = Vec2::new(10.0, 0.0);
        b.velocity = Vec2::new(-10.0, 0.0);

        let contact = ship_contact(&a, &b).unwrap();
        assert!((contact.penetration - 40.0).abs() < 1e-3);
        assert!(contact.normal.approx_eq(&Vec2::new(1.0, 0.0), 1e-4));

        resolve_ship_collision(&mut a, &mut b, &contact);
        // Separated by half the penetration each.
        assert!((a.position.x - -20.0).abs() < 1e-3);
        assert!((b.position.x - 140.0).abs() < 1e-3);
        // Approach reversed into a slow bounce.
        assert!(a.velocity.x < 0.0);
        assert!(b.velocity.x > 0.0);
    }

    #[test]
    fn test_separating_ships_skip_impulse() {
        let mut a = Ship::new(1, Vec2::new(0.0, 0.0), Ship::rectangle_hull(80.0, 80.0));
        let mut b = Ship::new(2, Vec2::new(100.0, 0.0), Ship::rectangle_hull(80.0, 80.0));
        a.velocity = Vec2::new(-5.0, 0.0);
        b.velocity = Vec2::new(5.0, 0.0);
        let contact = ship_contact(&a, &b).unwrap();
        resolve_ship_collision(&mut a, &mut b, &contact);
        // Positions separate but velocities are untouched.
        assert_eq!(a.velocity, Vec2::new(-5.0, 0.0));
        assert_eq!(b.velocity, Vec2::new(5.0, 0.0));
    }

    #[test]
    fn test_substeps_prevent_tunneling() {
        let mut world = WorldState::new();
        let mut fast = Ship::new(1, Vec2::new(-150.0, 0.0), Ship::rectangle_hull(40.0, 40.0));
        fast.velocity = Vec2::new(9000.0, 0.0);
        fast.max_speed = 10_000.0;
        world.add_ship(fast).unwrap();
        world
            .add_ship(Ship::new(2, Vec2::new(0.0, 0.0), Ship::rectangle_hull(40.0, 40.0)))
            .unwrap();

        let config = SimConfig::default();
        let mut events = EventQueue::default();
        integrate_and_collide(&mut world, &config, 1.0 / 30.0, &mut events);
        // 300 units of travel in one tick jumps clear over the target in a
        // single step; the substeps must still register the hit.
        assert!(events.drain().iter().any(|e| matches!(e, SimEvent::ShipsCollided { .. })));
    }

    #[test]
    fn test_collision_emits_event_and_damage() {
        let mut world = WorldState::new();
        let mut a = Ship::new(1, Vec2::new(0.0, 0.0), Ship::rectangle_hull(80.0, 80.0));
        crate::simulation::planks::fit_plank_ring(&mut a, 100);
        a.velocity = Vec2::new(10.0, 0.0);
        let mut b = Ship::new(2, Vec2::new(150.0, 0.0), Ship::rectangle_hull(80.0, 80.0));
        b.velocity = Vec2::new(-10.0, 0.0);
        world.add_ship(a).unwrap();
        world.add_ship(b).unwrap();

        let config = SimConfig::default();
        let mut events = EventQueue::default();
        integrate_and_collide(&mut world, &config, 1.0 / 30.0, &mut events);

        let healths = planks::segment_healths(world.ship(1).unwrap());
        // The contact sits on ship A's starboard side (segment 0).
        assert!(healths[0] < 100.0);
        assert!(events.drain().iter().any(|e| matches!(e, SimEvent::ShipsCollided { .. })));
    }
}
