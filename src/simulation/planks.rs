//! Plank damage and the hull gap model
//!
//! Planks are health-bearing modules, each protecting one hull edge. A plank
//! at zero health leaves its edge open: player motion passes through the gap
//! while healthy edges still act as collision barriers. Collision damage is
//! applied radially, mapping the contact point to a hull angle.

use log::debug;

use crate::events::{EventQueue, SimEvent};
use crate::math::{positive_angle, Vec2};
use crate::models::{Module, ModuleKind, Ship};

/// Spread of collision falloff damage around the primary plank, degrees.
const DAMAGE_SPREAD_DEG: f32 = 30.0;
/// Hard cap on damage from a single collision.
const MAX_COLLISION_DAMAGE: f32 = 15.0;
/// Penetration-to-damage conversion factor.
const DAMAGE_PER_PENETRATION: f32 = 20.0;

/// Plank health indexed by hull segment, `100.0` for segments without a
/// plank module. Empty when the ship carries no planks at all.
pub fn segment_healths(ship: &Ship) -> Vec<f32> {
    let count = ship.plank_count();
    let mut healths = vec![100.0; count];
    for module in &ship.modules {
        if let Some((segment, health)) = module.as_plank() {
            if segment < count {
                healths[segment] = health;
            }
        }
    }
    healths
}

/// Whether hull edge `edge` contributes a collision barrier. Edges map onto
/// planks by `edge mod plank_count`; a ship without planks is fully solid.
pub fn hull_edge_solid(healths: &[f32], edge: usize) -> bool {
    if healths.is_empty() {
        return true;
    }
    healths[edge % healths.len()] > 0.0
}

/// Whether any plank on the ship is destroyed.
pub fn has_destroyed_planks(ship: &Ship) -> bool {
    ship.modules
        .iter()
        .any(|m| matches!(m.kind, ModuleKind::Plank { health, .. } if health <= 0.0))
}

/// World-space hull edges that still carry a collision barrier.
pub fn solid_world_segments(ship: &Ship) -> Vec<(Vec2, Vec2)> {
    let healths = segment_healths(ship);
    let hull = ship.world_hull();
    let mut segments = Vec::with_capacity(hull.len());
    for i in 0..hull.len() {
        if hull_edge_solid(&healths, i) {
            segments.push((hull[i], hull[(i + 1) % hull.len()]));
        }
    }
    segments
}

/// Apply radial collision damage around a world-space contact point.
///
/// The contact maps into ship-local coordinates; its polar angle selects the
/// primary plank, and neighbors inside a 30° spread take falloff damage.
/// Returns the damage dealt to the primary plank.
pub fn apply_radial_damage(
    ship: &mut Ship,
    contact_world: Vec2,
    penetration: f32,
    tick: u64,
    events: &mut EventQueue,
) -> f32 {
    let plank_count = ship.plank_count();
    if plank_count == 0 {
        return 0.0;
    }
    let damage = (penetration * DAMAGE_PER_PENETRATION).min(MAX_COLLISION_DAMAGE);
    if damage <= 0.0 {
        return 0.0;
    }

    let local = ship.world_to_local(contact_world);
    let theta = positive_angle(local.y.atan2(local.x));
    let segment_angle = std::f32::consts::TAU / plank_count as f32;
    let primary = ((theta / segment_angle) as usize).min(plank_count - 1);

    let spread = ((DAMAGE_SPREAD_DEG.to_radians() / segment_angle).ceil() as i32).max(1);
    damage_plank(ship, primary, damage, tick, events);
    for offset in 1..=spread {
        let falloff = damage * (1.0 - offset as f32 / (spread + 1) as f32) * 0.5;
        let left = (primary as i32 - offset).rem_euclid(plank_count as i32) as usize;
        let right = (primary as i32 + offset).rem_euclid(plank_count as i32) as usize;
        damage_plank(ship, left, falloff, tick, events);
        if right != left {
            damage_plank(ship, right, falloff, tick, events);
        }
    }
    damage
}

/// Reduce one plank's health, clamping at zero and emitting
/// [`SimEvent::PlankDestroyed`] on the transition to destroyed.
pub fn damage_plank(
    ship: &mut Ship,
    segment: usize,
    amount: f32,
    tick: u64,
    events: &mut EventQueue,
) {
    let ship_id = ship.id;
    for module in &mut ship.modules {
        if let ModuleKind::Plank { segment_index, health } = &mut module.kind {
            if *segment_index == segment && *health > 0.0 {
                *health = (*health - amount).max(0.0);
                if *health == 0.0 {
                    debug!("ship {} plank {} destroyed at tick {}", ship_id, segment, tick);
                    events.push(SimEvent::PlankDestroyed { ship_id, segment_index: segment, tick });
                }
            }
        }
    }
}

/// Attach a full ring of healthy planks, one per hull edge.
pub fn fit_plank_ring(ship: &mut Ship, first_module_id: u32) {
    let edge_count = ship.hull.len();
    for i in 0..edge_count {
        let a = ship.hull[i];
        let b = ship.hull[(i + 1) % edge_count];
        let midpoint = (a + b) * 0.5;
        ship.modules.push(Module::new(
            first_module_id + i as u32,
            midpoint,
            ModuleKind::Plank { segment_index: i, health: 100.0 },
        ));
    }
}
