//! Active ship models
//!
//! A ship is a rigid body on the water plane: a hull polygon in local
//! coordinates, a pose (position + rotation), linear and angular velocity,
//! and an ordered list of modules attached to the deck.

use serde::{Deserialize, Serialize};

use crate::math::{Vec2, Vec2Ext};
use crate::models::module::{Module, ModuleKind};
use crate::models::EntityId;

/// A ship active in the simulation.
///
/// The hull polygon is counter-clockwise in ship-local coordinates and
/// closed implicitly. Physical properties are fixed at spawn; pose and
/// velocities evolve each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    /// Unique ship identifier.
    pub id: EntityId,
    /// World position of the hull origin.
    pub position: Vec2,
    /// Orientation angle in radians, wrapped to `[-π, π]`.
    pub rotation: f32,
    /// Linear velocity (units/s).
    pub velocity: Vec2,
    /// Angular velocity (rad/s).
    pub angular_velocity: f32,
    /// Hull polygon in ship-local coordinates, counter-clockwise.
    pub hull: Vec<Vec2>,
    /// Ordered module list. Modules are owned exclusively by their ship.
    pub modules: Vec<Module>,
    /// Hull integrity.
    pub health: f32,
    /// Mass (governs thrust response, not collision response).
    pub mass: f32,
    /// Moment of inertia about the hull origin.
    pub moment_of_inertia: f32,
    /// Speed cap enforced after every tick (units/s).
    pub max_speed: f32,
    /// Angular velocity cap enforced after every tick (rad/s).
    pub turn_rate: f32,
    /// Per-tick linear velocity retention, in `(0, 1]`.
    pub water_drag: f32,
    /// Per-tick angular velocity retention, in `(0, 1]`.
    pub angular_drag: f32,
}

impl Ship {
    /// Create a stationary ship with default physical properties.
    pub fn new(id: EntityId, position: Vec2, hull: Vec<Vec2>) -> Self {
        Self {
            id,
            position,
            rotation: 0.0,
            velocity: Vec2::zeros(),
            angular_velocity: 0.0,
            hull,
            modules: Vec::new(),
            health: 100.0,
            mass: 1000.0,
            moment_of_inertia: 50_000.0,
            max_speed: 60.0,
            turn_rate: 1.2,
            water_drag: 0.98,
            angular_drag: 0.95,
        }
    }

    /// Axis-aligned rectangular hull centered on the origin, counter-clockwise.
    pub fn rectangle_hull(half_width: f32, half_height: f32) -> Vec<Vec2> {
        vec![
            Vec2::new(-half_width, -half_height),
            Vec2::new(half_width, -half_height),
            Vec2::new(half_width, half_height),
            Vec2::new(-half_width, half_height),
        ]
    }

    /// Largest hull vertex distance from the origin. Broad-phase callers add
    /// their own margin on top.
    pub fn bounding_radius(&self) -> f32 {
        self.hull.iter().map(|v| v.norm()).fold(0.0, f32::max)
    }

    /// Transform a ship-local point into world coordinates.
    pub fn local_to_world(&self, local: Vec2) -> Vec2 {
        self.position + local.rotated(self.rotation)
    }

    /// Transform a world point into ship-local coordinates.
    pub fn world_to_local(&self, world: Vec2) -> Vec2 {
        (world - self.position).rotated(-self.rotation)
    }

    /// Hull polygon transformed into world coordinates.
    pub fn world_hull(&self) -> Vec<Vec2> {
        self.hull.iter().map(|v| self.local_to_world(*v)).collect()
    }

    /// Velocity of the rigid-body point at `offset` from the ship center,
    /// where `offset` is expressed in world axes.
    pub fn velocity_at_offset(&self, offset: Vec2) -> Vec2 {
        self.velocity + offset.perp_ccw() * self.angular_velocity
    }

    /// Velocity of the rigid-body point at a ship-local position.
    pub fn velocity_at_local(&self, local: Vec2) -> Vec2 {
        self.velocity_at_offset(local.rotated(self.rotation))
    }

    /// Steering scalar of the first helm module, zero when no helm exists.
    pub fn helm_steering(&self) -> f32 {
        self.modules
            .iter()
            .find_map(|m| match m.kind {
                ModuleKind::Helm { steering } => Some(steering.clamp(-1.0, 1.0)),
                _ => None,
            })
            .unwrap_or(0.0)
    }

    /// Iterator over `(openness, wind_efficiency)` of every mast.
    pub fn masts(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.modules.iter().filter_map(|m| match m.kind {
            ModuleKind::Mast { openness, wind_efficiency } => Some((openness, wind_efficiency)),
            _ => None,
        })
    }

    /// Number of plank modules on the hull.
    pub fn plank_count(&self) -> usize {
        self.modules.iter().filter(|m| m.as_plank().is_some()).count()
    }

    /// Walkable deck polygon in local coordinates, when a deck module is
    /// present.
    pub fn deck_polygon(&self) -> Option<&[Vec2]> {
        self.modules.iter().find_map(|m| match &m.kind {
            ModuleKind::Deck { polygon } => Some(polygon.as_slice()),
            _ => None,
        })
    }

    /// Look up a module by id.
    pub fn module(&self, module_id: EntityId) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == module_id)
    }

    /// Mutable module lookup.
    pub fn module_mut(&mut self, module_id: EntityId) -> Option<&mut Module> {
        self.modules.iter_mut().find(|m| m.id == module_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ship() -> Ship {
        Ship::new(1, Vec2::new(100.0, 200.0), Ship::rectangle_hull(100.0, 50.0))
    }

    #[test]
    fn test_bounding_radius() {
        let ship = test_ship();
        let expected = (100.0f32 * 100.0 + 50.0 * 50.0).sqrt();
        assert!((ship.bounding_radius() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_local_world_round_trip() {
        let mut ship = test_ship();
        ship.rotation = 0.7;
        let local = Vec2::new(30.0, -12.0);
        let back = ship.world_to_local(ship.local_to_world(local));
        assert!(back.approx_eq(&local, 1e-4));
    }

    #[test]
    fn test_velocity_at_offset_spins_with_ship() {
        let mut ship = test_ship();
        ship.angular_velocity = 2.0;
        // A point directly ahead of center moves sideways under pure spin.
        let v = ship.velocity_at_offset(Vec2::new(10.0, 0.0));
        assert!(v.approx_eq(&Vec2::new(0.0, 20.0), 1e-4));
    }

    #[test]
    fn test_helm_steering_defaults_to_zero() {
        let mut ship = test_ship();
        assert_eq!(ship.helm_steering(), 0.0);
        ship.modules.push(Module::new(
            10,
            Vec2::zeros(),
            ModuleKind::Helm { steering: -2.0 },
        ));
        // Out-of-range payloads are clamped at the accessor.
        assert_eq!(ship.helm_steering(), -1.0);
    }

    #[test]
    fn test_plank_count() {
        let mut ship = test_ship();
        for i in 0..4 {
            ship.modules.push(Module::new(
                20 + i as u32,
                Vec2::zeros(),
                ModuleKind::Plank { segment_index: i, health: 100.0 },
            ));
        }
        ship.modules.push(Module::new(30, Vec2::zeros(), ModuleKind::Seat));
        assert_eq!(ship.plank_count(), 4);
    }
}
