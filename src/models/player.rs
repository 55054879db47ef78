//! Player models
//!
//! A player is an embodied character: a collision circle that walks on
//! moving ship decks, mans modules, or swims. The carrier relationship is a
//! weak reference by ship id, resolved by lookup each tick.

use serde::{Deserialize, Serialize};

use crate::math::Vec2;
use crate::models::EntityId;

/// The motion regime a player occupies for one tick. Exactly one regime
/// holds at any tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionRegime {
    /// Locked to a module on the carrier; input movement is ignored.
    Mounted,
    /// Carried by a ship, free to walk on its deck.
    OnDeck,
    /// Swimming in open water.
    InWater,
}

/// A player character active in the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Unique player identifier (also the owning client id).
    pub id: EntityId,
    /// World position.
    pub position: Vec2,
    /// World velocity (units/s).
    pub velocity: Vec2,
    /// Facing angle in radians, independent of movement direction.
    pub facing: f32,
    /// Collision circle radius.
    pub radius: f32,
    /// Ship currently carrying this player. `None` means in water.
    pub carrier: Option<EntityId>,
    /// Module the player is mounted to, if any.
    pub mounted_module: Option<EntityId>,
    /// Offset from the mounted module's local position.
    pub mount_offset: Option<Vec2>,
    /// Position in the carrier's local frame; only meaningful while carried
    /// or mounted.
    pub local_position: Vec2,
    /// Hit points.
    pub health: f32,
}

impl Player {
    /// Create a swimming player at `position`.
    pub fn new(id: EntityId, position: Vec2) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::zeros(),
            facing: 0.0,
            radius: 8.0,
            carrier: None,
            mounted_module: None,
            mount_offset: None,
            local_position: Vec2::zeros(),
            health: 100.0,
        }
    }

    /// The motion regime this player is in right now.
    pub fn regime(&self) -> MotionRegime {
        if self.mounted_module.is_some() {
            MotionRegime::Mounted
        } else if self.carrier.is_some() {
            MotionRegime::OnDeck
        } else {
            MotionRegime::InWater
        }
    }
}
