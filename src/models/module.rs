//! Ship module models
//!
//! A module is a decorated attachment point on a ship: the helm, a mast, a
//! cannon, a hull plank, and so on. The kind-specific payload is a closed
//! tagged union so the hot path never goes through dynamic dispatch.

use serde::{Deserialize, Serialize};

use crate::math::Vec2;
use crate::models::EntityId;

/// Bit set on a module while its action is engaged (sails sheeted, cannon
/// loaded, ...). Interpretation is kind-specific.
pub const MODULE_FLAG_ACTIVE: u32 = 1 << 0;
/// Bit set while the module is too damaged to operate.
pub const MODULE_FLAG_DISABLED: u32 = 1 << 1;

/// Kind-specific payload of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleKind {
    /// Steering wheel. `steering` is the current input scalar in `[-1, 1]`.
    Helm { steering: f32 },
    /// Sail mast. `openness` in `[0, 100]`, `wind_efficiency` in `[0, 1]`.
    Mast { openness: f32, wind_efficiency: f32 },
    /// Deck cannon. `aim` is the local aim angle; `reload_s` counts down to
    /// zero between shots.
    Cannon { aim: f32, reload_s: f32 },
    /// Mountable seat with no behavior of its own.
    Seat,
    /// Boarding ladder.
    Ladder,
    /// Health-bearing hull segment. `segment_index` names the hull edge it
    /// protects; at `health == 0` the edge becomes a gap players fall
    /// through.
    Plank { segment_index: usize, health: f32 },
    /// Inward-offset walkable polygon, in ship-local coordinates.
    Deck { polygon: Vec<Vec2> },
    /// Escape hatch for modded content.
    Custom,
}

/// A decorated attachment point on a ship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Unique module identifier (unique within the owning ship).
    pub id: EntityId,
    /// Position in ship-local coordinates.
    pub local_position: Vec2,
    /// Rotation relative to the ship, radians.
    pub local_rotation: f32,
    /// Player currently mounted on this module, if any.
    pub occupant: Option<EntityId>,
    /// Kind-independent state bits.
    pub flags: u32,
    /// Kind-specific payload.
    pub kind: ModuleKind,
}

impl Module {
    /// Create a module with no occupant and clear flags.
    pub fn new(id: EntityId, local_position: Vec2, kind: ModuleKind) -> Self {
        Self {
            id,
            local_position,
            local_rotation: 0.0,
            occupant: None,
            flags: 0,
            kind,
        }
    }

    /// Whether a player can mount this module.
    pub fn is_mountable(&self) -> bool {
        matches!(
            self.kind,
            ModuleKind::Helm { .. } | ModuleKind::Cannon { .. } | ModuleKind::Seat
        )
    }

    /// Plank payload accessor.
    pub fn as_plank(&self) -> Option<(usize, f32)> {
        match self.kind {
            ModuleKind::Plank { segment_index, health } => Some((segment_index, health)),
            _ => None,
        }
    }
}
