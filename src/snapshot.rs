//! Outbound world snapshots
//!
//! Derives the wire-facing view of a world state after each tick: one
//! record per visible entity with quantized kinematics plus the mutable
//! scalar state of each ship module. Per-client delta compression and
//! area-of-interest culling happen downstream in the encoder.

use serde::{Deserialize, Serialize};

use crate::math::Vec2;
use crate::models::{EntityId, ModuleKind, MotionRegime, WorldState};

/// Position resolution on the wire: 1/512 unit.
pub const POSITION_QUANTUM: f32 = 1.0 / 512.0;
/// Velocity resolution on the wire: 1/256 unit/s.
pub const VELOCITY_QUANTUM: f32 = 1.0 / 256.0;
/// Rotation resolution on the wire: 1/1024 rad.
pub const ROTATION_QUANTUM: f32 = 1.0 / 1024.0;

/// Snapshot flag: the player is carried by a ship.
pub const FLAG_CARRIED: u32 = 1 << 0;
/// Snapshot flag: the player is mounted to a module.
pub const FLAG_MOUNTED: u32 = 1 << 1;

/// Quantize a scalar to a signed number of quanta.
pub fn quantize(value: f32, quantum: f32) -> i32 {
    (value / quantum).round() as i32
}

/// Reconstruct a scalar from its quantized form.
pub fn dequantize(quantized: i32, quantum: f32) -> f32 {
    quantized as f32 * quantum
}

/// What kind of entity a snapshot record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Ship,
    Player,
    Projectile,
}

/// Mutable scalar state of one module, shipped whole; the encoder diffs it
/// against its per-client baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleStateDelta {
    Helm { steering: f32 },
    Mast { openness: f32 },
    Cannon { aim: f32, reload_s: f32 },
    Plank { health: f32 },
}

/// Per-module entry inside a ship's snapshot record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDelta {
    pub module_id: EntityId,
    pub occupant: Option<EntityId>,
    pub flags: u32,
    pub state: Option<ModuleStateDelta>,
}

/// One visible entity on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: [i32; 2],
    pub velocity: [i32; 2],
    pub rotation: i32,
    pub health: f32,
    pub flags: u32,
    pub module_deltas: Vec<ModuleDelta>,
}

impl EntitySnapshot {
    /// Decoded world position.
    pub fn position(&self) -> Vec2 {
        Vec2::new(
            dequantize(self.position[0], POSITION_QUANTUM),
            dequantize(self.position[1], POSITION_QUANTUM),
        )
    }

    /// Decoded world velocity.
    pub fn velocity(&self) -> Vec2 {
        Vec2::new(
            dequantize(self.velocity[0], VELOCITY_QUANTUM),
            dequantize(self.velocity[1], VELOCITY_QUANTUM),
        )
    }

    /// Decoded rotation.
    pub fn rotation(&self) -> f32 {
        dequantize(self.rotation, ROTATION_QUANTUM)
    }
}

/// The complete post-tick snapshot handed to the encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub timestamp_ms: f64,
    pub entities: Vec<EntitySnapshot>,
}

fn quantize_vec(v: Vec2, quantum: f32) -> [i32; 2] {
    [quantize(v.x, quantum), quantize(v.y, quantum)]
}

/// Derive the outbound snapshot of a world: ships, then players, then
/// projectiles, each in ascending id order.
pub fn derive_snapshot(world: &WorldState) -> WorldSnapshot {
    let mut entities =
        Vec::with_capacity(world.ships.len() + world.players.len() + world.projectiles.len());

    for ship in &world.ships {
        let module_deltas = ship
            .modules
            .iter()
            .map(|module| ModuleDelta {
                module_id: module.id,
                occupant: module.occupant,
                flags: module.flags,
                state: match &module.kind {
                    ModuleKind::Helm { steering } => {
                        Some(ModuleStateDelta::Helm { steering: *steering })
                    }
                    ModuleKind::Mast { openness, .. } => {
                        Some(ModuleStateDelta::Mast { openness: *openness })
                    }
                    ModuleKind::Cannon { aim, reload_s } => {
                        Some(ModuleStateDelta::Cannon { aim: *aim, reload_s: *reload_s })
                    }
                    ModuleKind::Plank { health, .. } => {
                        Some(ModuleStateDelta::Plank { health: *health })
                    }
                    _ => None,
                },
            })
            .collect();
        entities.push(EntitySnapshot {
            id: ship.id,
            kind: EntityKind::Ship,
            position: quantize_vec(ship.position, POSITION_QUANTUM),
            velocity: quantize_vec(ship.velocity, VELOCITY_QUANTUM),
            rotation: quantize(ship.rotation, ROTATION_QUANTUM),
            health: ship.health,
            flags: 0,
            module_deltas,
        });
    }

    for player in &world.players {
        let flags = match player.regime() {
            MotionRegime::Mounted => FLAG_CARRIED | FLAG_MOUNTED,
            MotionRegime::OnDeck => FLAG_CARRIED,
            MotionRegime::InWater => 0,
        };
        entities.push(EntitySnapshot {
            id: player.id,
            kind: EntityKind::Player,
            position: quantize_vec(player.position, POSITION_QUANTUM),
            velocity: quantize_vec(player.velocity, VELOCITY_QUANTUM),
            rotation: quantize(player.facing, ROTATION_QUANTUM),
            health: player.health,
            flags,
            module_deltas: Vec::new(),
        });
    }

    for projectile in &world.projectiles {
        entities.push(EntitySnapshot {
            id: projectile.id,
            kind: EntityKind::Projectile,
            position: quantize_vec(projectile.position, POSITION_QUANTUM),
            velocity: quantize_vec(projectile.velocity, VELOCITY_QUANTUM),
            rotation: 0,
            health: 0.0,
            flags: 0,
            module_deltas: Vec::new(),
        });
    }

    WorldSnapshot {
        tick: world.tick,
        timestamp_ms: world.timestamp_ms,
        entities,
    }
}
