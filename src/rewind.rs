//! Lag-compensation rewind buffer
//!
//! A fixed ring of compact world snapshots, one per simulation tick. When a
//! client reports "at my tick T I fired from P along D", the server
//! reconstructs the world the client actually saw and validates the claim
//! against that historical geometry, never the current one.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::math::{Vec2, Vec2Ext};
use crate::models::{ClientId, EntityId, WorldState};

/// Multiplier widening the movement-validation envelope beyond the exact
/// physics bound.
const MOVEMENT_TOLERANCE: f32 = 1.2;

/// Compact per-ship record inside a rewind entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShipSnapshot {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub rotation: f32,
    /// Bounding radius at snapshot time, sized for the hit-test box.
    pub radius: f32,
    pub health: f32,
}

/// Compact per-player record inside a rewind entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub facing: f32,
    pub health: f32,
}

/// Compact world snapshot stored once per tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompactSnapshot {
    pub ships: Vec<ShipSnapshot>,
    pub players: Vec<PlayerSnapshot>,
}

impl CompactSnapshot {
    /// Capture the rewind-relevant slice of a world state.
    pub fn of(world: &WorldState) -> Self {
        Self {
            ships: world
                .ships
                .iter()
                .map(|s| ShipSnapshot {
                    id: s.id,
                    position: s.position,
                    velocity: s.velocity,
                    rotation: s.rotation,
                    radius: s.bounding_radius(),
                    health: s.health,
                })
                .collect(),
            players: world
                .players
                .iter()
                .map(|p| PlayerSnapshot {
                    id: p.id,
                    position: p.position,
                    velocity: p.velocity,
                    facing: p.facing,
                    health: p.health,
                })
                .collect(),
        }
    }
}

/// One ring slot.
#[derive(Debug, Clone)]
pub struct RewindEntry {
    pub tick: u64,
    pub wall_time_ms: f64,
    pub snapshot: CompactSnapshot,
    /// Measured network delay per client at snapshot time, indexed by
    /// client id.
    pub client_delays_ms: Vec<f32>,
}

/// Why a rewind query failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewindFailure {
    /// Nothing stored yet.
    Empty,
    /// The requested tick has been overwritten.
    TooOld,
    /// The requested tick has not happened.
    Future,
    /// The shot hit open water.
    NoTarget,
}

/// Result of a hit-validation query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitValidation {
    pub hit_valid: bool,
    pub target_id: Option<EntityId>,
    pub hit_position: Option<Vec2>,
    pub damage: f32,
    /// How far back in wall time the validation reached.
    pub rewind_ms: f64,
    pub failure: Option<RewindFailure>,
}

/// Result of a movement-envelope query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementValidation {
    pub within_envelope: bool,
    pub allowed_distance: f32,
    pub actual_distance: f32,
}

/// Validation counters, updated on every query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewindStats {
    pub total_rewinds: u64,
    pub successful_rewinds: u64,
    pub failed_rewinds: u64,
    pub average_rewind_distance_ms: f64,
}

/// Fixed-capacity ring of historical world snapshots.
#[derive(Debug)]
pub struct RewindBuffer {
    entries: Vec<Option<RewindEntry>>,
    head: usize,
    stored: usize,
    newest_tick: Option<u64>,
    max_rewind_ms: f64,
    hit_damage: f32,
    shot_range_max: f32,
    stats: RewindStats,
}

impl RewindBuffer {
    /// Create an empty ring. Capacity is fixed for the buffer's lifetime.
    pub fn new(capacity: usize, max_rewind_ms: f64, hit_damage: f32, shot_range_max: f32) -> Self {
        Self {
            entries: (0..capacity).map(|_| None).collect(),
            head: 0,
            stored: 0,
            newest_tick: None,
            max_rewind_ms,
            hit_damage,
            shot_range_max,
            stats: RewindStats::default(),
        }
    }

    /// Newest stored tick.
    pub fn newest_tick(&self) -> Option<u64> {
        self.newest_tick
    }

    /// Oldest tick still readable.
    pub fn oldest_tick(&self) -> Option<u64> {
        self.entries.iter().flatten().map(|e| e.tick).min()
    }

    /// Validation counters.
    pub fn stats(&self) -> RewindStats {
        self.stats
    }

    /// O(1) ring insert; the oldest entry is overwritten when full.
    pub fn store(
        &mut self,
        tick: u64,
        wall_time_ms: f64,
        snapshot: CompactSnapshot,
        client_delays_ms: Vec<f32>,
    ) {
        self.entries[self.head] = Some(RewindEntry {
            tick,
            wall_time_ms,
            snapshot,
            client_delays_ms,
        });
        self.head = (self.head + 1) % self.entries.len();
        self.stored = (self.stored + 1).min(self.entries.len());
        self.newest_tick = Some(tick);
    }

    /// Exact tick match, or the closest older entry. Never returns an entry
    /// from the requester's future.
    pub fn get_state(&self, tick: u64) -> Option<&RewindEntry> {
        self.entries
            .iter()
            .flatten()
            .filter(|e| e.tick <= tick)
            .max_by_key(|e| e.tick)
    }

    /// Whether `tick` is inside the readable window.
    pub fn can_rewind(&self, tick: u64) -> bool {
        match (self.oldest_tick(), self.newest_tick) {
            (Some(oldest), Some(newest)) => oldest <= tick && tick <= newest,
            _ => false,
        }
    }

    /// Drop entries older than the compensation window.
    pub fn cleanup(&mut self, now_ms: f64) {
        let horizon = now_ms - self.max_rewind_ms;
        for slot in &mut self.entries {
            if slot.as_ref().is_some_and(|e| e.wall_time_ms < horizon) {
                *slot = None;
            }
        }
    }

    /// Validate a client's shot claim against the world it saw.
    ///
    /// Raycasts against the bounding boxes of every ship in the historical
    /// snapshot; the nearest hit within range wins and takes the configured
    /// fixed damage.
    pub fn validate_hit(
        &mut self,
        client_id: ClientId,
        reported_tick: u64,
        shot_origin: Vec2,
        shot_direction: Vec2,
        shot_range: f32,
    ) -> HitValidation {
        self.stats.total_rewinds += 1;

        let failure = |kind: RewindFailure, stats: &mut RewindStats| {
            stats.failed_rewinds += 1;
            HitValidation {
                hit_valid: false,
                target_id: None,
                hit_position: None,
                damage: 0.0,
                rewind_ms: 0.0,
                failure: Some(kind),
            }
        };

        let Some(newest) = self.newest_tick else {
            return failure(RewindFailure::Empty, &mut self.stats);
        };
        if reported_tick > newest {
            return failure(RewindFailure::Future, &mut self.stats);
        }
        let newest_wall = self
            .get_state(newest)
            .map(|e| e.wall_time_ms)
            .unwrap_or_default();
        let Some(entry) = self.get_state(reported_tick) else {
            return failure(RewindFailure::TooOld, &mut self.stats);
        };

        let rewind_ms = newest_wall - entry.wall_time_ms;
        let range = shot_range.min(self.shot_range_max);
        let direction = shot_direction.normalized_or_zero();
        if direction == Vec2::zeros() {
            return failure(RewindFailure::NoTarget, &mut self.stats);
        }

        let mut nearest: Option<(f32, EntityId)> = None;
        for ship in &entry.snapshot.ships {
            let Some(t) = ray_vs_box(shot_origin, direction, ship.position, ship.radius) else {
                continue;
            };
            if t <= range && nearest.is_none_or(|(best, _)| t < best) {
                nearest = Some((t, ship.id));
            }
        }

        debug!(
            "hit validation for client {}: tick {} rewound {:.1} ms, result {:?}",
            client_id, reported_tick, rewind_ms, nearest
        );

        match nearest {
            Some((t, target_id)) => {
                self.stats.successful_rewinds += 1;
                let n = self.stats.successful_rewinds as f64;
                self.stats.average_rewind_distance_ms +=
                    (rewind_ms - self.stats.average_rewind_distance_ms) / n;
                HitValidation {
                    hit_valid: true,
                    target_id: Some(target_id),
                    hit_position: Some(shot_origin + direction * t),
                    damage: self.hit_damage,
                    rewind_ms,
                    failure: None,
                }
            }
            None => {
                self.stats.failed_rewinds += 1;
                HitValidation {
                    hit_valid: false,
                    target_id: None,
                    hit_position: None,
                    damage: 0.0,
                    rewind_ms,
                    failure: Some(RewindFailure::NoTarget),
                }
            }
        }
    }

    /// Check a reported position against the physics envelope
    /// `max_speed · Δt · tolerance` anchored at the rewound position.
    pub fn validate_movement(
        &self,
        client_id: ClientId,
        from_tick: u64,
        to_tick: u64,
        reported_position: Vec2,
        max_speed: f32,
    ) -> Option<MovementValidation> {
        let from = self.get_state(from_tick)?;
        let to = self.get_state(to_tick)?;
        let expected = from
            .snapshot
            .players
            .iter()
            .find(|p| p.id == client_id)?
            .position;

        let dt_s = ((to.wall_time_ms - from.wall_time_ms).max(0.0) / 1000.0) as f32;
        let allowed_distance = max_speed * dt_s * MOVEMENT_TOLERANCE;
        let actual_distance = (reported_position - expected).norm();
        Some(MovementValidation {
            within_envelope: actual_distance <= allowed_distance,
            allowed_distance,
            actual_distance,
        })
    }
}

/// Ray vs axis-aligned box (slab method). Returns the entry distance, zero
/// when the origin starts inside.
fn ray_vs_box(origin: Vec2, direction: Vec2, center: Vec2, half_extent: f32) -> Option<f32> {
    let min = center - Vec2::new(half_extent, half_extent);
    let max = center + Vec2::new(half_extent, half_extent);

    let mut t_min = f32::MIN;
    let mut t_max = f32::MAX;
    for axis in 0..2 {
        let (o, d, lo, hi) = (origin[axis], direction[axis], min[axis], max[axis]);
        if d.abs() < 1e-8 {
            if o < lo || o > hi {
                return None;
            }
        } else {
            let t1 = (lo - o) / d;
            let t2 = (hi - o) / d;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }
    }
    if t_min > t_max || t_max < 0.0 {
        return None;
    }
    Some(t_min.max(0.0))
}
