//! World state
//!
//! The complete simulation state for one tick, as a cloneable value: the
//! tick counter, entity sequences sorted by ascending id (the iteration
//! order contract for determinism), and the per-player carrier-detection
//! state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::math::Vec2;
use crate::models::player::Player;
use crate::models::ship::Ship;
use crate::models::EntityId;

/// A cannonball in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Unique projectile identifier.
    pub id: EntityId,
    /// Player that fired it.
    pub owner: EntityId,
    /// World position.
    pub position: Vec2,
    /// World velocity (units/s).
    pub velocity: Vec2,
    /// Remaining lifetime in seconds; expired projectiles are removed at the
    /// end of the tick.
    pub ttl_s: f32,
}

/// Detection bookkeeping for one candidate carrier ship.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateTrack {
    /// How deep the player sits inside the candidate's walkable boundary.
    pub penetration: f32,
    /// Speed of the player relative to the candidate deck point under them.
    pub relative_velocity: f32,
    /// Consecutive-presence counter driving the enter hysteresis.
    pub confirm_ticks: u32,
    /// Tick at which the candidate was last observed.
    pub last_seen_tick: u64,
}

/// Per-player carrier-detection state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CarrierState {
    /// The ship currently carrying the player, if any.
    pub carrier: Option<EntityId>,
    /// Candidate ships under evaluation, keyed by ship id. A `BTreeMap`
    /// keeps candidate iteration deterministic.
    pub candidates: BTreeMap<EntityId, CandidateTrack>,
    /// Simulation timestamp of the last carrier switch, for the cooldown.
    pub last_switch_ms: f64,
}

/// The complete world at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    /// Monotonic tick counter.
    pub tick: u64,
    /// Simulation timestamp in milliseconds; strictly increasing.
    pub timestamp_ms: f64,
    /// Ships, sorted by ascending id.
    pub ships: Vec<Ship>,
    /// Players, sorted by ascending id.
    pub players: Vec<Player>,
    /// Projectiles in flight, sorted by ascending id.
    pub projectiles: Vec<Projectile>,
    /// Carrier-detection state per player id.
    pub carrier_states: BTreeMap<EntityId, CarrierState>,
}

impl WorldState {
    /// An empty world at tick zero.
    pub fn new() -> Self {
        Self {
            tick: 0,
            timestamp_ms: 0.0,
            ships: Vec::new(),
            players: Vec::new(),
            projectiles: Vec::new(),
            carrier_states: BTreeMap::new(),
        }
    }

    /// Insert a ship, keeping the sequence sorted by id.
    ///
    /// Returns an error when the id is already taken.
    pub fn add_ship(&mut self, ship: Ship) -> Result<(), String> {
        match self.ships.binary_search_by_key(&ship.id, |s| s.id) {
            Ok(_) => Err(format!("ship id {} already exists", ship.id)),
            Err(index) => {
                self.ships.insert(index, ship);
                Ok(())
            }
        }
    }

    /// Insert a player, keeping the sequence sorted by id, and seed their
    /// carrier-detection state.
    pub fn add_player(&mut self, player: Player) -> Result<(), String> {
        match self.players.binary_search_by_key(&player.id, |p| p.id) {
            Ok(_) => Err(format!("player id {} already exists", player.id)),
            Err(index) => {
                self.carrier_states.insert(player.id, CarrierState::default());
                self.players.insert(index, player);
                Ok(())
            }
        }
    }

    /// Remove a player and their detection state. Quietly does nothing if
    /// the id is unknown.
    pub fn remove_player(&mut self, player_id: EntityId) {
        if let Ok(index) = self.players.binary_search_by_key(&player_id, |p| p.id) {
            self.players.remove(index);
        }
        self.carrier_states.remove(&player_id);
    }

    /// Look up a ship by id.
    pub fn ship(&self, id: EntityId) -> Option<&Ship> {
        self.ships
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|i| &self.ships[i])
    }

    /// Mutable ship lookup.
    pub fn ship_mut(&mut self, id: EntityId) -> Option<&mut Ship> {
        self.ships
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(move |i| &mut self.ships[i])
    }

    /// Look up a player by id.
    pub fn player(&self, id: EntityId) -> Option<&Player> {
        self.players
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(|i| &self.players[i])
    }

    /// Mutable player lookup.
    pub fn player_mut(&mut self, id: EntityId) -> Option<&mut Player> {
        self.players
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(move |i| &mut self.players[i])
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}
