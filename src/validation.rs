//! Input validation and anti-cheat
//!
//! Gates every inbound frame before the tick loop sees it. Invalid frames
//! are dropped silently (the client's prediction reconciles against the
//! next authoritative snapshot) while per-client counters and a weighted
//! suspicion score accumulate toward flagging and, past a threshold, a ban
//! recommendation.

use std::collections::VecDeque;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::ValidatorConfig;
use crate::models::{actions, ClientId, InputFrame};

/// Magnitude slack accepted on top of a unit movement vector.
const MOVEMENT_EPSILON: f32 = 1e-3;
/// Per-tick decay of the accumulated pattern score.
const PATTERN_DECAY: f32 = 0.98;
/// Ratio of invalid inputs at which a client is flagged.
const FLAG_INVALID_RATIO: f32 = 0.10;
/// Suspicion score at which a client is flagged.
const FLAG_SCORE: f32 = 0.85;

/// A rejected frame's reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    /// Below the minimum input interval.
    RateLimit,
    /// Too many inputs inside the burst window.
    Burst,
    /// Movement vector longer than a unit vector.
    MovementBounds,
    /// Accumulated too many suspiciously perfect movement vectors.
    PatternAnomaly,
    /// Unknown action bits set.
    UnknownAction,
    /// Client timestamp ran backwards or jumped too far.
    TimestampAnomaly,
    /// Identical frame repeated within the duplicate window.
    Duplicate,
    /// Client id outside the configured slot range.
    ClientLimit,
}

impl Violation {
    /// Weight this violation adds to the suspicion score.
    fn weight(self) -> f32 {
        match self {
            Violation::RateLimit => 0.10,
            Violation::Burst => 0.15,
            Violation::MovementBounds => 0.25,
            Violation::PatternAnomaly => 0.30,
            Violation::UnknownAction => 0.30,
            Violation::TimestampAnomaly => 0.10,
            Violation::Duplicate => 0.05,
            Violation::ClientLimit => 0.0,
        }
    }
}

/// Structured outcome handed back to the network layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationResult {
    pub accepted: bool,
    pub violation: Option<Violation>,
    /// The client's suspicion score after this frame.
    pub suspicious_score: f32,
}

/// Client activity tier, driving the per-tier rate cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTier {
    /// Parked in a menu or AFK.
    Idle,
    /// In the world with nobody nearby.
    Background,
    /// Moving through the world.
    Normal,
    /// In combat.
    Critical,
}

impl ActivityTier {
    /// Maximum accepted input rate for this tier, Hz.
    pub fn max_rate_hz(self) -> f64 {
        match self {
            ActivityTier::Idle => 1.0,
            ActivityTier::Background => 10.0,
            ActivityTier::Normal => 30.0,
            ActivityTier::Critical => 60.0,
        }
    }

    /// Minimum interval between inputs, with headroom for network jitter.
    pub fn min_interval_ms(self) -> f64 {
        500.0 / self.max_rate_hz()
    }
}

/// Simulation context used to re-tier a client.
#[derive(Debug, Clone, Copy, Default)]
pub struct TierContext {
    pub nearby_players: usize,
    pub in_combat: bool,
    pub moving: bool,
}

/// Violation counters for one client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCounters {
    pub total_inputs: u64,
    pub invalid_inputs: u64,
    pub rate_violations: u64,
    pub burst_violations: u64,
    pub movement_violations: u64,
    pub action_violations: u64,
    pub timestamp_anomalies: u64,
    pub duplicate_inputs: u64,
}

/// Per-client validator state. Slots are preallocated up to `max_clients`;
/// nothing allocates on the per-frame path beyond the burst window.
#[derive(Debug, Clone)]
struct ClientSlot {
    first_input_ms: Option<f64>,
    last_accepted_ms: f64,
    last_client_timestamp_ms: f64,
    last_frame: Option<(u32, f32, f32, f32)>,
    last_frame_ms: f64,
    burst_window: VecDeque<f64>,
    counters: ClientCounters,
    pattern_score: f32,
    suspicious_score: f32,
    tier: ActivityTier,
}

impl Default for ClientSlot {
    fn default() -> Self {
        Self {
            first_input_ms: None,
            last_accepted_ms: 0.0,
            last_client_timestamp_ms: 0.0,
            last_frame: None,
            last_frame_ms: 0.0,
            burst_window: VecDeque::new(),
            counters: ClientCounters::default(),
            pattern_score: 0.0,
            suspicious_score: 0.0,
            // Fresh clients start untiered at the highest cap; the server
            // downgrades them from context.
            tier: ActivityTier::Critical,
        }
    }
}

/// The input validator. All state lives in the owning struct so tests can
/// run many instances side by side.
#[derive(Debug)]
pub struct InputValidator {
    config: ValidatorConfig,
    slots: Vec<ClientSlot>,
}

impl InputValidator {
    /// Create a validator with one preallocated slot per possible client.
    pub fn new(config: ValidatorConfig) -> Self {
        let slots = vec![ClientSlot::default(); config.max_clients];
        Self { config, slots }
    }

    /// Validate one frame at server wall time `server_now_ms`.
    pub fn validate(
        &mut self,
        client_id: ClientId,
        frame: &InputFrame,
        server_now_ms: f64,
    ) -> ValidationResult {
        let Some(slot) = self.slots.get_mut(client_id as usize) else {
            return ValidationResult {
                accepted: false,
                violation: Some(Violation::ClientLimit),
                suspicious_score: 1.0,
            };
        };
        slot.counters.total_inputs += 1;
        let first_input = slot.first_input_ms.is_none();

        let violation = check_frame(&self.config, slot, frame, server_now_ms, first_input);

        if let Some(violation) = violation {
            slot.counters.invalid_inputs += 1;
            match violation {
                Violation::RateLimit => slot.counters.rate_violations += 1,
                Violation::Burst => slot.counters.burst_violations += 1,
                Violation::MovementBounds | Violation::PatternAnomaly => {
                    slot.counters.movement_violations += 1
                }
                Violation::UnknownAction => slot.counters.action_violations += 1,
                Violation::TimestampAnomaly => slot.counters.timestamp_anomalies += 1,
                Violation::Duplicate => slot.counters.duplicate_inputs += 1,
                Violation::ClientLimit => {}
            }
            slot.suspicious_score = (slot.suspicious_score + violation.weight()).min(1.0);
            debug!(
                "client {} frame rejected: {:?} (score {:.2})",
                client_id, violation, slot.suspicious_score
            );
            return ValidationResult {
                accepted: false,
                violation: Some(violation),
                suspicious_score: slot.suspicious_score,
            };
        }

        if first_input {
            slot.first_input_ms = Some(server_now_ms);
        }
        slot.last_accepted_ms = server_now_ms;
        slot.last_client_timestamp_ms = frame.client_timestamp_ms;
        slot.last_frame = Some(frame_key(frame));
        slot.last_frame_ms = server_now_ms;
        slot.burst_window.push_back(server_now_ms);

        ValidationResult {
            accepted: true,
            violation: None,
            suspicious_score: slot.suspicious_score,
        }
    }

    /// Per-tick decay of the pattern scores. Call once per simulation tick.
    pub fn end_tick(&mut self) {
        for slot in &mut self.slots {
            slot.pattern_score *= PATTERN_DECAY;
        }
    }

    /// Re-tier a client from simulation context.
    pub fn update_tier(&mut self, client_id: ClientId, context: TierContext) {
        if let Some(slot) = self.slots.get_mut(client_id as usize) {
            slot.tier = if context.in_combat {
                ActivityTier::Critical
            } else if context.moving {
                ActivityTier::Normal
            } else if context.nearby_players > 0 {
                ActivityTier::Background
            } else {
                ActivityTier::Idle
            };
        }
    }

    /// Current tier of a client.
    pub fn tier(&self, client_id: ClientId) -> Option<ActivityTier> {
        self.slots.get(client_id as usize).map(|s| s.tier)
    }

    /// Violation counters for a client.
    pub fn counters(&self, client_id: ClientId) -> Option<ClientCounters> {
        self.slots.get(client_id as usize).map(|s| s.counters)
    }

    /// Whether a client has crossed the flagging thresholds.
    pub fn is_flagged(&self, client_id: ClientId) -> bool {
        let Some(slot) = self.slots.get(client_id as usize) else {
            return false;
        };
        let ratio = if slot.counters.total_inputs == 0 {
            0.0
        } else {
            slot.counters.invalid_inputs as f32 / slot.counters.total_inputs as f32
        };
        ratio > FLAG_INVALID_RATIO || slot.suspicious_score > FLAG_SCORE
    }

    /// Whether a client has earned an automatic ban.
    pub fn should_ban(&self, client_id: ClientId) -> bool {
        self.slots
            .get(client_id as usize)
            .is_some_and(|s| s.suspicious_score > self.config.ban_threshold_score)
    }

    /// Forget all state for a client (used on disconnect).
    pub fn reset_client(&mut self, client_id: ClientId) {
        if let Some(slot) = self.slots.get_mut(client_id as usize) {
            *slot = ClientSlot::default();
        }
    }
}

fn frame_key(frame: &InputFrame) -> (u32, f32, f32, f32) {
    (frame.actions, frame.movement.x, frame.movement.y, frame.facing)
}

/// Run every enabled check in order; the first failure wins.
fn check_frame(
    config: &ValidatorConfig,
    slot: &mut ClientSlot,
    frame: &InputFrame,
    server_now_ms: f64,
    first_input: bool,
) -> Option<Violation> {
    // 1. Rate: the very first input from a client is never rate-rejected.
    if config.check_rate && !first_input {
        let min_interval = config.min_input_interval_ms.max(slot.tier.min_interval_ms());
        if server_now_ms - slot.last_accepted_ms < min_interval {
            return Some(Violation::RateLimit);
        }
    }

    // 2. Burst window.
    if config.check_burst {
        while slot
            .burst_window
            .front()
            .is_some_and(|&t| server_now_ms - t > config.burst_window_ms)
        {
            slot.burst_window.pop_front();
        }
        if slot.burst_window.len() >= config.max_inputs_per_window {
            return Some(Violation::Burst);
        }
    }

    // 3. Movement magnitude.
    if config.check_movement && frame.movement.norm() > 1.0 + MOVEMENT_EPSILON {
        return Some(Violation::MovementBounds);
    }

    // 4. Pattern: perfectly diagonal near-unit vectors are a macro tell.
    if config.check_pattern {
        let m = frame.movement;
        if (m.x.abs() - m.y.abs()).abs() < 1e-6 && m.norm() > 0.9 {
            slot.pattern_score += 1.0;
            if slot.pattern_score > config.pattern_flag_threshold {
                return Some(Violation::PatternAnomaly);
            }
        }
    }

    // 5. Unknown action bits.
    if config.check_actions && frame.actions & !actions::KNOWN_MASK != 0 {
        return Some(Violation::UnknownAction);
    }

    // 6. Client timestamp sanity.
    if config.check_timestamp && !first_input {
        let gap = frame.client_timestamp_ms - slot.last_client_timestamp_ms;
        if gap < 0.0 || gap > config.max_timestamp_gap_ms {
            return Some(Violation::TimestampAnomaly);
        }
    }

    // 7. Duplicate frames.
    if config.check_duplicate
        && slot.last_frame == Some(frame_key(frame))
        && server_now_ms - slot.last_frame_ms < config.duplicate_window_ms
        && frame.movement.norm() > 0.0
    {
        return Some(Violation::Duplicate);
    }

    None
}
