//! Client input frames
//!
//! One frame per client per tick window, carrying world-frame movement (the
//! client applies its camera transform before sending), facing, and action
//! bits. Frames reach the simulation only after passing the input validator.

use serde::{Deserialize, Serialize};

use crate::math::Vec2;
use crate::models::ClientId;

/// Action bitfield values.
pub mod actions {
    /// Jump off the deck.
    pub const JUMP: u32 = 1 << 0;
    /// Mount the nearest free module.
    pub const INTERACT: u32 = 1 << 1;
    /// Release the currently mounted module.
    pub const DISMOUNT: u32 = 1 << 2;
    /// Break the plank underfoot.
    pub const DESTROY_PLANK: u32 = 1 << 3;

    /// Every bit the simulation understands. Frames with any other bit set
    /// are rejected by the validator.
    pub const KNOWN_MASK: u32 = JUMP | INTERACT | DISMOUNT | DESTROY_PLANK;
}

/// A single client input frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Originating client.
    pub client_id: ClientId,
    /// Client-side monotonically increasing sequence number.
    pub sequence: u32,
    /// The client's simulation tick when the frame was produced.
    pub client_tick: u64,
    /// Client wall clock in milliseconds.
    pub client_timestamp_ms: f64,
    /// Movement vector in the world frame, `|movement| ≤ 1 + ε`.
    pub movement: Vec2,
    /// Facing angle in radians.
    pub facing: f32,
    /// Action bitfield; see [`actions`].
    pub actions: u32,
    /// Client frame delta in milliseconds.
    pub dt_ms: f32,
}

impl InputFrame {
    /// An all-zero frame from `client_id`, useful as a neutral default.
    pub fn idle(client_id: ClientId) -> Self {
        Self {
            client_id,
            sequence: 0,
            client_tick: 0,
            client_timestamp_ms: 0.0,
            movement: Vec2::zeros(),
            facing: 0.0,
            actions: 0,
            dt_ms: 0.0,
        }
    }

    /// Whether the given action bit is set.
    pub fn has_action(&self, bit: u32) -> bool {
        self.actions & bit != 0
    }
}
