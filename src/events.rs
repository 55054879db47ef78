//! Simulation event ring
//!
//! Events raised inside the tick and consumed by the outbound snapshot
//! encoder between ticks. The queue is bounded; when the encoder falls
//! behind, the oldest events are dropped first.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::models::EntityId;

/// Events emitted by the simulation core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    /// A player's carrier assignment changed.
    CarrierChanged {
        player_id: EntityId,
        old: Option<EntityId>,
        new: Option<EntityId>,
        tick: u64,
    },

    /// A player left a ship's deck for open water.
    LeftDeck {
        player_id: EntityId,
        old: EntityId,
        tick: u64,
    },

    /// A hull plank dropped to zero health and became a gap.
    PlankDestroyed {
        ship_id: EntityId,
        segment_index: usize,
        tick: u64,
    },

    /// Two ships resolved a collision this tick.
    ShipsCollided {
        ship_a: EntityId,
        ship_b: EntityId,
        penetration: f32,
        tick: u64,
    },
}

/// Bounded event ring collecting events during simulation.
#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<SimEvent>,
    capacity: usize,
    dropped: u64,
}

impl EventQueue {
    /// Create an empty queue holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Add an event, evicting the oldest entry when full.
    pub fn push(&mut self, event: SimEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Take all queued events, clearing the queue.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        self.events.drain(..).collect()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events evicted before the encoder drained them.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain() {
        let mut queue = EventQueue::default();
        assert!(queue.is_empty());

        queue.push(SimEvent::CarrierChanged {
            player_id: 1,
            old: None,
            new: Some(3),
            tick: 42,
        });
        assert_eq!(queue.len(), 1);

        let events = queue.drain();
        assert_eq!(events.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut queue = EventQueue::new(2);
        for tick in 0..3 {
            queue.push(SimEvent::LeftDeck { player_id: 1, old: 2, tick });
        }
        assert_eq!(queue.dropped(), 1);
        let events = queue.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SimEvent::LeftDeck { tick: 1, .. }));
    }

    #[test]
    fn test_event_serialization() {
        let event = SimEvent::PlankDestroyed { ship_id: 9, segment_index: 3, tick: 100 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("plank_destroyed"));
        assert!(json.contains("\"segment_index\":3"));
    }

    #[test]
    fn test_carrier_event_roundtrip() {
        let event = SimEvent::CarrierChanged { player_id: 5, old: Some(1), new: None, tick: 7 };
        let json = serde_json::to_string(&event).unwrap();
        let back: SimEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
