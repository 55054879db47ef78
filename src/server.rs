//! Hosting loop
//!
//! Drives the synchronous simulation core at a fixed tick rate. Each cycle
//! drains the inbound input queue through the validator, steps the world
//! once, publishes the outbound snapshot together with the tick's events,
//! and sleeps to the next tick boundary. All I/O happens between ticks; a
//! running tick is never interrupted.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::{info, warn};
use tokio::sync::{broadcast, mpsc};

use crate::config::SimConfig;
use crate::events::SimEvent;
use crate::models::{ClientId, InputFrame, WorldState};
use crate::simulation::Simulation;
use crate::snapshot::{derive_snapshot, WorldSnapshot};
use crate::validation::{InputValidator, TierContext};

/// One published update: the post-tick snapshot plus the events the tick
/// raised.
#[derive(Debug, Clone)]
pub struct OutboundUpdate {
    pub snapshot: WorldSnapshot,
    pub events: Vec<SimEvent>,
}

/// Run the hosting loop until the input channel closes (or `max_ticks`
/// elapses, when given). Returns the finished simulation for inspection.
pub async fn run(
    config: SimConfig,
    world: WorldState,
    mut inputs: mpsc::Receiver<InputFrame>,
    updates: broadcast::Sender<OutboundUpdate>,
    max_ticks: Option<u64>,
) -> Result<Simulation, String> {
    let max_clients = config.validator.max_clients;
    let inactivity_timeout_ms = config.inactivity_timeout_s as f64 * 1000.0;
    let mut validator = InputValidator::new(config.validator.clone());
    let mut sim = Simulation::with_world(config.clone(), world)?;

    let started = Instant::now();
    let mut interval = tokio::time::interval(Duration::from_secs_f64(config.dt() as f64));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut pending: BTreeMap<ClientId, InputFrame> = BTreeMap::new();
    let mut client_delays_ms = vec![0.0_f32; max_clients];
    let mut last_seen_ms: BTreeMap<ClientId, f64> = BTreeMap::new();
    let mut ticks_run = 0u64;

    info!(
        "hosting loop up: {} Hz, {} ships, {} players",
        config.tick_hz,
        sim.world.ships.len(),
        sim.world.players.len()
    );

    loop {
        interval.tick().await;
        let now_ms = started.elapsed().as_secs_f64() * 1000.0;

        // Drain the inbound queue. Arrival order decides which frame wins a
        // client's slot for this tick; the map keys keep application order
        // ascending by client id.
        let mut closed = false;
        loop {
            match inputs.try_recv() {
                Ok(frame) => {
                    let client_id = frame.client_id;
                    let result = validator.validate(client_id, &frame, now_ms);
                    if result.accepted {
                        let delay = (now_ms - frame.client_timestamp_ms).max(0.0) as f32;
                        if let Some(slot) = client_delays_ms.get_mut(client_id as usize) {
                            *slot = delay;
                        }
                        last_seen_ms.insert(client_id, now_ms);
                        pending.insert(client_id, frame);
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }

        // Inactivity disconnects happen between ticks, never inside one.
        let expired: Vec<ClientId> = last_seen_ms
            .iter()
            .filter(|&(_, &seen)| now_ms - seen > inactivity_timeout_ms)
            .map(|(&id, _)| id)
            .collect();
        for client_id in expired {
            info!("client {} timed out, removing player", client_id);
            last_seen_ms.remove(&client_id);
            validator.reset_client(client_id);
            sim.world.remove_player(client_id);
        }

        sim.tick(&pending, client_delays_ms.clone());
        validator.end_tick();
        pending.clear();

        // Re-tier clients from world context so the per-tier rate caps track
        // what each player is actually doing.
        let in_combat = !sim.world.projectiles.is_empty();
        for index in 0..sim.world.players.len() {
            let player = &sim.world.players[index];
            let nearby_players = sim
                .world
                .players
                .iter()
                .filter(|other| {
                    other.id != player.id && (other.position - player.position).norm() < 500.0
                })
                .count();
            validator.update_tier(
                player.id,
                TierContext {
                    nearby_players,
                    in_combat,
                    moving: player.velocity.norm() > 1.0,
                },
            );
        }

        let update = OutboundUpdate {
            snapshot: derive_snapshot(&sim.world),
            events: sim.events.drain(),
        };
        // A send error only means nobody is listening right now.
        let _ = updates.send(update);

        ticks_run += 1;
        if max_ticks.is_some_and(|max| ticks_run >= max) {
            info!("tick limit reached after {} ticks", ticks_run);
            return Ok(sim);
        }
        if closed {
            info!("input channel closed after {} ticks", ticks_run);
            return Ok(sim);
        }
        if sim.overruns() > 0 && ticks_run % 600 == 0 {
            warn!("{} tick budget overruns so far", sim.overruns());
        }
    }
}
