//! Carrier detection
//!
//! Decides, for every player and every tick, which ship (if any) is carrying
//! them. Entering a deck is slow (a candidate must stay present for
//! `confirm_in_ticks`) while leaving is fast, so boundary flicker never
//! bounces a player between frames of reference. Overlapping candidates are
//! tie-broken deterministically, and a switch cooldown stops oscillation
//! between two rafted ships.

use log::info;

use crate::config::SimConfig;
use crate::events::{EventQueue, SimEvent};
use crate::math::polygon_penetration;
use crate::models::{CandidateTrack, CarrierState, EntityId, Player, Ship, WorldState};

/// Run carrier detection for every player, ascending id order.
pub fn update_carriers(world: &mut WorldState, config: &SimConfig, events: &mut EventQueue) {
    let tick = world.tick;
    let now_ms = world.timestamp_ms;
    let WorldState { ships, players, carrier_states, .. } = world;
    for player in players.iter_mut() {
        let state = carrier_states.entry(player.id).or_default();
        update_one(player, state, ships, config, tick, now_ms, events);
    }
}

fn update_one(
    player: &mut Player,
    state: &mut CarrierState,
    ships: &[Ship],
    config: &SimConfig,
    tick: u64,
    now_ms: f64,
    events: &mut EventQueue,
) {
    // Mounted players are pinned to the ship owning their module; detection
    // is skipped entirely. A despawned ship still releases them.
    if player.mounted_module.is_some() {
        if let Some(carrier_id) = player.carrier {
            if ship_by_id(ships, carrier_id).is_some() {
                state.carrier = Some(carrier_id);
                return;
            }
            info!("player {} mount lost with ship {}, releasing", player.id, carrier_id);
            player.mounted_module = None;
            player.mount_offset = None;
            detach(player, state, Some(carrier_id), tick, now_ms, events);
            return;
        }
        // A mount without a carrier is inconsistent; drop the mount.
        player.mounted_module = None;
        player.mount_offset = None;
    }

    // Stale carrier: the referenced ship no longer exists.
    if let Some(carrier_id) = state.carrier {
        match ship_by_id(ships, carrier_id) {
            None => {
                info!("player {} carrier {} despawned", player.id, carrier_id);
                detach(player, state, Some(carrier_id), tick, now_ms, events);
            }
            Some(ship) => {
                // Hard distance exit bypasses every cooldown.
                if (player.position - ship.position).norm() > config.carrier.hard_exit_distance {
                    detach(player, state, Some(carrier_id), tick, now_ms, events);
                    return;
                }
            }
        }
    }

    gather_candidates(player, state, ships, config, tick);

    // Release the current carrier once it has been missing long enough.
    if let Some(carrier_id) = state.carrier {
        let gone = match state.candidates.get(&carrier_id) {
            None => true,
            Some(track) => tick.saturating_sub(track.last_seen_tick)
                >= config.carrier.confirm_out_ticks as u64,
        };
        if gone {
            detach(player, state, Some(carrier_id), tick, now_ms, events);
        }
    }

    // Pick the best confirmed candidate present this tick.
    let mut best: Option<(EntityId, &CandidateTrack)> = None;
    for (&ship_id, track) in &state.candidates {
        if track.last_seen_tick != tick || track.confirm_ticks < config.carrier.confirm_in_ticks {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_id, best_track)) => {
                if track.penetration != best_track.penetration {
                    track.penetration > best_track.penetration
                } else if track.relative_velocity != best_track.relative_velocity {
                    track.relative_velocity < best_track.relative_velocity
                } else {
                    ship_id < best_id
                }
            }
        };
        if better {
            best = Some((ship_id, track));
        }
    }

    let Some((new_id, _)) = best else {
        return;
    };
    if state.carrier == Some(new_id) {
        return;
    }

    // Switching between two live carriers respects the cooldown; boarding
    // from open water does not.
    if state.carrier.is_some()
        && now_ms - state.last_switch_ms < config.carrier.switch_cooldown_ms
    {
        return;
    }

    let old = state.carrier;
    state.carrier = Some(new_id);
    state.last_switch_ms = now_ms;
    player.carrier = Some(new_id);
    if let Some(ship) = ship_by_id(ships, new_id) {
        player.local_position = ship.world_to_local(player.position);
    }
    events.push(SimEvent::CarrierChanged { player_id: player.id, old, new: Some(new_id), tick });
}

/// Record every ship whose walkable boundary currently contains the player,
/// and age out the ones that no longer do.
fn gather_candidates(
    player: &mut Player,
    state: &mut CarrierState,
    ships: &[Ship],
    config: &SimConfig,
    tick: u64,
) {
    let epsilon = config.movement.eps_factor * player.radius;
    for ship in ships {
        let reach = ship.bounding_radius() + epsilon + player.radius;
        if (player.position - ship.position).norm() > reach {
            continue;
        }
        let Some(penetration) = polygon_penetration(player.position, &ship.world_hull()) else {
            continue;
        };
        let deck_velocity = ship.velocity_at_offset(player.position - ship.position);
        let relative_velocity = (player.velocity - deck_velocity).norm();

        let track = state.candidates.entry(ship.id).or_insert(CandidateTrack {
            penetration,
            relative_velocity,
            confirm_ticks: 0,
            last_seen_tick: tick,
        });
        track.penetration = penetration;
        track.relative_velocity = relative_velocity;
        track.confirm_ticks = (track.confirm_ticks + 1).min(config.carrier.confirm_in_ticks + 1);
        track.last_seen_tick = tick;
    }

    // Decay candidates that were not seen this tick; drop at zero.
    state.candidates.retain(|_, track| {
        if track.last_seen_tick == tick {
            true
        } else {
            track.confirm_ticks = track.confirm_ticks.saturating_sub(1);
            track.confirm_ticks > 0
        }
    });
}

/// Transition to no carrier, emitting the change and deck-exit events.
fn detach(
    player: &mut Player,
    state: &mut CarrierState,
    old: Option<EntityId>,
    tick: u64,
    now_ms: f64,
    events: &mut EventQueue,
) {
    state.carrier = None;
    state.last_switch_ms = now_ms;
    player.carrier = None;
    events.push(SimEvent::CarrierChanged { player_id: player.id, old, new: None, tick });
    if let Some(old_id) = old {
        events.push(SimEvent::LeftDeck { player_id: player.id, old: old_id, tick });
    }
}

fn ship_by_id(ships: &[Ship], id: EntityId) -> Option<&Ship> {
    ships.binary_search_by_key(&id, |s| s.id).ok().map(|i| &ships[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use crate::models::Ship;

    fn world_with_ship() -> (WorldState, SimConfig) {
        let mut world = WorldState::new();
        world
            .add_ship(Ship::new(1, Vec2::zeros(), Ship::rectangle_hull(100.0, 50.0)))
            .unwrap();
        world.add_player(Player::new(7, Vec2::new(50.0, 0.0))).unwrap();
        (world, SimConfig::default())
    }

    fn advance(world: &mut WorldState) {
        world.tick += 1;
        world.timestamp_ms += 1000.0 / 30.0;
    }

    #[test]
    fn test_enter_hysteresis_takes_two_ticks() {
        let (mut world, config) = world_with_ship();
        let mut events = EventQueue::default();

        advance(&mut world);
        update_carriers(&mut world, &config, &mut events);
        assert_eq!(world.player(7).unwrap().carrier, None);
        let track = world.carrier_states[&7].candidates[&1];
        assert_eq!(track.confirm_ticks, 1);

        advance(&mut world);
        update_carriers(&mut world, &config, &mut events);
        assert_eq!(world.player(7).unwrap().carrier, Some(1));
        let drained = events.drain();
        assert!(drained.iter().any(|e| matches!(
            e,
            SimEvent::CarrierChanged { player_id: 7, old: None, new: Some(1), .. }
        )));
    }

    #[test]
    fn test_exit_is_immediate_once_outside() {
        let (mut world, config) = world_with_ship();
        let mut events = EventQueue::default();
        for _ in 0..3 {
            advance(&mut world);
            update_carriers(&mut world, &config, &mut events);
        }
        assert_eq!(world.player(7).unwrap().carrier, Some(1));
        events.drain();

        // Step off the side.
        world.player_mut(7).unwrap().position = Vec2::new(120.0, 0.0);
        advance(&mut world);
        update_carriers(&mut world, &config, &mut events);
        assert_eq!(world.player(7).unwrap().carrier, None);
        assert!(events.drain().iter().any(|e| matches!(
            e,
            SimEvent::LeftDeck { player_id: 7, old: 1, .. }
        )));
    }

    #[test]
    fn test_hard_distance_forces_exit() {
        let (mut world, config) = world_with_ship();
        let mut events = EventQueue::default();
        for _ in 0..3 {
            advance(&mut world);
            update_carriers(&mut world, &config, &mut events);
        }
        events.drain();

        // Teleported far away (e.g. a respawn): detached the very next tick,
        // cooldown or not.
        world.player_mut(7).unwrap().position = Vec2::new(400.001, 0.0);
        advance(&mut world);
        update_carriers(&mut world, &config, &mut events);
        assert_eq!(world.player(7).unwrap().carrier, None);
    }

    #[test]
    fn test_stale_carrier_releases_player() {
        let (mut world, config) = world_with_ship();
        let mut events = EventQueue::default();
        for _ in 0..3 {
            advance(&mut world);
            update_carriers(&mut world, &config, &mut events);
        }
        events.drain();

        world.ships.clear();
        advance(&mut world);
        update_carriers(&mut world, &config, &mut events);
        assert_eq!(world.player(7).unwrap().carrier, None);
        assert!(events.drain().iter().any(|e| matches!(e, SimEvent::LeftDeck { .. })));
    }

    #[test]
    fn test_tie_break_prefers_deeper_penetration() {
        let mut world = WorldState::new();
        // Two overlapping decks; the player stands deeper inside ship 2.
        world
            .add_ship(Ship::new(1, Vec2::new(-80.0, 0.0), Ship::rectangle_hull(100.0, 50.0)))
            .unwrap();
        world
            .add_ship(Ship::new(2, Vec2::new(-20.0, 0.0), Ship::rectangle_hull(100.0, 50.0)))
            .unwrap();
        world.add_player(Player::new(7, Vec2::new(0.0, 0.0))).unwrap();
        let config = SimConfig::default();
        let mut events = EventQueue::default();

        for _ in 0..3 {
            advance(&mut world);
            update_carriers(&mut world, &config, &mut events);
        }
        assert_eq!(world.player(7).unwrap().carrier, Some(2));
    }

    #[test]
    fn test_tie_break_falls_back_to_smaller_id() {
        let mut world = WorldState::new();
        // Perfectly coincident ships: penetration and relative velocity tie.
        world
            .add_ship(Ship::new(4, Vec2::zeros(), Ship::rectangle_hull(100.0, 50.0)))
            .unwrap();
        world
            .add_ship(Ship::new(9, Vec2::zeros(), Ship::rectangle_hull(100.0, 50.0)))
            .unwrap();
        world.add_player(Player::new(7, Vec2::new(10.0, 0.0))).unwrap();
        let config = SimConfig::default();
        let mut events = EventQueue::default();

        for _ in 0..3 {
            advance(&mut world);
            update_carriers(&mut world, &config, &mut events);
        }
        assert_eq!(world.player(7).unwrap().carrier, Some(4));
    }

    #[test]
    fn test_switch_cooldown_blocks_rapid_rebind() {
        let mut world = WorldState::new();
        world
            .add_ship(Ship::new(1, Vec2::zeros(), Ship::rectangle_hull(100.0, 50.0)))
            .unwrap();
        world
            .add_ship(Ship::new(2, Vec2::new(150.0, 0.0), Ship::rectangle_hull(100.0, 50.0)))
            .unwrap();
        world.add_player(Player::new(7, Vec2::new(40.0, 0.0))).unwrap();
        let mut config = SimConfig::default();
        config.carrier.switch_cooldown_ms = 10_000.0;
        let mut events = EventQueue::default();

        for _ in 0..3 {
            advance(&mut world);
            update_carriers(&mut world, &config, &mut events);
        }
        assert_eq!(world.player(7).unwrap().carrier, Some(1));

        // Walk into the overlap zone of ship 2; the long cooldown pins the
        // player to ship 1 even though ship 2 now scores better.
        world.player_mut(7).unwrap().position = Vec2::new(95.0, 0.0);
        for _ in 0..5 {
            advance(&mut world);
            update_carriers(&mut world, &config, &mut events);
        }
        assert_eq!(world.player(7).unwrap().carrier, Some(1));
    }
}
