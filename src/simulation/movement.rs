//! Player motion
//!
//! Applies one tick of motion to every player in the regime carrier
//! detection chose for them: locked to a module, walking a moving deck, or
//! swimming. The on-deck path reconstructs the carrier's previous pose so
//! the player rides rotation exactly, with an exponential "ice drift" decay
//! of momentum relative to the deck.

use std::collections::BTreeMap;

use log::warn;

use crate::config::SimConfig;
use crate::events::EventQueue;
use crate::math::{angle_diff, wrap_angle, Vec2, Vec2Ext};
use crate::models::{actions, EntityId, InputFrame, Player, Ship, WorldState};
use crate::simulation::{planks, sweep};

/// Sliding friction applied after a deck collision.
const DECK_SLIDE_FRICTION: f32 = 0.95;
/// Above this rotation delta the exact rotation matrix replaces the
/// first-order approximation.
const EXACT_ROTATION_THRESHOLD: f32 = 0.1;
/// Fraction of the ship radius beyond which a jump clears the rail.
const JUMP_EXIT_RADIUS_FACTOR: f32 = 0.7;
/// Input magnitude below which a swimmer is coasting.
const SWIM_INPUT_DEADZONE: f32 = 0.01;

/// Apply mount/dismount/plank actions, then one tick of motion, for every
/// player in ascending id order.
pub fn update_players(
    world: &mut WorldState,
    inputs: &BTreeMap<EntityId, InputFrame>,
    config: &SimConfig,
    dt: f32,
    events: &mut EventQueue,
) {
    apply_actions(world, inputs, config, events);

    let WorldState { ships, players, .. } = world;
    for player in players.iter_mut() {
        let idle = InputFrame::idle(player.id);
        let input = match inputs.get(&player.id) {
            Some(frame) => {
                player.facing = frame.facing;
                frame
            }
            None => &idle,
        };

        match player.carrier {
            Some(carrier_id) => {
                let Some(ship) = ship_by_id(ships, carrier_id) else {
                    // Stale carrier is repaired by detection next tick; treat
                    // as water for this one.
                    swim(player, input, config, ships, dt);
                    continue;
                };
                if player.mounted_module.is_some() {
                    ride_mounted(player, ship);
                } else {
                    walk_deck(player, ship, input, config, dt);
                }
            }
            None => swim(player, input, config, ships, dt),
        }

        guard_player(player);
    }
}

/// Mount, dismount, and plank-destruction actions. Runs before motion so a
/// freshly mounted player locks this very tick.
fn apply_actions(
    world: &mut WorldState,
    inputs: &BTreeMap<EntityId, InputFrame>,
    config: &SimConfig,
    events: &mut EventQueue,
) {
    let tick = world.tick;
    for index in 0..world.players.len() {
        let player = &world.players[index];
        let Some(input) = inputs.get(&player.id) else {
            continue;
        };
        let (player_id, position, radius) = (player.id, player.position, player.radius);
        let reach = config.movement.mount_reach_factor * radius;
        let carrier = player.carrier;
        let mounted = player.mounted_module;

        if input.has_action(actions::DISMOUNT) {
            if let (Some(carrier_id), Some(module_id)) = (carrier, mounted) {
                if let Some(ship) = world.ship_mut(carrier_id) {
                    if let Some(module) = ship.module_mut(module_id) {
                        module.occupant = None;
                    }
                }
                let player = &mut world.players[index];
                player.mounted_module = None;
                player.mount_offset = None;
            }
        } else if input.has_action(actions::INTERACT) && mounted.is_none() {
            if let Some(carrier_id) = carrier {
                try_mount(world, index, carrier_id, player_id, position, reach);
            }
        }

        if input.has_action(actions::DESTROY_PLANK) {
            if let Some(carrier_id) = carrier {
                destroy_nearest_plank(world, carrier_id, position, reach, tick, events);
            }
        }
    }
}

/// Mount the nearest unoccupied mountable module within reach.
fn try_mount(
    world: &mut WorldState,
    player_index: usize,
    carrier_id: EntityId,
    player_id: EntityId,
    position: Vec2,
    reach: f32,
) {
    let Some(ship) = world.ship_mut(carrier_id) else {
        return;
    };
    let mut best: Option<(usize, f32)> = None;
    for (i, module) in ship.modules.iter().enumerate() {
        if !module.is_mountable() || module.occupant.is_some() {
            continue;
        }
        let distance = (ship.position + module.local_position.rotated(ship.rotation) - position).norm();
        if distance <= reach && best.is_none_or(|(_, d)| distance < d) {
            best = Some((i, distance));
        }
    }
    let Some((module_index, _)) = best else {
        return;
    };
    ship.modules[module_index].occupant = Some(player_id);
    let module_id = ship.modules[module_index].id;
    let module_local = ship.modules[module_index].local_position;

    let player = &mut world.players[player_index];
    player.mounted_module = Some(module_id);
    player.mount_offset = Some(Vec2::zeros());
    player.local_position = module_local;
}

/// Break the nearest plank within reach.
fn destroy_nearest_plank(
    world: &mut WorldState,
    carrier_id: EntityId,
    position: Vec2,
    reach: f32,
    tick: u64,
    events: &mut EventQueue,
) {
    let Some(ship) = world.ship_mut(carrier_id) else {
        return;
    };
    let mut best: Option<(usize, f32)> = None;
    for module in &ship.modules {
        let Some((segment, health)) = module.as_plank() else {
            continue;
        };
        if health <= 0.0 {
            continue;
        }
        let distance = (ship.position + module.local_position.rotated(ship.rotation) - position).norm();
        if distance <= reach && best.is_none_or(|(_, d)| distance < d) {
            best = Some((segment, distance));
        }
    }
    if let Some((segment, _)) = best {
        if let Some(ship) = world.ship_mut(carrier_id) {
            planks::damage_plank(ship, segment, 1000.0, tick, events);
        }
    }
}

/// Mounted regime: the player is a fixture of the rigid body.
fn ride_mounted(player: &mut Player, ship: &Ship) {
    let Some(module) = player.mounted_module.and_then(|id| ship.module(id)) else {
        return;
    };
    let local = module.local_position + player.mount_offset.unwrap_or_else(Vec2::zeros);
    player.local_position = local;
    player.position = ship.local_to_world(local);
    player.velocity = ship.velocity_at_local(local);
}

/// On-deck regime: carried-frame transform, walking input, ice drift,
/// jump-exit, plank-aware collision.
fn walk_deck(player: &mut Player, ship: &Ship, input: &InputFrame, config: &SimConfig, dt: f32) {
    // Reconstruct where the deck was last tick so the player rides both the
    // translation and the rotation of the hull.
    let prev_pos = ship.position - ship.velocity * dt;
    let prev_rot = wrap_angle(ship.rotation - ship.angular_velocity * dt);
    let delta_rot = angle_diff(ship.rotation, prev_rot);

    let rel = player.position - prev_pos;
    let rel_rotated = if delta_rot.abs() > EXACT_ROTATION_THRESHOLD {
        rel.rotated(delta_rot)
    } else {
        rel + rel.perp_ccw() * ship.angular_velocity * dt
    };
    let carried_position = ship.position + rel_rotated;

    // Client input arrives pre-transformed into the world frame.
    let input_world = input.movement * config.movement.player_walk_speed;

    let deck_velocity = ship.velocity + rel.perp_ccw() * ship.angular_velocity;
    let drift = player.velocity - deck_velocity;
    let decay = (-(std::f32::consts::LN_2) * dt / config.movement.ice_drift_half_life_s).exp();
    player.velocity = deck_velocity + drift * decay + input_world * dt;

    let proposed = carried_position + input_world * dt;

    let from_center = carried_position - ship.position;
    if input.has_action(actions::JUMP)
        && from_center.norm() > JUMP_EXIT_RADIUS_FACTOR * ship.bounding_radius()
    {
        // Near the rail a jump clears the hull entirely; detection converts
        // the player to water next tick.
        let boost = from_center.normalized_or_zero()
            * config.movement.player_walk_speed
            * 0.5
            * dt;
        player.position = proposed + boost;
        player.local_position = ship.world_to_local(player.position);
        return;
    }

    let epsilon = config.movement.eps_factor * player.radius;
    let result = sweep::swept_circle_vs_ship(
        carried_position,
        proposed,
        player.radius,
        player.velocity,
        ship,
        epsilon,
    );
    if result.collided {
        player.position = result.new_position;
        player.velocity = result.new_velocity * DECK_SLIDE_FRICTION;
    } else {
        player.position = result.new_position;
    }
    player.local_position = ship.world_to_local(player.position);
}

/// In-water regime: acceleration-based swimming with a hard speed cap and
/// plank-aware hull collision against nearby ships.
fn swim(player: &mut Player, input: &InputFrame, config: &SimConfig, ships: &[Ship], dt: f32) {
    let magnitude = input.movement.norm();
    if magnitude > SWIM_INPUT_DEADZONE {
        player.velocity += input.movement * config.movement.swim_accel * dt;
        let speed = player.velocity.norm();
        if speed > config.movement.swim_max_speed {
            player.velocity *= config.movement.swim_max_speed / speed;
        }
    } else {
        let speed = player.velocity.norm();
        let reduced = speed - config.movement.swim_decel * dt;
        if reduced <= 0.0 {
            player.velocity = Vec2::zeros();
        } else {
            player.velocity *= reduced / speed;
        }
    }

    let proposed = player.position + player.velocity * dt;
    let epsilon = config.movement.eps_factor * player.radius;

    for ship in ships {
        let reach = ship.bounding_radius() + player.radius + epsilon
            + player.velocity.norm() * dt;
        if (player.position - ship.position).norm() > reach {
            continue;
        }
        let result = sweep::swept_circle_vs_ship(
            player.position,
            proposed,
            player.radius,
            player.velocity,
            ship,
            epsilon,
        );
        if result.collided {
            player.position = result.new_position;
            player.velocity = result.new_velocity;
            return;
        }
    }
    player.position = proposed;
}

/// Reset non-finite player state so one bad frame cannot corrupt the world.
fn guard_player(player: &mut Player) {
    if !player.velocity.is_finite() {
        warn!("player {} velocity became non-finite, resetting", player.id);
        player.velocity = Vec2::zeros();
    }
    if !player.position.is_finite() {
        warn!("player {} position became non-finite, resetting", player.id);
        player.position = Vec2::zeros();
    }
}

fn ship_by_id(ships: &[Ship], id: EntityId) -> Option<&Ship> {
    ships.binary_search_by_key(&id, |s| s.id).ok().map(|i| &ships[i])
}
