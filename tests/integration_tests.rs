//! Integration tests for the BROADSIDE simulation server
//!
//! These tests drive complete workflows through the public API: full ticks
//! through `step`, carrier transitions, lag-compensated hit validation, and
//! the input gate in front of the loop.

use std::collections::BTreeMap;

use proptest::prelude::*;

use broadside::config::SimConfig;
use broadside::events::{EventQueue, SimEvent};
use broadside::math::{Vec2, Vec2Ext};
use broadside::models::{actions, InputFrame, Module, ModuleKind, Player, Ship, WorldState};
use broadside::scenario;
use broadside::simulation::{planks, step, Simulation};
use broadside::validation::{InputValidator, Violation};

/// A 200x100 ship at the origin with helm, one mast, and a full plank ring.
fn test_ship(id: u32, position: Vec2) -> Ship {
    let mut ship = Ship::new(id, position, Ship::rectangle_hull(100.0, 50.0));
    let base = id * 1000;
    ship.modules.push(Module::new(base, Vec2::new(-70.0, 0.0), ModuleKind::Helm { steering: 0.0 }));
    ship.modules.push(Module::new(
        base + 1,
        Vec2::zeros(),
        ModuleKind::Mast { openness: 0.0, wind_efficiency: 1.0 },
    ));
    planks::fit_plank_ring(&mut ship, base + 100);
    ship
}

fn movement_input(player_id: u32, movement: Vec2) -> BTreeMap<u32, InputFrame> {
    let mut frame = InputFrame::idle(player_id);
    frame.movement = movement;
    let mut inputs = BTreeMap::new();
    inputs.insert(player_id, frame);
    inputs
}

#[test]
fn test_carrier_hysteresis_enters_on_second_tick() {
    let config = SimConfig::default();
    let mut events = EventQueue::default();
    let mut world = WorldState::new();
    world.add_ship(test_ship(1, Vec2::zeros())).unwrap();
    world.add_player(Player::new(7, Vec2::new(50.0, 0.0))).unwrap();

    world = step(&world, &BTreeMap::new(), &config, &mut events);
    assert_eq!(world.player(7).unwrap().carrier, None);
    let track = world.carrier_states[&7].candidates[&1];
    assert_eq!(track.confirm_ticks, 1);
    assert!(track.penetration > 0.0);

    world = step(&world, &BTreeMap::new(), &config, &mut events);
    assert_eq!(world.player(7).unwrap().carrier, Some(1));
    assert!(events.drain().iter().any(|e| matches!(
        e,
        SimEvent::CarrierChanged { player_id: 7, old: None, new: Some(1), .. }
    )));
}

#[test]
fn test_plank_gap_fall_through_ends_in_water() {
    let config = SimConfig::default();
    let mut events = EventQueue::default();
    let mut world = WorldState::new();
    let mut ship = test_ship(1, Vec2::zeros());
    // Open the starboard edge (hull segment 1 of the CCW rectangle).
    planks::damage_plank(&mut ship, 1, 1000.0, 0, &mut events);
    world.add_ship(ship).unwrap();
    let mut player = Player::new(7, Vec2::new(80.0, 0.0));
    player.carrier = Some(1);
    world.add_player(player).unwrap();
    world.carrier_states.get_mut(&7).unwrap().carrier = Some(1);
    events.drain();

    // Walk straight at the missing wall.
    let inputs = movement_input(7, Vec2::new(1.0, 0.0));
    for _ in 0..30 {
        world = step(&world, &inputs, &config, &mut events);
    }

    let player = world.player(7).unwrap();
    // Clean through the gap and off the deck.
    assert!(player.position.x > 100.0);
    assert_eq!(player.carrier, None);
    assert!(events.drain().iter().any(|e| matches!(
        e,
        SimEvent::LeftDeck { player_id: 7, old: 1, .. }
    )));
}

#[test]
fn test_healthy_rail_keeps_walker_aboard() {
    let config = SimConfig::default();
    let mut events = EventQueue::default();
    let mut world = WorldState::new();
    world.add_ship(test_ship(1, Vec2::zeros())).unwrap();
    let mut player = Player::new(7, Vec2::new(80.0, 0.0));
    player.carrier = Some(1);
    world.add_player(player).unwrap();
    world.carrier_states.get_mut(&7).unwrap().carrier = Some(1);

    let inputs = movement_input(7, Vec2::new(1.0, 0.0));
    for _ in 0..30 {
        world = step(&world, &inputs, &config, &mut events);
    }

    let player = world.player(7).unwrap();
    assert!(player.position.x < 100.0);
    assert_eq!(player.carrier, Some(1));
}

#[test]
fn test_head_on_collision_damages_facing_planks() {
    let config = SimConfig::default();
    let mut events = EventQueue::default();
    let mut world = WorldState::new();
    let mut a = test_ship(1, Vec2::new(-150.0, 0.0));
    a.velocity = Vec2::new(30.0, 0.0);
    let mut b = test_ship(2, Vec2::new(150.0, 0.0));
    b.velocity = Vec2::new(-30.0, 0.0);
    world.add_ship(a).unwrap();
    world.add_ship(b).unwrap();

    let mut collided = false;
    for _ in 0..120 {
        world = step(&world, &BTreeMap::new(), &config, &mut events);
        if events.drain().iter().any(|e| matches!(e, SimEvent::ShipsCollided { .. })) {
            collided = true;
            break;
        }
    }
    assert!(collided);

    // Ship A takes its damage on the starboard (facing) arc, capped at 15.
    let healths_a = planks::segment_healths(world.ship(1).unwrap());
    assert!(healths_a[1] < 100.0);
    assert!(healths_a[1] >= 85.0);
    // Ship B faces the contact across its local angle π arc.
    let healths_b = planks::segment_healths(world.ship(2).unwrap());
    assert!(healths_b[3] < 100.0);

    // Approach reversed.
    assert!(world.ship(1).unwrap().velocity.x < 30.0);
    assert!(world.ship(2).unwrap().velocity.x > -30.0);
}

#[test]
fn test_rate_limit_first_input_exception() {
    let config = SimConfig::default();
    let mut validator = InputValidator::new(config.validator.clone());

    let mut first = InputFrame::idle(7);
    first.client_timestamp_ms = 1000.0;
    first.movement = Vec2::new(0.5, 0.0);
    assert!(validator.validate(7, &first, 1000.0).accepted);

    let mut second = first.clone();
    second.client_timestamp_ms = 1004.0;
    let result = validator.validate(7, &second, 1004.0);
    assert!(!result.accepted);
    assert_eq!(result.violation, Some(Violation::RateLimit));
}

#[test]
fn test_hit_validation_uses_rewound_geometry() {
    let config = SimConfig::default();
    let mut sim = Simulation::new(config).unwrap();
    sim.world.add_ship(test_ship(1, Vec2::new(300.0, 0.0))).unwrap();

    // A few ticks with the ship near the firing line.
    for _ in 0..4 {
        sim.tick(&BTreeMap::new(), Vec::new());
    }
    let lagged_tick = sim.world.tick;

    // The ship then sails far out of range.
    sim.world.ship_mut(1).unwrap().position = Vec2::new(6000.0, 0.0);
    for _ in 0..4 {
        sim.tick(&BTreeMap::new(), Vec::new());
    }

    // A 100 ms laggard's claim validates against what they actually saw.
    let result = sim.rewind.validate_hit(7, lagged_tick, Vec2::zeros(), Vec2::new(1.0, 0.0), 1000.0);
    assert!(result.hit_valid);
    assert_eq!(result.target_id, Some(1));
    assert!(result.rewind_ms > 0.0);

    // The same shot against present geometry is a miss.
    let now = sim.world.tick;
    let result = sim.rewind.validate_hit(7, now, Vec2::zeros(), Vec2::new(1.0, 0.0), 1000.0);
    assert!(!result.hit_valid);
}

#[test]
fn test_mount_lock_follows_rigid_body() {
    let config = SimConfig::default();
    let mut events = EventQueue::default();
    let mut world = WorldState::new();
    let mut ship = test_ship(1, Vec2::zeros());
    ship.velocity = Vec2::new(5.0, 0.0);
    ship.angular_velocity = 0.5;
    ship.module_mut(1000).unwrap().occupant = Some(7);
    world.add_ship(ship).unwrap();

    let mut player = Player::new(7, Vec2::new(-70.0, 0.0));
    player.carrier = Some(1);
    player.mounted_module = Some(1000);
    player.mount_offset = Some(Vec2::zeros());
    world.add_player(player).unwrap();
    world.carrier_states.get_mut(&7).unwrap().carrier = Some(1);

    // Full movement input must be ignored while mounted.
    let inputs = movement_input(7, Vec2::new(1.0, 1.0));
    world = step(&world, &inputs, &config, &mut events);

    let ship = world.ship(1).unwrap().clone();
    let player = world.player(7).unwrap();
    let expected_position = ship.local_to_world(Vec2::new(-70.0, 0.0));
    let expected_velocity = ship.velocity_at_local(Vec2::new(-70.0, 0.0));
    assert!(player.position.approx_eq(&expected_position, 1e-3));
    assert!(player.velocity.approx_eq(&expected_velocity, 1e-3));
}

#[test]
fn test_quiet_world_barely_moves() {
    // No sails drawing, no input: a tick leaves the world essentially in
    // place (mastless thrust floor aside).
    let config = SimConfig::default();
    let mut events = EventQueue::default();
    let mut world = WorldState::new();
    world.add_ship(test_ship(1, Vec2::zeros())).unwrap();

    let next = step(&world, &BTreeMap::new(), &config, &mut events);
    let moved = (next.ship(1).unwrap().position - world.ship(1).unwrap().position).norm();
    assert!(moved < 1e-2);
    assert_eq!(next.ship(1).unwrap().rotation, 0.0);
    world = next;
    assert_eq!(world.tick, 1);
}

#[test]
fn test_destroyed_plank_emits_event_through_full_tick() {
    let config = SimConfig::default();
    let mut events = EventQueue::default();
    let mut world = WorldState::new();
    world.add_ship(test_ship(1, Vec2::zeros())).unwrap();
    let mut player = Player::new(7, Vec2::new(95.0, 0.0));
    player.carrier = Some(1);
    world.add_player(player).unwrap();
    world.carrier_states.get_mut(&7).unwrap().carrier = Some(1);

    let mut frame = InputFrame::idle(7);
    frame.actions = actions::DESTROY_PLANK;
    let mut inputs = BTreeMap::new();
    inputs.insert(7, frame);
    world = step(&world, &inputs, &config, &mut events);

    assert!(planks::has_destroyed_planks(world.ship(1).unwrap()));
    assert!(events.drain().iter().any(|e| matches!(
        e,
        SimEvent::PlankDestroyed { ship_id: 1, segment_index: 1, .. }
    )));
}

#[test]
fn test_demo_scenario_long_run_keeps_invariants() {
    let config = SimConfig::default();
    let mut events = EventQueue::default();
    let mut world = scenario::demo_world(6, 8, 42);

    for _ in 0..300 {
        let prev_tick = world.tick;
        let prev_timestamp = world.timestamp_ms;
        world = step(&world, &BTreeMap::new(), &config, &mut events);
        assert_eq!(world.tick, prev_tick + 1);
        assert!(world.timestamp_ms > prev_timestamp);
        for ship in &world.ships {
            assert!(ship.velocity.norm() <= ship.max_speed + 1e-3);
            assert!(ship.angular_velocity.abs() <= ship.turn_rate + 1e-4);
            assert!(ship.rotation.abs() <= std::f32::consts::PI + 1e-4);
        }
        events.drain();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_two_runs_are_tick_identical(
        seed in 0u64..1000,
        mx in -1.0f32..1.0,
        my in -1.0f32..1.0,
    ) {
        let config = SimConfig::default();
        let inputs = movement_input(1, Vec2::new(mx, my));

        let mut a = scenario::demo_world(3, 2, seed);
        let mut b = scenario::demo_world(3, 2, seed);
        let mut events_a = EventQueue::default();
        let mut events_b = EventQueue::default();
        for _ in 0..30 {
            a = step(&a, &inputs, &config, &mut events_a);
            b = step(&b, &inputs, &config, &mut events_b);
        }
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_speed_clamps_hold_for_any_helm_and_sails(
        steering in -1.0f32..1.0,
        openness in 0.0f32..100.0,
    ) {
        let config = SimConfig::default();
        let mut events = EventQueue::default();
        let mut world = WorldState::new();
        let mut ship = test_ship(1, Vec2::zeros());
        for module in &mut ship.modules {
            match &mut module.kind {
                ModuleKind::Helm { steering: s } => *s = steering,
                ModuleKind::Mast { openness: o, .. } => *o = openness,
                _ => {}
            }
        }
        world.add_ship(ship).unwrap();

        for _ in 0..90 {
            world = step(&world, &BTreeMap::new(), &config, &mut events);
            let ship = world.ship(1).unwrap();
            prop_assert!(ship.velocity.norm() <= ship.max_speed + 1e-3);
            prop_assert!(ship.angular_velocity.abs() <= ship.turn_rate + 1e-4);
        }
    }

    #[test]
    fn prop_local_world_round_trip(
        x in -500.0f32..500.0,
        y in -500.0f32..500.0,
        px in -200.0f32..200.0,
        py in -200.0f32..200.0,
        rotation in -std::f32::consts::PI..std::f32::consts::PI,
    ) {
        let mut ship = Ship::new(1, Vec2::new(x, y), Ship::rectangle_hull(100.0, 50.0));
        ship.rotation = rotation;
        let local = Vec2::new(px, py);
        let back = ship.world_to_local(ship.local_to_world(local));
        prop_assert!(back.approx_eq(&local, 1e-2));
    }
}
