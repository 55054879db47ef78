//! Demo scenario generation
//!
//! Builds seeded worlds for the demo subcommand, benches, and integration
//! tests. All randomness happens here, at world construction; the
//! simulation core itself never draws a random number, so a scenario seed
//! plus an input stream fully determines a run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::math::Vec2;
use crate::models::{Module, ModuleKind, Player, Ship, WorldState};
use crate::simulation::planks;

/// Module ids are namespaced per ship to keep them unique world-wide.
const MODULE_ID_STRIDE: u32 = 1000;

/// Build a fleet of `ship_count` ships scattered on open water with
/// `player_count` players standing on their decks.
pub fn demo_world(ship_count: u32, player_count: u32, seed: u64) -> WorldState {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut world = WorldState::new();

    for index in 0..ship_count {
        let id = index + 1;
        let spacing = 600.0;
        let position = Vec2::new(
            (index % 4) as f32 * spacing + rng.random_range(-80.0..80.0),
            (index / 4) as f32 * spacing + rng.random_range(-80.0..80.0),
        );
        let half_width = rng.random_range(80.0..140.0);
        let half_height = half_width * rng.random_range(0.35..0.55);
        let mut ship = Ship::new(id, position, Ship::rectangle_hull(half_width, half_height));
        ship.rotation = rng.random_range(-std::f32::consts::PI..std::f32::consts::PI);

        let base = id * MODULE_ID_STRIDE;
        ship.modules.push(Module::new(
            base,
            Vec2::new(-half_width * 0.7, 0.0),
            ModuleKind::Helm { steering: 0.0 },
        ));
        for mast in 0..rng.random_range(1..=3u32) {
            let x = half_width * (0.5 - mast as f32 * 0.5);
            ship.modules.push(Module::new(
                base + 1 + mast,
                Vec2::new(x, 0.0),
                ModuleKind::Mast {
                    openness: rng.random_range(40.0..100.0),
                    wind_efficiency: rng.random_range(0.7..1.0),
                },
            ));
        }
        ship.modules.push(Module::new(
            base + 10,
            Vec2::new(0.0, half_height * 0.6),
            ModuleKind::Cannon { aim: 0.0, reload_s: 0.0 },
        ));
        planks::fit_plank_ring(&mut ship, base + 100);

        world.add_ship(ship).unwrap();
    }

    // Player ids double as client ids, so they stay inside the validator's
    // slot range.
    for index in 0..player_count {
        let id = index + 1;
        let player = if ship_count > 0 {
            let ship = &world.ships[(index % ship_count) as usize];
            let mut player = Player::new(id, ship.position);
            player.carrier = Some(ship.id);
            player.local_position = Vec2::zeros();
            player
        } else {
            Player::new(id, Vec2::new(index as f32 * 50.0, -400.0))
        };
        let player_id = player.id;
        let carrier = player.carrier;
        world.add_player(player).unwrap();
        if let Some(state) = world.carrier_states.get_mut(&player_id) {
            state.carrier = carrier;
        }
    }

    world
}

/// Two ships on a collision course with one deckhand each: the smallest
/// world that exercises every subsystem.
pub fn collision_course_world() -> WorldState {
    let mut world = WorldState::new();

    let mut port = Ship::new(1, Vec2::new(-400.0, 0.0), Ship::rectangle_hull(100.0, 50.0));
    port.velocity = Vec2::new(25.0, 0.0);
    port.modules.push(Module::new(1000, Vec2::new(-70.0, 0.0), ModuleKind::Helm { steering: 0.0 }));
    port.modules.push(Module::new(
        1001,
        Vec2::zeros(),
        ModuleKind::Mast { openness: 100.0, wind_efficiency: 1.0 },
    ));
    planks::fit_plank_ring(&mut port, 1100);

    let mut starboard = Ship::new(2, Vec2::new(400.0, 0.0), Ship::rectangle_hull(100.0, 50.0));
    starboard.rotation = std::f32::consts::PI;
    starboard.velocity = Vec2::new(-25.0, 0.0);
    starboard
        .modules
        .push(Module::new(2000, Vec2::new(-70.0, 0.0), ModuleKind::Helm { steering: 0.0 }));
    starboard.modules.push(Module::new(
        2001,
        Vec2::zeros(),
        ModuleKind::Mast { openness: 100.0, wind_efficiency: 1.0 },
    ));
    planks::fit_plank_ring(&mut starboard, 2100);

    world.add_ship(port).unwrap();
    world.add_ship(starboard).unwrap();

    for (player_id, ship_id, position) in [(1, 1, Vec2::new(-400.0, 10.0)), (2, 2, Vec2::new(400.0, -10.0))] {
        let mut player = Player::new(player_id, position);
        player.carrier = Some(ship_id);
        world.add_player(player).unwrap();
        world.carrier_states.get_mut(&player_id).unwrap().carrier = Some(ship_id);
    }

    world
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_world_is_seeded() {
        let a = demo_world(4, 6, 42);
        let b = demo_world(4, 6, 42);
        assert_eq!(a, b);
        let c = demo_world(4, 6, 43);
        assert_ne!(a, c);
    }

    #[test]
    fn test_demo_world_shape() {
        let world = demo_world(3, 5, 7);
        assert_eq!(world.ships.len(), 3);
        assert_eq!(world.players.len(), 5);
        for ship in &world.ships {
            assert!(ship.plank_count() >= 3);
            assert!(ship.modules.iter().any(|m| matches!(m.kind, ModuleKind::Helm { .. })));
        }
        // Every player claims a carrier that exists.
        for player in &world.players {
            let carrier = player.carrier.unwrap();
            assert!(world.ship(carrier).is_some());
        }
    }

    #[test]
    fn test_collision_course_runs_clean() {
        use crate::config::SimConfig;
        use crate::events::EventQueue;
        use crate::simulation::step;

        let config = SimConfig::default();
        let mut events = EventQueue::default();
        let mut world = collision_course_world();
        for _ in 0..600 {
            world = step(&world, &std::collections::BTreeMap::new(), &config, &mut events);
        }
        // The ships met somewhere in the middle.
        assert!(events.drain().iter().any(|e| matches!(
            e,
            crate::events::SimEvent::ShipsCollided { ship_a: 1, ship_b: 2, .. }
        )));
    }
}
