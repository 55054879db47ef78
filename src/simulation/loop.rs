//! Simulation tick loop
//!
//! Advances the world by exactly one fixed step. The order of operations is
//! part of the contract: ship dynamics first (velocities only), then
//! substepped position integration with ship-ship collision, then carrier
//! detection and player motion, then projectiles, and finally the rewind
//! snapshot. `step` is pure from the outside: it clones the previous world
//! and returns the successor.

use std::collections::BTreeMap;
use std::time::Instant;

use log::warn;

use crate::config::SimConfig;
use crate::events::EventQueue;
use crate::models::{EntityId, InputFrame, WorldState};
use crate::rewind::{CompactSnapshot, RewindBuffer};
use crate::simulation::{carrier, collision, dynamics, movement};

/// Advance `prev` by one tick under `inputs` (keyed by player id).
///
/// Deterministic: identical inputs on an identical world produce an
/// identical successor. Entities are processed in ascending id order.
pub fn step(
    prev: &WorldState,
    inputs: &BTreeMap<EntityId, InputFrame>,
    config: &SimConfig,
    events: &mut EventQueue,
) -> WorldState {
    let mut world = prev.clone();
    world.tick += 1;
    world.timestamp_ms += config.dt_ms();
    let dt = config.dt();

    // 1. Forces and velocity integration; poses stay put.
    for ship in &mut world.ships {
        dynamics::step_ship_dynamics(ship, dt);
    }

    // 2. Substepped pose integration and ship-ship collision.
    collision::integrate_and_collide(&mut world, config, dt, events);

    // 3. Carrier detection, then regime motion, per player.
    carrier::update_carriers(&mut world, config, events);
    movement::update_players(&mut world, inputs, config, dt, events);

    // 4. Projectiles fly ballistically and expire.
    for projectile in &mut world.projectiles {
        projectile.position += projectile.velocity * dt;
        projectile.ttl_s -= dt;
    }
    world.projectiles.retain(|p| p.ttl_s > 0.0);

    world
}

/// The owning wrapper around the world, the event ring, and the rewind
/// buffer: one instance per hosted match.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    /// The authoritative world.
    pub world: WorldState,
    /// Events raised during ticks, drained by the outbound encoder.
    pub events: EventQueue,
    /// Historical snapshots for lag-compensated validation.
    pub rewind: RewindBuffer,
    overruns: u64,
}

impl Simulation {
    /// Create a simulation with an empty world.
    pub fn new(config: SimConfig) -> Result<Self, String> {
        Self::with_world(config, WorldState::new())
    }

    /// Create a simulation hosting an existing world.
    pub fn with_world(config: SimConfig, world: WorldState) -> Result<Self, String> {
        config.validate()?;
        let rewind = RewindBuffer::new(
            config.rewind.buffer_size,
            config.rewind.max_rewind_ms,
            config.combat.hit_damage,
            config.combat.shot_range_max,
        );
        Ok(Self {
            config,
            world,
            events: EventQueue::default(),
            rewind,
            overruns: 0,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Ticks that blew their time budget so far.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Run one tick and store its snapshot in the rewind ring.
    ///
    /// `client_delays_ms` is the network layer's current per-client delay
    /// measurement, captured alongside the snapshot.
    pub fn tick(&mut self, inputs: &BTreeMap<EntityId, InputFrame>, client_delays_ms: Vec<f32>) {
        let started = Instant::now();

        self.world = step(&self.world, inputs, &self.config, &mut self.events);
        self.rewind.store(
            self.world.tick,
            self.world.timestamp_ms,
            CompactSnapshot::of(&self.world),
            client_delays_ms,
        );

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        if elapsed_ms > self.config.dt_ms() {
            // Never interrupted, never skipped; just noted.
            self.overruns += 1;
            warn!(
                "tick {} overran its budget: {:.2} ms > {:.2} ms",
                self.world.tick,
                elapsed_ms,
                self.config.dt_ms()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use crate::models::{Module, ModuleKind, Player, Projectile, Ship};

    fn small_world() -> WorldState {
        let mut world = WorldState::new();
        let mut ship = Ship::new(1, Vec2::zeros(), Ship::rectangle_hull(100.0, 50.0));
        ship.modules.push(Module::new(1, Vec2::new(60.0, 0.0), ModuleKind::Helm { steering: 0.3 }));
        ship.modules.push(Module::new(
            2,
            Vec2::new(-20.0, 0.0),
            ModuleKind::Mast { openness: 80.0, wind_efficiency: 0.9 },
        ));
        crate::simulation::planks::fit_plank_ring(&mut ship, 100);
        world.add_ship(ship).unwrap();
        world.add_player(Player::new(7, Vec2::new(40.0, 10.0))).unwrap();
        world
    }

    #[test]
    fn test_tick_and_timestamp_advance() {
        let config = SimConfig::default();
        let mut events = EventQueue::default();
        let w0 = small_world();
        let w1 = step(&w0, &BTreeMap::new(), &config, &mut events);
        assert_eq!(w1.tick, w0.tick + 1);
        assert!(w1.timestamp_ms > w0.timestamp_ms);
        assert!((w1.timestamp_ms - config.dt_ms()).abs() < 1e-9);
        // The input world is untouched.
        assert_eq!(w0.tick, 0);
    }

    #[test]
    fn test_step_is_deterministic() {
        let config = SimConfig::default();
        let mut inputs = BTreeMap::new();
        let mut frame = InputFrame::idle(7);
        frame.movement = Vec2::new(0.5, 0.2);
        inputs.insert(7, frame);

        let mut a = small_world();
        let mut b = small_world();
        let mut events_a = EventQueue::default();
        let mut events_b = EventQueue::default();
        for _ in 0..120 {
            a = step(&a, &inputs, &config, &mut events_a);
            b = step(&b, &inputs, &config, &mut events_b);
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_speed_invariants_hold_every_tick() {
        let config = SimConfig::default();
        let mut events = EventQueue::default();
        let mut world = small_world();
        for _ in 0..200 {
            world = step(&world, &BTreeMap::new(), &config, &mut events);
            for ship in &world.ships {
                assert!(ship.velocity.norm() <= ship.max_speed + 1e-3);
                assert!(ship.angular_velocity.abs() <= ship.turn_rate + 1e-5);
            }
        }
    }

    #[test]
    fn test_projectiles_fly_and_expire() {
        let config = SimConfig::default();
        let mut events = EventQueue::default();
        let mut world = WorldState::new();
        world.projectiles.push(Projectile {
            id: 1,
            owner: 7,
            position: Vec2::zeros(),
            velocity: Vec2::new(300.0, 0.0),
            ttl_s: 0.1,
        });

        world = step(&world, &BTreeMap::new(), &config, &mut events);
        assert!((world.projectiles[0].position.x - 10.0).abs() < 1e-3);
        for _ in 0..5 {
            world = step(&world, &BTreeMap::new(), &config, &mut events);
        }
        assert!(world.projectiles.is_empty());
    }

    #[test]
    fn test_simulation_stores_rewind_snapshots() {
        let mut sim = Simulation::with_world(SimConfig::default(), small_world()).unwrap();
        for _ in 0..5 {
            sim.tick(&BTreeMap::new(), vec![0.0; 8]);
        }
        assert_eq!(sim.rewind.newest_tick(), Some(5));
        assert!(sim.rewind.can_rewind(1));
        let entry = sim.rewind.get_state(3).unwrap();
        assert_eq!(entry.tick, 3);
        assert_eq!(entry.snapshot.ships.len(), 1);
        assert_eq!(entry.snapshot.players.len(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = SimConfig::default();
        config.collision_substeps = 0;
        assert!(Simulation::new(config).is_err());
    }
}
