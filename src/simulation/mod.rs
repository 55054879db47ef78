//! Simulation module for the BROADSIDE game server.
//!
//! The deterministic fixed-step core: ship dynamics, substepped ship-ship
//! collision, plank damage, carrier detection, player motion, and the swept
//! collision primitives they share. Everything here is synchronous and
//! allocation-light; the hosting loop drives it once per tick.

pub mod carrier;
pub mod collision;
pub mod dynamics;
pub mod r#loop;
pub mod movement;
pub mod planks;
pub mod sweep;

pub use r#loop::{step, Simulation};
pub use sweep::{swept_circle_vs_ship, SweepResult};
