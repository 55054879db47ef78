//! Ship dynamics
//!
//! Force computation and velocity integration for ships: helm steering into
//! angular velocity, sail state into thrust, drag, and the per-tick speed
//! clamps. Position integration happens later, inside the collision
//! substeps, so every substep sees a consistent pose.

use log::warn;

use crate::math::{Vec2, Vec2Ext};
use crate::models::Ship;

/// Dynamics constants
pub mod constants {
    /// Thrust with sails fully struck (keeps a ship steerable).
    pub const MIN_THRUST: f32 = 300.0;
    /// Thrust at full effective sail power.
    pub const MAX_THRUST: f32 = 8000.0;
    /// Fixed angular damping applied every tick before `angular_drag`.
    pub const ANGULAR_DAMPING: f32 = 0.92;
    /// Gain from steering effectiveness to angular acceleration.
    pub const STEERING_GAIN: f32 = 1.5;
    /// Exponent shaping sail openness into power.
    pub const SAIL_EXPONENT: f32 = 0.7;
    /// Cap on combined sail effectiveness.
    pub const MAX_SAIL_EFFECTIVENESS: f32 = 1.25;
}

/// Turning effectiveness as a function of current speed. Slow ships barely
/// answer the helm; effectiveness grows to its cap at 40 units/s.
pub fn turning_effectiveness(speed: f32) -> f32 {
    if speed < 5.0 {
        0.05 + 0.1 * (speed / 5.0)
    } else {
        0.15 + 0.35 * (speed / 40.0).min(1.0)
    }
}

/// Combined sail power over every mast: `(openness/100)^0.7 · efficiency`.
pub fn sail_power(ship: &Ship) -> f32 {
    ship.masts()
        .map(|(openness, efficiency)| {
            (openness.clamp(0.0, 100.0) / 100.0).powf(constants::SAIL_EXPONENT) * efficiency
        })
        .sum()
}

/// Thrust magnitude produced by the current sail state.
pub fn thrust_magnitude(ship: &Ship) -> f32 {
    let mast_count = ship.masts().count();
    if mast_count == 0 {
        return constants::MIN_THRUST;
    }
    let power = sail_power(ship);
    let average = power / mast_count as f32;
    let mast_bonus = 1.0 + 0.1 * (mast_count as f32 - 1.0);
    let area_mult = 1.0 + 0.25 * power;
    let effective = (average * mast_bonus * area_mult).min(constants::MAX_SAIL_EFFECTIVENESS);
    constants::MIN_THRUST + (constants::MAX_THRUST - constants::MIN_THRUST) * effective
}

/// Angular step: steering into angular velocity. The heading itself
/// advances inside the collision substeps so every substep sees a pose
/// consistent with the distance traveled.
pub fn integrate_angular(ship: &mut Ship, dt: f32) {
    let steering = ship.helm_steering();
    let effectiveness = turning_effectiveness(ship.velocity.norm());
    let angular_acceleration = steering * effectiveness * constants::STEERING_GAIN;

    ship.angular_velocity += angular_acceleration * dt;
    ship.angular_velocity *= constants::ANGULAR_DAMPING;
    ship.angular_velocity *= ship.angular_drag;
    ship.angular_velocity = ship.angular_velocity.clamp(-ship.turn_rate, ship.turn_rate);
}

/// Linear step: sail thrust along the heading, water drag, speed clamp.
pub fn integrate_linear(ship: &mut Ship, dt: f32) {
    let thrust = thrust_magnitude(ship);
    let heading = Vec2::new(ship.rotation.cos(), ship.rotation.sin());
    ship.velocity += heading * (thrust / ship.mass) * dt;
    ship.velocity *= ship.water_drag;

    let speed = ship.velocity.norm();
    if speed > ship.max_speed {
        ship.velocity *= ship.max_speed / speed;
    }
}

/// Full dynamics step for one ship: anomaly guard, then angular and linear
/// integration. After this call `|velocity| ≤ max_speed` and
/// `|angular_velocity| ≤ turn_rate` hold.
pub fn step_ship_dynamics(ship: &mut Ship, dt: f32) {
    guard_anomalies(ship);
    integrate_angular(ship, dt);
    integrate_linear(ship, dt);
}

/// Reset non-finite velocities so one corrupted entity cannot poison the
/// tick. The entity survives.
pub fn guard_anomalies(ship: &mut Ship) {
    if !ship.velocity.is_finite() {
        warn!("ship {} velocity became non-finite, resetting", ship.id);
        ship.velocity = Vec2::zeros();
    }
    if !ship.angular_velocity.is_finite() {
        warn!("ship {} angular velocity became non-finite, resetting", ship.id);
        ship.angular_velocity = 0.0;
    }
    if !ship.position.is_finite() {
        warn!("ship {} position became non-finite, resetting to origin", ship.id);
        ship.position = Vec2::zeros();
    }
    if !ship.rotation.is_finite() {
        ship.rotation = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Module, ModuleKind};

    fn sailing_ship() -> Ship {
        let mut ship = Ship::new(1, Vec2::zeros(), Ship::rectangle_hull(100.0, 50.0));
        ship.modules.push(Module::new(1, Vec2::zeros(), ModuleKind::Helm { steering: 0.0 }));
        ship.modules.push(Module::new(
            2,
            Vec2::new(-20.0, 0.0),
            ModuleKind::Mast { openness: 100.0, wind_efficiency: 1.0 },
        ));
        ship
    }

    #[test]
    fn test_turning_effectiveness_piecewise() {
        assert!((turning_effectiveness(0.0) - 0.05).abs() < 1e-6);
        assert!((turning_effectiveness(2.5) - 0.1).abs() < 1e-6);
        assert!((turning_effectiveness(5.0) - 0.19375).abs() < 1e-5);
        assert!((turning_effectiveness(40.0) - 0.5).abs() < 1e-6);
        // Saturates past 40 units/s.
        assert!((turning_effectiveness(400.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_thrust_without_masts_is_minimum() {
        let ship = Ship::new(1, Vec2::zeros(), Ship::rectangle_hull(100.0, 50.0));
        assert_eq!(thrust_magnitude(&ship), constants::MIN_THRUST);
    }

    #[test]
    fn test_thrust_grows_with_openness() {
        let mut ship = sailing_ship();
        let full = thrust_magnitude(&ship);
        for module in &mut ship.modules {
            if let ModuleKind::Mast { openness, .. } = &mut module.kind {
                *openness = 25.0;
            }
        }
        let quarter = thrust_magnitude(&ship);
        assert!(full > quarter);
        assert!(quarter > constants::MIN_THRUST);
    }

    #[test]
    fn test_speed_clamped_after_step() {
        let mut ship = sailing_ship();
        ship.max_speed = 10.0;
        for _ in 0..300 {
            step_ship_dynamics(&mut ship, 1.0 / 30.0);
            assert!(ship.velocity.norm() <= ship.max_speed + 1e-4);
        }
    }

    #[test]
    fn test_turn_rate_clamped_after_step() {
        let mut ship = sailing_ship();
        ship.turn_rate = 0.4;
        for module in &mut ship.modules {
            if let ModuleKind::Helm { steering } = &mut module.kind {
                *steering = 1.0;
            }
        }
        for _ in 0..300 {
            step_ship_dynamics(&mut ship, 1.0 / 30.0);
            assert!(ship.angular_velocity.abs() <= ship.turn_rate + 1e-5);
        }
    }

    #[test]
    fn test_anomaly_guard_resets_nan_velocity() {
        let mut ship = sailing_ship();
        ship.velocity = Vec2::new(f32::NAN, 3.0);
        ship.angular_velocity = f32::INFINITY;
        step_ship_dynamics(&mut ship, 1.0 / 30.0);
        assert!(ship.velocity.is_finite());
        assert!(ship.angular_velocity.is_finite());
    }

    #[test]
    fn test_pose_untouched_by_dynamics() {
        let mut ship = sailing_ship();
        ship.velocity = Vec2::new(20.0, 0.0);
        ship.angular_velocity = 0.5;
        let (position, rotation) = (ship.position, ship.rotation);
        step_ship_dynamics(&mut ship, 1.0 / 30.0);
        // Pose integration belongs to the collision substeps.
        assert_eq!(ship.position, position);
        assert_eq!(ship.rotation, rotation);
    }
}
