//! Configuration module
//!
//! Every tunable of the simulation core, with compile-time defaults matching
//! the shipped game balance. The core takes a [`SimConfig`] at init and never
//! reads files itself; the hosting binary may overlay a YAML file on top of
//! the defaults.

use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed step rate in Hz (server targets 30 or 45).
    pub tick_hz: f32,
    /// Ship-ship collision substeps per tick. Raise together with
    /// `max_speed` to keep tunneling impossible at higher speeds.
    pub collision_substeps: u32,
    /// Margin added to hull bounding radii in the collision broad phase.
    pub broad_phase_margin: f32,
    /// Seconds of client silence before a disconnect between ticks.
    pub inactivity_timeout_s: f32,
    /// Lag-compensation ring buffer settings.
    pub rewind: RewindConfig,
    /// Carrier-attachment hysteresis settings.
    pub carrier: CarrierConfig,
    /// Player motion settings.
    pub movement: MovementConfig,
    /// Input validation / anti-cheat settings.
    pub validator: ValidatorConfig,
    /// Hit validation combat settings.
    pub combat: CombatConfig,
}

/// Rewind ring buffer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewindConfig {
    /// Ring capacity in frames. Must hold at least `max_rewind_ms` of
    /// history at the configured tick rate.
    pub buffer_size: usize,
    /// Maximum lag compensation window in milliseconds.
    pub max_rewind_ms: f64,
}

/// Carrier detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrierConfig {
    /// Consecutive candidate ticks before a ship may become the carrier.
    pub confirm_in_ticks: u32,
    /// Missing ticks before the current carrier is released.
    pub confirm_out_ticks: u32,
    /// Minimum milliseconds between switches to a different ship. Exits to
    /// open water are never delayed.
    pub switch_cooldown_ms: f64,
    /// Distance from the carrier center past which the player is forcibly
    /// detached, bypassing all cooldowns.
    pub hard_exit_distance: f32,
}

/// Player motion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Collision epsilon band as a fraction of the player radius.
    pub eps_factor: f32,
    /// Half-life of on-deck momentum relative to the carrier, seconds.
    pub ice_drift_half_life_s: f32,
    /// On-deck walking speed, units/s.
    pub player_walk_speed: f32,
    /// Swimming acceleration, units/s².
    pub swim_accel: f32,
    /// Swimming deceleration when idle, units/s².
    pub swim_decel: f32,
    /// Swimming speed cap, units/s.
    pub swim_max_speed: f32,
    /// Mount interaction reach as a multiple of the player radius.
    pub mount_reach_factor: f32,
}

/// Input validator configuration. Every check can be disabled individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Hard cap on tracked clients; validator state is a fixed array.
    pub max_clients: usize,
    /// Minimum gap between inputs in milliseconds (8 ms caps at 120 Hz).
    pub min_input_interval_ms: f64,
    /// Sliding burst window length in milliseconds.
    pub burst_window_ms: f64,
    /// Maximum inputs allowed inside one burst window.
    pub max_inputs_per_window: usize,
    /// Largest accepted forward timestamp jump in milliseconds.
    pub max_timestamp_gap_ms: f64,
    /// Window within which an identical frame counts as a duplicate.
    pub duplicate_window_ms: f64,
    /// Accumulated pattern score that raises the anomaly flag.
    pub pattern_flag_threshold: f32,
    /// Suspicion score at which `should_ban` trips.
    pub ban_threshold_score: f32,
    /// Enable the per-client rate check.
    pub check_rate: bool,
    /// Enable the burst window check.
    pub check_burst: bool,
    /// Enable the movement magnitude check.
    pub check_movement: bool,
    /// Enable the movement pattern anomaly check.
    pub check_pattern: bool,
    /// Enable the unknown-action-bits check.
    pub check_actions: bool,
    /// Enable the timestamp sanity check.
    pub check_timestamp: bool,
    /// Enable the duplicate frame check.
    pub check_duplicate: bool,
}

/// Hit validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Damage applied on a validated hit.
    pub hit_damage: f32,
    /// Longest shot range a client may claim.
    pub shot_range_max: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_hz: 30.0,
            collision_substeps: 3,
            broad_phase_margin: 5.0,
            inactivity_timeout_s: 30.0,
            rewind: RewindConfig::default(),
            carrier: CarrierConfig::default(),
            movement: MovementConfig::default(),
            validator: ValidatorConfig::default(),
            combat: CombatConfig::default(),
        }
    }
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self {
            buffer_size: 16,
            max_rewind_ms: 350.0,
        }
    }
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            confirm_in_ticks: 2,
            confirm_out_ticks: 1,
            switch_cooldown_ms: 50.0,
            hard_exit_distance: 400.0,
        }
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            eps_factor: 0.03,
            ice_drift_half_life_s: 0.35,
            player_walk_speed: 200.0,
            swim_accel: 160.0,
            swim_decel: 120.0,
            swim_max_speed: 30.0,
            mount_reach_factor: 2.5,
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_clients: 64,
            min_input_interval_ms: 8.0,
            burst_window_ms: 100.0,
            max_inputs_per_window: 16,
            max_timestamp_gap_ms: 200.0,
            duplicate_window_ms: 50.0,
            pattern_flag_threshold: 5.0,
            ban_threshold_score: 0.85,
            check_rate: true,
            check_burst: true,
            check_movement: true,
            check_pattern: true,
            check_actions: true,
            check_timestamp: true,
            check_duplicate: true,
        }
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            hit_damage: 25.0,
            shot_range_max: 1500.0,
        }
    }
}

impl SimConfig {
    /// Fixed time step in seconds.
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_hz
    }

    /// Fixed time step in milliseconds.
    pub fn dt_ms(&self) -> f64 {
        1000.0 / self.tick_hz as f64
    }

    /// Load a configuration overlay from a YAML file. Missing fields fall
    /// back to the compile-time defaults.
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Returns
    /// Returns a `Result` containing the loaded `SimConfig` or an error
    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
        let config: SimConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;
        config.validate()?;
        info!("Loaded simulation config from {}", path.display());
        Ok(config)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_hz <= 0.0 || !self.tick_hz.is_finite() {
            return Err(format!("tick_hz must be positive, got {}", self.tick_hz));
        }
        if self.collision_substeps == 0 {
            return Err("collision_substeps must be at least 1".to_string());
        }
        if self.rewind.buffer_size < 16 {
            return Err(format!(
                "rewind.buffer_size must be at least 16, got {}",
                self.rewind.buffer_size
            ));
        }
        let coverage_ms = self.rewind.buffer_size as f64 * self.dt_ms();
        if coverage_ms < self.rewind.max_rewind_ms {
            return Err(format!(
                "rewind buffer covers {:.0} ms but max_rewind_ms is {:.0} ms",
                coverage_ms, self.rewind.max_rewind_ms
            ));
        }
        if self.carrier.confirm_in_ticks == 0 {
            return Err("carrier.confirm_in_ticks must be at least 1".to_string());
        }
        if self.movement.eps_factor < 0.0 {
            return Err("movement.eps_factor must not be negative".to_string());
        }
        if self.validator.max_clients == 0 {
            return Err("validator.max_clients must be at least 1".to_string());
        }
        Ok(())
    }
}
