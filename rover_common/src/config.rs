//! TOML configuration loading with validation.
//!
//! All config types use `serde::Deserialize` with per-field defaults, so a
//! partial file (or no file at all) yields a complete configuration.
//! `validate()` rejects out-of-bounds values at load time; configuration
//! errors are fatal and propagate to process entry.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{
    CLOCK_HZ_DEFAULT, CONTROL_LOOP_HZ_DEFAULT, CRUISE_NEAR_RANGE_CM, JOIN_TIMEOUT_DEFAULT,
    LOOP_HZ_MAX, SAMPLE_TIME_DEFAULT, SHUTDOWN_RETRY_BUDGET_DEFAULT, TICKS_PER_TOCK_DEFAULT,
};

// ─── Error Type ─────────────────────────────────────────────────────

/// Configuration loading/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("config I/O error: {0}")]
    Io(String),
    /// TOML parse error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Parameter bounds violation.
    #[error("config validation: {0}")]
    Validation(String),
}

// ─── Sections ───────────────────────────────────────────────────────

/// PID gains and bounds, shared by both wheel controllers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PidConfig {
    /// Proportional gain.
    #[serde(default = "default_kp")]
    pub kp: f64,
    /// Integral gain (0 = disabled).
    #[serde(default)]
    pub ki: f64,
    /// Derivative gain (0 = disabled).
    #[serde(default)]
    pub kd: f64,
    /// Lower output bound.
    #[serde(default = "default_min_output")]
    pub min_output: f64,
    /// Upper output bound.
    #[serde(default = "default_max_output")]
    pub max_output: f64,
    /// Minimum time between output recomputations [s].
    #[serde(default = "default_sample_time")]
    pub sample_time_sec: f64,
    /// Control loop frequency [Hz].
    #[serde(default = "default_loop_hz")]
    pub loop_hz: u32,
}

fn default_kp() -> f64 {
    0.095
}
fn default_min_output() -> f64 {
    -100.0
}
fn default_max_output() -> f64 {
    100.0
}
fn default_sample_time() -> f64 {
    SAMPLE_TIME_DEFAULT
}
fn default_loop_hz() -> u32 {
    CONTROL_LOOP_HZ_DEFAULT
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: default_kp(),
            ki: 0.0,
            kd: 0.0,
            min_output: default_min_output(),
            max_output: default_max_output(),
            sample_time_sec: default_sample_time(),
            loop_hz: default_loop_hz(),
        }
    }
}

/// Slew limiter rate and output bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlewConfig {
    /// Minimum output magnitude.
    #[serde(default)]
    pub minimum_output: f64,
    /// Maximum output magnitude.
    #[serde(default = "default_max_output")]
    pub maximum_output: f64,
    /// Permitted value change per second.
    #[serde(default = "default_slew_rate")]
    pub rate_limit_per_sec: f64,
}

fn default_slew_rate() -> f64 {
    50.0
}

impl Default for SlewConfig {
    fn default() -> Self {
        Self {
            minimum_output: 0.0,
            maximum_output: default_max_output(),
            rate_limit_per_sec: default_slew_rate(),
        }
    }
}

/// Physical chassis geometry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeometryConfig {
    /// Tire diameter [mm].
    #[serde(default = "default_wheel_diameter")]
    pub wheel_diameter_mm: f64,
    /// Distance between wheel centers [mm].
    #[serde(default = "default_wheelbase")]
    pub wheelbase_mm: f64,
    /// Encoder steps per full wheel rotation.
    #[serde(default = "default_steps_per_rotation")]
    pub steps_per_rotation: f64,
}

fn default_wheel_diameter() -> f64 {
    68.5
}
fn default_wheelbase() -> f64 {
    160.0
}
fn default_steps_per_rotation() -> f64 {
    494.0
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            wheel_diameter_mm: default_wheel_diameter(),
            wheelbase_mm: default_wheelbase(),
            steps_per_rotation: default_steps_per_rotation(),
        }
    }
}

/// Fixed-distance travel maneuver parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TravelConfig {
    /// Standard range used for both acceleration and deceleration [cm].
    #[serde(default = "default_accel_range")]
    pub accel_range_cm: f64,
    /// Cruising velocity between the ramps [cm/s].
    #[serde(default = "default_cruising_velocity")]
    pub cruising_velocity: f64,
    /// Low velocity from which an immediate stop is acceptable [cm/s].
    #[serde(default = "default_targeting_velocity")]
    pub targeting_velocity: f64,
    /// Phase polling frequency [Hz].
    #[serde(default = "default_loop_hz")]
    pub loop_hz: u32,
}

fn default_accel_range() -> f64 {
    30.0
}
fn default_cruising_velocity() -> f64 {
    25.0
}
fn default_targeting_velocity() -> f64 {
    2.0
}

impl Default for TravelConfig {
    fn default() -> Self {
        Self {
            accel_range_cm: default_accel_range(),
            cruising_velocity: default_cruising_velocity(),
            targeting_velocity: default_targeting_velocity(),
            loop_hz: default_loop_hz(),
        }
    }
}

/// Cruise behaviour parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CruiseConfig {
    /// Distance at or below which the behaviour reacts [cm].
    #[serde(default = "default_active_range")]
    pub active_range_cm: f64,
    /// Forward velocity when unobstructed [cm/s].
    #[serde(default = "default_cruising_velocity")]
    pub cruising_velocity: f64,
    /// Tocks without an infrared event before the bound is cleared.
    #[serde(default = "default_tock_timeout")]
    pub tock_timeout: u32,
}

fn default_active_range() -> f64 {
    90.0
}
fn default_tock_timeout() -> u32 {
    4
}

impl Default for CruiseConfig {
    fn default() -> Self {
        Self {
            active_range_cm: default_active_range(),
            cruising_velocity: default_cruising_velocity(),
            tock_timeout: default_tock_timeout(),
        }
    }
}

/// Task shutdown policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskPolicyConfig {
    /// Per-attempt join timeout during close [s].
    #[serde(default = "default_join_timeout")]
    pub join_timeout_sec: f64,
    /// Join attempts before a safety-critical task forces termination.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
}

fn default_join_timeout() -> f64 {
    JOIN_TIMEOUT_DEFAULT
}
fn default_retry_budget() -> u32 {
    SHUTDOWN_RETRY_BUDGET_DEFAULT
}

impl Default for TaskPolicyConfig {
    fn default() -> Self {
        Self {
            join_timeout_sec: default_join_timeout(),
            retry_budget: default_retry_budget(),
        }
    }
}

/// Clock task parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Tick frequency [Hz].
    #[serde(default = "default_clock_hz")]
    pub tick_hz: u32,
    /// Ticks per tock.
    #[serde(default = "default_ticks_per_tock")]
    pub ticks_per_tock: u32,
}

fn default_clock_hz() -> u32 {
    CLOCK_HZ_DEFAULT
}
fn default_ticks_per_tock() -> u32 {
    TICKS_PER_TOCK_DEFAULT
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_clock_hz(),
            ticks_per_tock: default_ticks_per_tock(),
        }
    }
}

// ─── Top-Level Config ───────────────────────────────────────────────

/// Top-level robot configuration, loaded from TOML at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobotConfig {
    #[serde(default)]
    pub pid: PidConfig,
    #[serde(default)]
    pub slew: SlewConfig,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub travel: TravelConfig,
    #[serde(default)]
    pub cruise: CruiseConfig,
    #[serde(default)]
    pub task: TaskPolicyConfig,
    #[serde(default)]
    pub clock: ClockConfig,
}

impl RobotConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-bounds parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(ok: bool, msg: &str) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::Validation(msg.to_string()))
            }
        }

        let p = &self.pid;
        check(p.kp.is_finite() && p.ki.is_finite() && p.kd.is_finite(), "pid gains must be finite")?;
        check(p.min_output < p.max_output, "pid.min_output must be less than pid.max_output")?;
        check(p.sample_time_sec > 0.0, "pid.sample_time_sec must be positive")?;
        check(p.loop_hz >= 1 && p.loop_hz <= LOOP_HZ_MAX, "pid.loop_hz out of range")?;

        let s = &self.slew;
        check(s.rate_limit_per_sec > 0.0, "slew.rate_limit_per_sec must be positive")?;
        check(
            s.minimum_output >= 0.0 && s.minimum_output < s.maximum_output,
            "slew output bounds must satisfy 0 <= min < max",
        )?;

        let g = &self.geometry;
        check(g.wheel_diameter_mm > 0.0, "geometry.wheel_diameter_mm must be positive")?;
        check(g.wheelbase_mm > 0.0, "geometry.wheelbase_mm must be positive")?;
        check(g.steps_per_rotation > 0.0, "geometry.steps_per_rotation must be positive")?;

        let t = &self.travel;
        check(t.accel_range_cm > 0.0, "travel.accel_range_cm must be positive")?;
        check(t.cruising_velocity > 0.0, "travel.cruising_velocity must be positive")?;
        check(
            t.targeting_velocity > 0.0 && t.targeting_velocity <= t.cruising_velocity,
            "travel.targeting_velocity must be in (0, cruising_velocity]",
        )?;
        check(t.loop_hz >= 1 && t.loop_hz <= LOOP_HZ_MAX, "travel.loop_hz out of range")?;

        let c = &self.cruise;
        check(
            c.active_range_cm > CRUISE_NEAR_RANGE_CM,
            "cruise.active_range_cm must exceed the near range",
        )?;
        check(c.cruising_velocity > 0.0, "cruise.cruising_velocity must be positive")?;
        check(c.tock_timeout >= 1, "cruise.tock_timeout must be at least 1")?;

        let k = &self.task;
        check(k.join_timeout_sec > 0.0, "task.join_timeout_sec must be positive")?;
        check(k.retry_budget >= 1, "task.retry_budget must be at least 1")?;

        let cl = &self.clock;
        check(cl.tick_hz >= 1 && cl.tick_hz <= LOOP_HZ_MAX, "clock.tick_hz out of range")?;
        check(cl.ticks_per_tock >= 1, "clock.ticks_per_tock must be at least 1")?;

        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
