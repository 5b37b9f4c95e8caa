//! General-purpose slew limiter.
//!
//! Bounds the rate of change of a value so abrupt setpoint changes (an
//! emergency-stop event reversing the target, say) ramp rather than step,
//! protecting drivetrain hardware. Wraps the velocity setter ahead of the
//! PID: the permitted change grows with elapsed time since the limiter
//! was (re-)baselined, scaled by the rate limit.
//!
//! When disabled the raw target passes straight through.

use std::time::Instant;

use rover_common::config::SlewConfig;
use tracing::{debug, info};

/// Named rate presets [value change per second].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlewRate {
    ExtremelySlow,
    VerySlow,
    Slower,
    Slow,
    Normal,
    Fast,
    VeryFast,
}

impl SlewRate {
    /// Permitted value change per second.
    pub const fn limit_per_sec(self) -> f64 {
        match self {
            Self::ExtremelySlow => 5.0,
            Self::VerySlow => 10.0,
            Self::Slower => 20.0,
            Self::Slow => 35.0,
            Self::Normal => 50.0,
            Self::Fast => 75.0,
            Self::VeryFast => 100.0,
        }
    }
}

/// Limits the rate of change of a value.
#[derive(Debug)]
pub struct SlewLimiter {
    /// Permitted value change per second.
    rate_limit: f64,
    minimum_output: f64,
    maximum_output: f64,
    /// Elapsed-time origin for the change bound.
    start: Instant,
    enabled: bool,
}

impl SlewLimiter {
    /// Build a limiter from validated configuration. Starts disabled.
    pub fn new(config: &SlewConfig) -> Self {
        Self {
            rate_limit: config.rate_limit_per_sec,
            minimum_output: config.minimum_output,
            maximum_output: config.maximum_output,
            start: Instant::now(),
            enabled: false,
        }
    }

    /// Current rate limit [per second].
    #[inline]
    pub const fn rate_limit(&self) -> f64 {
        self.rate_limit
    }

    /// Select a named rate preset, overriding the configured limit.
    pub fn set_rate(&mut self, rate: SlewRate) {
        self.rate_limit = rate.limit_per_sec();
        info!(rate = ?rate, limit_per_sec = self.rate_limit, "slew rate");
    }

    #[inline]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable limiting and baseline the elapsed-time origin.
    pub fn enable(&mut self) {
        self.enabled = true;
        self.start = Instant::now();
    }

    /// Disable limiting; `slew` passes the raw target through.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Re-baseline the elapsed-time origin.
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    /// Bound `target_value` to the permitted change from `current_value`
    /// given the elapsed time since the origin, then clamp the magnitude
    /// to the configured output bounds (sign preserved).
    pub fn slew(&self, current_value: f64, target_value: f64) -> f64 {
        if !self.enabled {
            debug!(target_value, "slew disabled; passing raw target");
            return target_value;
        }
        self.slew_with_elapsed(current_value, target_value, self.start.elapsed().as_secs_f64())
    }

    /// Deterministic variant for simulation: the caller supplies the
    /// elapsed time.
    pub fn slew_with_elapsed(&self, current_value: f64, target_value: f64, elapsed_sec: f64) -> f64 {
        let bound = self.rate_limit * elapsed_sec;
        let value = target_value.clamp(current_value - bound, current_value + bound);
        if value < 0.0 {
            -self.clamp_magnitude(-value)
        } else {
            self.clamp_magnitude(value)
        }
    }

    #[inline]
    fn clamp_magnitude(&self, value: f64) -> f64 {
        value.clamp(self.minimum_output, self.maximum_output)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
