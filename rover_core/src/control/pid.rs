//! Discrete PID controller.
//!
//! Produces a bounded actuation output driving a measured value toward a
//! setpoint. Three details matter here:
//!
//! - **Sample-time gating**: if called again before `sample_time` has
//!   passed, the previous output is returned unchanged. This rate-limits
//!   recomputation and avoids derivative-noise amplification from
//!   over-sampling.
//! - **Anti-windup**: the integral accumulator is clamped to the output
//!   bounds, preventing overshoot from unchecked accumulation while the
//!   output is saturated.
//! - **Derivative on measurement**: the derivative acts on the measured
//!   value, not the error, so setpoint changes don't spike the output.

use std::time::Instant;

use rover_common::config::PidConfig;
use tracing::debug;

use crate::error::RuntimeError;

/// A discrete PID controller with bounded output.
#[derive(Debug)]
pub struct Pid {
    kp: f64,
    ki: f64,
    kd: f64,
    min_output: f64,
    max_output: f64,
    setpoint: f64,
    /// Optional symmetric bound on the setpoint magnitude.
    setpoint_limit: Option<f64>,
    /// Minimum time between output recomputations [s].
    sample_time: f64,
    proportional: f64,
    integral: f64,
    derivative: f64,
    last_output: Option<f64>,
    last_input: Option<f64>,
    last_instant: Instant,
}

impl Pid {
    /// Build a controller from validated configuration, setpoint zero.
    pub fn new(config: &PidConfig) -> Self {
        Self {
            kp: config.kp,
            ki: config.ki,
            kd: config.kd,
            min_output: config.min_output,
            max_output: config.max_output,
            setpoint: 0.0,
            setpoint_limit: None,
            sample_time: config.sample_time_sec,
            proportional: 0.0,
            integral: 0.0,
            derivative: 0.0,
            last_output: None,
            last_input: None,
            last_instant: Instant::now(),
        }
    }

    /// The gains as a tuple (kp, ki, kd).
    #[inline]
    pub const fn tunings(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }

    /// Replace the gains, preserving all controller state.
    pub fn set_tunings(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    /// The P-, I- and D-terms from the last computation. Useful when
    /// tuning hard-to-tune systems.
    #[inline]
    pub const fn components(&self) -> (f64, f64, f64) {
        (self.proportional, self.integral, self.derivative)
    }

    /// Current setpoint.
    #[inline]
    pub const fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Set the target value, bounded by the setpoint limit if one is set.
    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = match self.setpoint_limit {
            Some(limit) => setpoint.clamp(-limit, limit),
            None => setpoint,
        };
    }

    /// Bound the setpoint magnitude; `None` disables the bound. The
    /// current setpoint is re-clamped immediately.
    pub fn set_setpoint_limit(&mut self, limit: Option<f64>) {
        debug!(?limit, "setpoint limit");
        self.setpoint_limit = limit;
        if let Some(limit) = limit {
            self.setpoint = self.setpoint.clamp(-limit, limit);
        }
    }

    /// The output bounds as (min, max).
    #[inline]
    pub const fn output_limits(&self) -> (f64, f64) {
        (self.min_output, self.max_output)
    }

    /// Replace the output bounds, re-clamping the integral accumulator
    /// and last output.
    pub fn set_output_limits(&mut self, min: f64, max: f64) -> Result<(), RuntimeError> {
        if max <= min {
            return Err(RuntimeError::InvalidParameter(format!(
                "output limits: min {min} must be less than max {max}"
            )));
        }
        self.min_output = min;
        self.max_output = max;
        self.integral = self.clamp(self.integral);
        self.last_output = self.last_output.map(|v| self.clamp(v));
        Ok(())
    }

    /// Minimum time between output recomputations [s].
    #[inline]
    pub const fn sample_time(&self) -> f64 {
        self.sample_time
    }

    /// Compute the control output for a measured value, taking the
    /// timestep from the wall clock.
    pub fn update(&mut self, target: f64) -> f64 {
        let mut dt = self.last_instant.elapsed().as_secs_f64();
        if dt <= 0.0 {
            // Monotonic clocks can report identical instants back-to-back.
            dt = 1e-16;
        }
        self.compute(target, dt)
    }

    /// Compute the control output with a caller-supplied timestep, for
    /// simulation where simulated time differs from real time. A
    /// non-positive `dt` returns the previous output unchanged.
    pub fn update_with_dt(&mut self, target: f64, dt: f64) -> f64 {
        if dt <= 0.0 {
            return self.last_output.unwrap_or(0.0);
        }
        self.compute(target, dt)
    }

    fn compute(&mut self, target: f64, dt: f64) -> f64 {
        if dt < self.sample_time {
            if let Some(previous) = self.last_output {
                return previous;
            }
        }

        let error = self.setpoint - target;
        let d_input = target - self.last_input.unwrap_or(target);

        self.proportional = self.kp * error;
        self.integral += self.ki * error * dt;
        self.integral = self.clamp(self.integral);
        self.derivative = -self.kd * d_input / dt;

        let output = self.clamp(self.proportional + self.integral + self.derivative);

        self.last_output = Some(output);
        self.last_input = Some(target);
        self.last_instant = Instant::now();
        output
    }

    /// Reset the controller internals: each term, the integral, and the
    /// last input/output. Gains and limits are preserved, so stale state
    /// from one motion segment never leaks into the next.
    pub fn reset(&mut self) {
        self.proportional = 0.0;
        self.integral = 0.0;
        self.derivative = 0.0;
        self.last_output = None;
        self.last_input = None;
        self.last_instant = Instant::now();
    }

    #[inline]
    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min_output, self.max_output)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
