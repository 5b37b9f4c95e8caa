//! Simulated wheel motor.
//!
//! Physics-based stand-in for a real motor driver: the wheel velocity
//! follows the commanded level with a first-order response, and encoder
//! steps accumulate from the integrated velocity. Time is advanced
//! explicitly by the owner (a ticker thread in the demo binary, or a test
//! driving simulated time), keeping runs deterministic.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rover_common::geometry::Geometry;

use crate::control::motor::MotorDriver;

#[derive(Debug, Default)]
struct SimState {
    /// Last commanded actuation level [cm/s].
    commanded: f64,
    /// Current wheel velocity [cm/s].
    velocity: f64,
    /// Accumulated encoder steps (fractional until read).
    steps: f64,
}

/// First-order simulated motor implementing [`MotorDriver`].
pub struct SimMotor {
    state: Mutex<SimState>,
    steps_per_cm: f64,
    /// First-order response time constant [s]; zero tracks instantly.
    time_constant: f64,
}

impl SimMotor {
    pub fn new(geometry: &Geometry, time_constant: f64) -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            steps_per_cm: geometry.steps_per_cm(),
            time_constant,
        }
    }

    /// Advance the simulation by `dt` seconds: the velocity approaches
    /// the commanded level and steps accumulate.
    pub fn advance(&self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let mut state = self.lock();
        let alpha = if self.time_constant > 0.0 {
            dt / (self.time_constant + dt)
        } else {
            1.0
        };
        state.velocity += alpha * (state.commanded - state.velocity);
        state.steps += state.velocity * self.steps_per_cm * dt;
    }

    /// Current simulated wheel velocity [cm/s].
    pub fn velocity(&self) -> f64 {
        self.lock().velocity
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MotorDriver for SimMotor {
    fn set_velocity(&self, velocity: f64) {
        self.lock().commanded = velocity;
    }

    fn steps(&self) -> i64 {
        self.lock().steps as i64
    }

    fn halt(&self) {
        let mut state = self.lock();
        state.commanded = 0.0;
    }

    fn brake(&self) {
        let mut state = self.lock();
        state.commanded = 0.0;
        state.velocity = 0.0;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
