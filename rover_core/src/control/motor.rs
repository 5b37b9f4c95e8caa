//! Per-wheel closed-loop velocity control and the two-wheel composite.
//!
//! The core never performs hardware I/O: a [`MotorDriver`] collaborator
//! supplies the encoder step counter and accepts actuation commands.
//! [`WheelController`] owns one PID + slew limiter pair for one wheel;
//! [`MotorController`] composes the port and starboard controllers with
//! the chassis geometry.
//!
//! Each wheel's control loop runs on its own thread: measure velocity
//! from encoder deltas, run the PID, integrate the output into an
//! accumulated power level, and write it to the driver. A short mean
//! window over the setpoint provides hysteresis so power snaps to zero
//! once the commanded velocity settles at zero, instead of jittering.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use heapless::Deque;
use rover_common::config::RobotConfig;
use rover_common::geometry::Geometry;
use rover_common::types::Orientation;
use tracing::debug;

use crate::control::pid::Pid;
use crate::control::slew::{SlewLimiter, SlewRate};

/// Length of the setpoint hysteresis window. Too small a window zeroes
/// motor power too quickly.
const HYSTERESIS_WINDOW: usize = 8;

/// Actuator collaborator contract. One implementation per physical motor;
/// the step counter must be written only by the driver's own encoder
/// callback.
pub trait MotorDriver: Send + Sync {
    /// Command an actuation level [cm/s equivalent].
    fn set_velocity(&self, velocity: f64);

    /// Monotonically increasing encoder step count.
    fn steps(&self) -> i64;

    /// Quick stop, motors released.
    fn halt(&self);

    /// Stop with braking.
    fn brake(&self);
}

/// Closed-loop velocity controller for a single wheel.
pub struct WheelController {
    orientation: Orientation,
    driver: Arc<dyn MotorDriver>,
    pid: Pid,
    slew: SlewLimiter,
    /// Accumulated actuation level, bounded by the PID output limits.
    power: f64,
    setpoint_window: Deque<f64, HYSTERESIS_WINDOW>,
    last_steps: i64,
    last_instant: Instant,
    steps_per_cm: f64,
}

impl WheelController {
    pub fn new(
        orientation: Orientation,
        driver: Arc<dyn MotorDriver>,
        config: &RobotConfig,
    ) -> Self {
        let geometry = Geometry::from_config(&config.geometry);
        let mut slew = SlewLimiter::new(&config.slew);
        slew.enable();
        let last_steps = driver.steps();
        Self {
            orientation,
            driver,
            pid: Pid::new(&config.pid),
            slew,
            power: 0.0,
            setpoint_window: Deque::new(),
            last_steps,
            last_instant: Instant::now(),
            steps_per_cm: geometry.steps_per_cm(),
        }
    }

    /// Which wheel this controller drives.
    #[inline]
    pub const fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Current encoder step count.
    #[inline]
    pub fn steps(&self) -> i64 {
        self.driver.steps()
    }

    /// Current velocity setpoint [cm/s].
    #[inline]
    pub const fn setpoint(&self) -> f64 {
        self.pid.setpoint()
    }

    /// Request a velocity [cm/s]. The request is slew-bounded against the
    /// current setpoint before reaching the PID, so step changes ramp.
    pub fn set_velocity(&mut self, velocity: f64) {
        let bounded = self.slew.slew(self.pid.setpoint(), velocity);
        self.pid.set_setpoint(bounded);
    }

    /// Bound the commanded velocity magnitude; `None` disables the bound.
    pub fn set_max_velocity(&mut self, limit: Option<f64>) {
        self.pid.set_setpoint_limit(limit);
    }

    /// Select a slew rate preset.
    pub fn set_slew_rate(&mut self, rate: SlewRate) {
        self.slew.set_rate(rate);
    }

    /// Toggle slew limiting; disabled passes velocity requests through.
    pub fn enable_slew(&mut self, enabled: bool) {
        if enabled {
            self.slew.enable();
        } else {
            self.slew.disable();
        }
    }

    /// Wheel velocity [cm/s] measured from encoder deltas since the last
    /// call.
    pub fn measured_velocity(&mut self) -> f64 {
        let now = Instant::now();
        let dt = (now - self.last_instant).as_secs_f64();
        if dt <= 0.0 {
            return 0.0;
        }
        let steps = self.driver.steps();
        let velocity = (steps - self.last_steps) as f64 / self.steps_per_cm / dt;
        self.last_steps = steps;
        self.last_instant = now;
        velocity
    }

    /// One control-loop iteration: measure, run the PID, accumulate
    /// power, apply hysteresis, drive.
    pub fn loop_iteration(&mut self) {
        let velocity = self.measured_velocity();
        let output = self.pid.update(velocity);
        let (min, max) = self.pid.output_limits();
        self.power = (self.power + output).clamp(min, max);

        if self.mean_setpoint() == 0.0 {
            self.driver.set_velocity(0.0);
        } else {
            self.driver.set_velocity(self.power);
        }
        debug!(
            wheel = self.orientation.label(),
            velocity,
            power = self.power,
            setpoint = self.pid.setpoint(),
            "loop"
        );
    }

    /// Zero the setpoint, clear controller state and stop the driver.
    pub fn reset(&mut self) {
        self.pid.set_setpoint(0.0);
        self.pid.reset();
        self.power = 0.0;
        self.setpoint_window.clear();
        self.driver.set_velocity(0.0);
    }

    /// Pass-through to the driver's quick stop.
    pub fn halt(&self) {
        self.driver.halt();
    }

    /// Pass-through to the driver's braking stop.
    pub fn brake(&self) {
        self.driver.brake();
    }

    /// Mean of recent setpoints. Hysteresis around zero: motor power is
    /// only cut once the commanded velocity has settled at zero.
    fn mean_setpoint(&mut self) -> f64 {
        if self.setpoint_window.is_full() {
            let _ = self.setpoint_window.pop_front();
        }
        let _ = self.setpoint_window.push_back(self.pid.setpoint());
        let n = self.setpoint_window.len();
        let sum: f64 = self.setpoint_window.iter().sum();
        sum / n as f64
    }
}

/// Both wheel controllers plus the chassis geometry.
pub struct MotorController {
    port: Arc<Mutex<WheelController>>,
    stbd: Arc<Mutex<WheelController>>,
    geometry: Geometry,
}

impl MotorController {
    pub fn new(
        port_driver: Arc<dyn MotorDriver>,
        stbd_driver: Arc<dyn MotorDriver>,
        config: &RobotConfig,
    ) -> Self {
        Self {
            port: Arc::new(Mutex::new(WheelController::new(
                Orientation::Port,
                port_driver,
                config,
            ))),
            stbd: Arc::new(Mutex::new(WheelController::new(
                Orientation::Stbd,
                stbd_driver,
                config,
            ))),
            geometry: Geometry::from_config(&config.geometry),
        }
    }

    /// Chassis geometry.
    #[inline]
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Shared handle to one wheel controller.
    pub fn wheel(&self, orientation: Orientation) -> Arc<Mutex<WheelController>> {
        match orientation {
            Orientation::Port => Arc::clone(&self.port),
            Orientation::Stbd => Arc::clone(&self.stbd),
        }
    }

    /// Request per-wheel velocities [cm/s].
    pub fn set_velocity(&self, port_velocity: f64, stbd_velocity: f64) {
        lock_wheel(&self.port).set_velocity(port_velocity);
        lock_wheel(&self.stbd).set_velocity(stbd_velocity);
    }

    /// Request the same velocity for both wheels [cm/s].
    pub fn set_forward_velocity(&self, velocity: f64) {
        self.set_velocity(velocity, velocity);
    }

    /// Bound both commanded velocities; `None` disables the bound.
    pub fn set_max_velocity(&self, limit: Option<f64>) {
        lock_wheel(&self.port).set_max_velocity(limit);
        lock_wheel(&self.stbd).set_max_velocity(limit);
    }

    /// Current step counts as (port, stbd).
    pub fn steps(&self) -> (i64, i64) {
        (lock_wheel(&self.port).steps(), lock_wheel(&self.stbd).steps())
    }

    /// True when both setpoints are zero.
    pub fn is_stopped(&self) -> bool {
        lock_wheel(&self.port).setpoint() == 0.0 && lock_wheel(&self.stbd).setpoint() == 0.0
    }

    /// Zero both setpoints and quick-stop the drivers.
    pub fn halt(&self) {
        let mut port = lock_wheel(&self.port);
        port.reset();
        port.halt();
        drop(port);
        let mut stbd = lock_wheel(&self.stbd);
        stbd.reset();
        stbd.halt();
    }

    /// Zero both setpoints and brake the drivers.
    pub fn brake(&self) {
        let mut port = lock_wheel(&self.port);
        port.reset();
        port.brake();
        drop(port);
        let mut stbd = lock_wheel(&self.stbd);
        stbd.reset();
        stbd.brake();
    }

    /// Clear both controllers without touching the drivers' stop modes.
    pub fn reset(&self) {
        lock_wheel(&self.port).reset();
        lock_wheel(&self.stbd).reset();
    }
}

// A poisoned wheel lock means a control thread panicked; the controller
// state is still structurally sound, so recover the guard.
pub(crate) fn lock_wheel(wheel: &Mutex<WheelController>) -> MutexGuard<'_, WheelController> {
    wheel.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Tests ──────────────────────────────────────────────────────────
