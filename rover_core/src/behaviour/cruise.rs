//! Cruise behaviour: obstacle-sensitive forward speed.
//!
//! A bus consumer that pays attention to the center infrared sensor and
//! the clock. Forward speed degrades smoothly as an obstacle approaches —
//! the sensed distance, clamped to the remap window, is linearly mapped
//! onto a maximum-velocity bound for both wheel PIDs — so the robot slows
//! and ultimately stops about 20cm from the obstacle without a hard stop.
//! When no infrared event has arrived for a configured number of tocks,
//! the bound is cleared and the cruising velocity restored.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use rover_common::config::CruiseConfig;
use rover_common::consts::{CRUISE_FAR_RANGE_CM, CRUISE_NEAR_RANGE_CM};
use rover_common::event::Event;
use rover_common::types::Orientation;
use tracing::{debug, info, warn};

use crate::control::motor::{MotorController, WheelController, lock_wheel};
use crate::messaging::bus::MessageBus;
use crate::messaging::message::Message;

/// Linear remap of `x` from [in_min, in_max] to [out_min, out_max].
pub fn remap(x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Adjusts the PID maximum velocity as a function of obstacle distance.
pub struct CruiseBehaviour {
    port: Arc<Mutex<WheelController>>,
    stbd: Arc<Mutex<WheelController>>,
    config: CruiseConfig,
    /// Tocks remaining before the velocity bound is cleared.
    timeout_count: AtomicU32,
    enabled: AtomicBool,
}

impl CruiseBehaviour {
    pub fn new(motors: &MotorController, config: CruiseConfig) -> Arc<Self> {
        Arc::new(Self {
            port: motors.wheel(Orientation::Port),
            stbd: motors.wheel(Orientation::Stbd),
            config,
            timeout_count: AtomicU32::new(0),
            enabled: AtomicBool::new(false),
        })
    }

    /// Register this behaviour's handlers on the bus.
    pub fn register(self: &Arc<Self>, bus: &MessageBus) {
        for event in [Event::InfraredCntr, Event::ClockTock] {
            let behaviour = Arc::clone(self);
            bus.add_handler(event, "cruise", move |message| {
                behaviour.on_message(message);
                Ok(())
            });
        }
    }

    /// Configured cruising velocity [cm/s].
    #[inline]
    pub const fn cruising_velocity(&self) -> f64 {
        self.config.cruising_velocity
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Start cruising at the configured velocity.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
        self.set_cruising_velocity(self.config.cruising_velocity);
        info!(velocity = self.config.cruising_velocity, "cruise enabled");
    }

    /// Stop cruising: zero the velocity and clear the bound.
    pub fn disable(&self) {
        if !self.enabled.swap(false, Ordering::AcqRel) {
            warn!("cruise already disabled");
            return;
        }
        self.set_cruising_velocity(0.0);
        self.set_max_velocity(None);
        info!("cruise disabled");
    }

    /// Bus handler body. Ignores everything while disabled.
    pub fn on_message(&self, message: &Message) {
        if !self.is_enabled() {
            return;
        }
        match message.event() {
            Event::ClockTock => self.on_tock(),
            Event::InfraredCntr => self.on_center_infrared(message),
            _ => {}
        }
    }

    fn on_tock(&self) {
        // Count down; once enough time has passed without an infrared
        // event the bound is lifted.
        let remaining = self.timeout_count.load(Ordering::Acquire);
        if remaining == 0 {
            self.set_max_velocity(None);
            self.set_cruising_velocity(self.config.cruising_velocity);
            debug!("tock timeout expired: max velocity cleared");
        } else {
            self.timeout_count.store(remaining - 1, Ordering::Release);
            debug!(remaining = remaining - 1, "tock");
        }
    }

    fn on_center_infrared(&self, message: &Message) {
        // A missing reading is "no update this cycle", never zero.
        let Some(distance_cm) = message.payload().as_distance() else {
            warn!(message = %message.label(), "no distance reading; skipping update");
            return;
        };
        if distance_cm <= self.config.active_range_cm {
            let clamped = distance_cm.clamp(CRUISE_NEAR_RANGE_CM, CRUISE_FAR_RANGE_CM);
            let bound = remap(
                clamped,
                CRUISE_NEAR_RANGE_CM,
                CRUISE_FAR_RANGE_CM,
                0.0,
                self.config.cruising_velocity,
            );
            self.set_max_velocity(Some(bound));
            self.set_cruising_velocity(self.config.cruising_velocity);
            self.timeout_count
                .store(self.config.tock_timeout, Ordering::Release);
            info!(distance_cm, max_velocity = bound, "obstacle in range");
        } else {
            debug!(distance_cm, "obstacle out of range");
            self.set_cruising_velocity(self.config.cruising_velocity);
        }
    }

    fn set_cruising_velocity(&self, velocity: f64) {
        lock_wheel(&self.port).set_velocity(velocity);
        lock_wheel(&self.stbd).set_velocity(velocity);
    }

    fn set_max_velocity(&self, limit: Option<f64>) {
        lock_wheel(&self.port).set_max_velocity(limit);
        lock_wheel(&self.stbd).set_max_velocity(limit);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
