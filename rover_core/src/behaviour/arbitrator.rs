//! Drive-command routing with a ballistic contact guard.
//!
//! The arbitrator is the bus consumer that turns events into motor
//! commands. Ordinary drive directives (forward/port/starboard velocity)
//! pass straight through to the wheel controllers. Ballistic stop-class
//! events — bumper contact, stop — engage a guard that zeroes both wheels
//! and suppresses lower-priority drive directives until the robot has
//! come to rest; the bus still delivers those directives, the arbitrator
//! just declines to apply them while the ballistic response is in
//! progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rover_common::event::Event;
use rover_common::types::Orientation;
use tracing::{debug, info, warn};

use crate::control::motor::{MotorController, WheelController, lock_wheel};
use crate::messaging::bus::MessageBus;
use crate::messaging::message::Message;

/// Routes drive and stop events to the wheel controllers.
pub struct Arbitrator {
    port: Arc<Mutex<WheelController>>,
    stbd: Arc<Mutex<WheelController>>,
    /// Ballistic response in progress: drive directives are suppressed.
    engaged: AtomicBool,
}

impl Arbitrator {
    pub fn new(motors: &MotorController) -> Arc<Self> {
        Arc::new(Self {
            port: motors.wheel(Orientation::Port),
            stbd: motors.wheel(Orientation::Stbd),
            engaged: AtomicBool::new(false),
        })
    }

    /// Register this arbitrator's handlers on the bus.
    pub fn register(self: &Arc<Self>, bus: &MessageBus) {
        for event in [
            Event::BumperContact,
            Event::Stop,
            Event::Halt,
            Event::Brake,
            Event::ForwardVelocity,
            Event::PortVelocity,
            Event::StbdVelocity,
            Event::ClockTock,
        ] {
            let arbitrator = Arc::clone(self);
            bus.add_handler(event, "arbitrator", move |message| {
                arbitrator.on_message(message);
                Ok(())
            });
        }
    }

    /// Whether a ballistic response is in progress.
    #[inline]
    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }

    /// Manually release the ballistic guard.
    pub fn release(&self) {
        if self.engaged.swap(false, Ordering::AcqRel) {
            info!("ballistic guard released");
        }
    }

    /// Bus handler body.
    pub fn on_message(&self, message: &Message) {
        match message.event() {
            Event::BumperContact => {
                warn!(message = %message.label(), payload = ?message.payload(), "contact: halting");
                self.engaged.store(true, Ordering::Release);
                self.stop_wheels(StopMode::Halt);
            }
            Event::Stop => {
                warn!("stop: halting");
                self.engaged.store(true, Ordering::Release);
                self.stop_wheels(StopMode::Halt);
            }
            Event::Halt => self.stop_wheels(StopMode::Halt),
            Event::Brake => self.stop_wheels(StopMode::Brake),
            Event::ForwardVelocity => {
                if let Some(velocity) = self.directive_velocity(message) {
                    lock_wheel(&self.port).set_velocity(velocity);
                    lock_wheel(&self.stbd).set_velocity(velocity);
                }
            }
            Event::PortVelocity => {
                if let Some(velocity) = self.directive_velocity(message) {
                    lock_wheel(&self.port).set_velocity(velocity);
                }
            }
            Event::StbdVelocity => {
                if let Some(velocity) = self.directive_velocity(message) {
                    lock_wheel(&self.stbd).set_velocity(velocity);
                }
            }
            Event::ClockTock => self.maybe_release(),
            _ => {}
        }
    }

    /// Extract the velocity from a drive directive, unless the guard is
    /// engaged or the payload carries no reading.
    fn directive_velocity(&self, message: &Message) -> Option<f64> {
        if self.is_engaged() {
            debug!(message = %message.label(), "drive directive suppressed by ballistic guard");
            return None;
        }
        let velocity = message.payload().as_velocity();
        if velocity.is_none() {
            warn!(message = %message.label(), "no velocity reading; skipping directive");
        }
        velocity
    }

    /// Release the guard once both setpoints have settled at zero.
    fn maybe_release(&self) {
        if !self.is_engaged() {
            return;
        }
        let stopped =
            lock_wheel(&self.port).setpoint() == 0.0 && lock_wheel(&self.stbd).setpoint() == 0.0;
        if stopped {
            self.release();
        }
    }

    fn stop_wheels(&self, mode: StopMode) {
        let mut port = lock_wheel(&self.port);
        port.reset();
        match mode {
            StopMode::Halt => port.halt(),
            StopMode::Brake => port.brake(),
        }
        drop(port);
        let mut stbd = lock_wheel(&self.stbd);
        stbd.reset();
        match mode {
            StopMode::Halt => stbd.halt(),
            StopMode::Brake => stbd.brake(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StopMode {
    Halt,
    Brake,
}
