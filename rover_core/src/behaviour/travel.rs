//! Fixed-distance travel maneuver.
//!
//! Drives both wheels a given distance in a straight line, accelerating
//! and decelerating to hit the step target exactly. Each wheel runs its
//! own thread through an explicit phase profile against step thresholds;
//! both threads are joined before the maneuver reports complete, so the
//! phase transitions stay time-correlated without being lock-synchronized.
//!
//! The acceleration range is adaptive: short moves compress the range to
//! one quarter of the distance so they still get a full ramp shape rather
//! than a step change.
//!
//! There is no mid-flight cancellation: stopping early means driving the
//! setpoint to zero and waiting for the loop's natural exit.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rover_common::config::TravelConfig;
use rover_common::geometry::Geometry;
use rover_common::types::Orientation;
use tracing::{debug, info};

use crate::control::motor::{MotorController, WheelController, lock_wheel};
use crate::control::slew::SlewRate;
use crate::error::RuntimeError;
use crate::rate::Rate;

/// Phase of a wheel's travel profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelPhase {
    /// Ramp to cruising velocity until the acceleration target.
    Accelerate,
    /// Hold cruising velocity until the deceleration target.
    Cruise,
    /// Ramp down toward targeting velocity.
    Decelerate,
    /// Creep at targeting velocity to the exact step target.
    Creep,
    /// Setpoint zeroed; profile complete.
    Stopped,
}

/// Step thresholds for one wheel's profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TravelPlan {
    /// Step count at the start of the maneuver.
    pub start_steps: i64,
    /// Final step target.
    pub target_steps: i64,
    /// Accelerate until this step count.
    pub accel_target_steps: i64,
    /// Begin decelerating at this step count.
    pub decel_target_steps: i64,
    /// One wheel rotation short of the target.
    pub closing_target_steps: i64,
    /// The range used for both ramps, in steps.
    pub accel_range_steps: i64,
    /// Whether the compressed (quarter-distance) range was used.
    pub compressed: bool,
}

impl TravelPlan {
    /// Compute the thresholds for a wheel starting at `start_steps`.
    ///
    /// If a quarter of the travel distance is smaller than the standard
    /// range, the compressed quarter range is used instead.
    pub fn compute(
        start_steps: i64,
        distance_cm: f64,
        standard_range_cm: f64,
        geometry: &Geometry,
    ) -> Self {
        let target_steps = start_steps + geometry.steps_for_cm(distance_cm);
        let proposed_range_cm = distance_cm / 4.0;
        let (range_cm, compressed) = if proposed_range_cm * 2.0 >= standard_range_cm {
            (standard_range_cm, false)
        } else {
            (proposed_range_cm, true)
        };
        let accel_range_steps = geometry.steps_for_cm(range_cm);
        Self {
            start_steps,
            target_steps,
            accel_target_steps: start_steps + accel_range_steps,
            decel_target_steps: target_steps - accel_range_steps,
            closing_target_steps: target_steps - geometry.steps_per_rotation().round() as i64,
            accel_range_steps,
            compressed,
        }
    }
}

/// Per-wheel result of a completed maneuver.
#[derive(Debug, Clone, Copy)]
pub struct TravelOutcome {
    pub port_steps: i64,
    pub stbd_steps: i64,
    pub target_steps: i64,
}

/// Drives a fixed distance as two parallel per-wheel phase profiles.
pub struct TravelBehaviour {
    port: Arc<Mutex<WheelController>>,
    stbd: Arc<Mutex<WheelController>>,
    geometry: Geometry,
    config: TravelConfig,
}

impl TravelBehaviour {
    pub fn new(motors: &MotorController, config: TravelConfig) -> Self {
        Self {
            port: motors.wheel(Orientation::Port),
            stbd: motors.wheel(Orientation::Stbd),
            geometry: motors.geometry(),
            config,
        }
    }

    /// Configured cruising velocity [cm/s].
    #[inline]
    pub const fn cruising_velocity(&self) -> f64 {
        self.config.cruising_velocity
    }

    /// Travel `distance_cm` straight ahead; blocks until both wheels
    /// have completed their profiles.
    pub fn travel(&self, distance_cm: f64) -> Result<TravelOutcome, RuntimeError> {
        if distance_cm <= 0.0 || !distance_cm.is_finite() {
            return Err(RuntimeError::InvalidParameter(format!(
                "travel distance must be positive, got {distance_cm}"
            )));
        }
        info!(distance_cm, "travel maneuver starting");

        let spawn = |wheel: &Arc<Mutex<WheelController>>, label: &'static str| {
            let wheel = Arc::clone(wheel);
            let geometry = self.geometry;
            let config = self.config;
            thread::Builder::new()
                .name(format!("travel-{label}"))
                .spawn(move || run_wheel(&wheel, &geometry, &config, distance_cm))
                .map_err(|e| RuntimeError::SpawnFailed {
                    name: format!("travel-{label}"),
                    reason: e.to_string(),
                })
        };

        let port_thread = spawn(&self.port, "port")?;
        let stbd_thread = spawn(&self.stbd, "stbd")?;

        let port_steps = port_thread
            .join()
            .map_err(|_| RuntimeError::ManeuverPanicked {
                name: "port".to_string(),
            })?;
        let stbd_steps = stbd_thread
            .join()
            .map_err(|_| RuntimeError::ManeuverPanicked {
                name: "stbd".to_string(),
            })?;

        let target_steps = self.geometry.steps_for_cm(distance_cm);
        info!(port_steps, stbd_steps, target_steps, "travel maneuver complete");
        Ok(TravelOutcome {
            port_steps,
            stbd_steps,
            target_steps,
        })
    }
}

/// One wheel's phase profile. Returns the steps travelled.
fn run_wheel(
    wheel: &Arc<Mutex<WheelController>>,
    geometry: &Geometry,
    config: &TravelConfig,
    distance_cm: f64,
) -> i64 {
    let (label, plan) = {
        let mut w = lock_wheel(wheel);
        w.set_slew_rate(SlewRate::Slower);
        (
            w.orientation().label(),
            TravelPlan::compute(w.steps(), distance_cm, config.accel_range_cm, geometry),
        )
    };
    info!(
        wheel = label,
        start = plan.start_steps,
        accel_until = plan.accel_target_steps,
        decel_at = plan.decel_target_steps,
        target = plan.target_steps,
        compressed = plan.compressed,
        "wheel profile"
    );

    let mut rate = Rate::new(config.loop_hz);
    let mut phase = TravelPhase::Accelerate;
    debug!(wheel = label, ?phase, "accelerating");

    while lock_wheel(wheel).steps() < plan.accel_target_steps {
        lock_wheel(wheel).set_velocity(config.cruising_velocity);
        rate.wait();
    }

    phase = TravelPhase::Cruise;
    debug!(wheel = label, ?phase, "reached cruising velocity");
    lock_wheel(wheel).set_velocity(config.cruising_velocity);
    while lock_wheel(wheel).steps() < plan.decel_target_steps {
        rate.wait();
    }

    // Step down through an intermediate velocity, then ramp to the
    // targeting velocity at the normal slew for the final rotation.
    phase = TravelPhase::Decelerate;
    debug!(wheel = label, ?phase, "decelerating");
    lock_wheel(wheel).set_velocity((config.cruising_velocity + config.targeting_velocity) / 2.0);
    {
        let mut w = lock_wheel(wheel);
        w.set_slew_rate(SlewRate::Normal);
        w.set_velocity(config.targeting_velocity);
    }
    while lock_wheel(wheel).steps() < plan.closing_target_steps {
        rate.wait();
    }

    phase = TravelPhase::Creep;
    debug!(wheel = label, ?phase, "creeping to target");
    lock_wheel(wheel).set_velocity(config.targeting_velocity);
    while lock_wheel(wheel).steps() < plan.target_steps {
        thread::sleep(Duration::from_millis(1));
    }

    lock_wheel(wheel).set_velocity(0.0);
    phase = TravelPhase::Stopped;
    let steps = lock_wheel(wheel).steps() - plan.start_steps;
    info!(wheel = label, ?phase, steps, of = plan.target_steps - plan.start_steps, "wheel profile complete");
    steps
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rover_common::config::GeometryConfig;

    fn geometry() -> Geometry {
        Geometry::from_config(&GeometryConfig::default())
    }

    #[test]
    fn standard_range_plan() {
        // 200cm with a 50cm range at 22.95 steps/cm.
        let plan = TravelPlan::compute(0, 200.0, 50.0, &geometry());
        assert!(!plan.compressed);
        assert_eq!(plan.accel_range_steps, 1148);
        assert_eq!(plan.accel_target_steps, 1148);
        assert_eq!(plan.target_steps, 4591);
        assert_eq!(plan.decel_target_steps, 4591 - 1148);
        assert_eq!(plan.closing_target_steps, 4591 - 494);
    }

    #[test]
    fn plan_offsets_from_current_steps() {
        let plan = TravelPlan::compute(1000, 200.0, 50.0, &geometry());
        assert_eq!(plan.start_steps, 1000);
        assert_eq!(plan.accel_target_steps, 1000 + 1148);
        assert_eq!(plan.target_steps, 1000 + 4591);
    }

    #[test]
    fn short_move_compresses_range() {
        // 40cm: a quarter is 10cm; 2×10 < 30 → compressed.
        let plan = TravelPlan::compute(0, 40.0, 30.0, &geometry());
        assert!(plan.compressed);
        assert_eq!(plan.accel_range_steps, geometry().steps_for_cm(10.0));
        // The ramps still fit inside the move.
        assert!(plan.accel_target_steps < plan.decel_target_steps);
    }

    #[test]
    fn boundary_move_uses_standard_range() {
        // 60cm: a quarter is 15cm; 2×15 >= 30 → standard.
        let plan = TravelPlan::compute(0, 60.0, 30.0, &geometry());
        assert!(!plan.compressed);
        assert_eq!(plan.accel_range_steps, geometry().steps_for_cm(30.0));
    }
}
