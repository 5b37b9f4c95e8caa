//! Wheel geometry and step conversions.
//!
//! One encoder step is the robot's native odometry unit; everything that
//! reasons about distance converts through here.
//!
//! Reference figures for the stock chassis: 494 steps per rotation on
//! 68.5mm tires gives a 215.2mm circumference, so roughly 2295 steps per
//! meter and 22.95 steps per cm.

use std::f64::consts::PI;

use crate::config::GeometryConfig;

/// Configured chassis geometry with derived step ratios.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    wheel_diameter_mm: f64,
    wheelbase_mm: f64,
    steps_per_rotation: f64,
    steps_per_m: f64,
    steps_per_cm: f64,
}

impl Geometry {
    /// Derive step ratios from a validated [`GeometryConfig`].
    pub fn from_config(config: &GeometryConfig) -> Self {
        let circumference_mm = PI * config.wheel_diameter_mm;
        Self {
            wheel_diameter_mm: config.wheel_diameter_mm,
            wheelbase_mm: config.wheelbase_mm,
            steps_per_rotation: config.steps_per_rotation,
            steps_per_m: 1000.0 * config.steps_per_rotation / circumference_mm,
            steps_per_cm: 10.0 * config.steps_per_rotation / circumference_mm,
        }
    }

    /// Wheel diameter [mm].
    #[inline]
    pub const fn wheel_diameter_mm(&self) -> f64 {
        self.wheel_diameter_mm
    }

    /// Wheelbase [mm].
    #[inline]
    pub const fn wheelbase_mm(&self) -> f64 {
        self.wheelbase_mm
    }

    /// Encoder steps per full wheel rotation.
    #[inline]
    pub const fn steps_per_rotation(&self) -> f64 {
        self.steps_per_rotation
    }

    /// Encoder steps per meter of travel.
    #[inline]
    pub const fn steps_per_m(&self) -> f64 {
        self.steps_per_m
    }

    /// Encoder steps per centimeter of travel.
    #[inline]
    pub const fn steps_per_cm(&self) -> f64 {
        self.steps_per_cm
    }

    /// Steps corresponding to a travel distance [cm], rounded.
    #[inline]
    pub fn steps_for_cm(&self, cm: f64) -> i64 {
        (cm * self.steps_per_cm).round() as i64
    }

    /// Travel distance [cm] corresponding to a step count.
    #[inline]
    pub fn cm_for_steps(&self, steps: i64) -> f64 {
        steps as f64 / self.steps_per_cm
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::from_config(&GeometryConfig::default())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
