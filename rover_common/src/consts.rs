//! Shared constants for the rover workspace.
//!
//! Numeric defaults referenced by `config` serde defaults; bounds are
//! enforced by `validate()` at load time.

use static_assertions::const_assert;

/// Maximum number of undispatched messages the bus will hold.
pub const BUS_CAPACITY: usize = 64;

/// Events with a priority at or above this threshold are ignoreable.
pub const IGNORE_PRIORITY_THRESHOLD: u16 = 500;

/// Default per-attempt join timeout during task shutdown [s].
pub const JOIN_TIMEOUT_DEFAULT: f64 = 2.0;

/// Default retry budget before a safety-critical task forces termination.
pub const SHUTDOWN_RETRY_BUDGET_DEFAULT: u32 = 3;

/// Default PID sample time [s].
pub const SAMPLE_TIME_DEFAULT: f64 = 0.01;

/// Default control loop frequency [Hz].
pub const CONTROL_LOOP_HZ_DEFAULT: u32 = 20;

/// Upper bound for any configured loop frequency [Hz].
pub const LOOP_HZ_MAX: u32 = 1000;

/// Default clock task frequency [Hz].
pub const CLOCK_HZ_DEFAULT: u32 = 20;

/// Default number of ticks per tock.
pub const TICKS_PER_TOCK_DEFAULT: u32 = 20;

/// Near range of the cruise distance remap [cm]: at or below this the
/// commanded cruise velocity bound reaches zero.
pub const CRUISE_NEAR_RANGE_CM: f64 = 20.0;

/// Far range of the cruise distance remap [cm]: at this distance the
/// bound equals the configured cruising velocity.
pub const CRUISE_FAR_RANGE_CM: f64 = 100.0;

const_assert!(BUS_CAPACITY.is_power_of_two());
const_assert!(SHUTDOWN_RETRY_BUDGET_DEFAULT >= 1);
const_assert!(CONTROL_LOOP_HZ_DEFAULT <= LOOP_HZ_MAX);
