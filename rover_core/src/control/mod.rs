//! Closed-loop wheel control: PID, slew limiting and the two-wheel
//! motor controller.

pub mod motor;
pub mod pid;
pub mod slew;

pub use motor::{MotorController, MotorDriver, WheelController};
pub use pid::Pid;
pub use slew::{SlewLimiter, SlewRate};
