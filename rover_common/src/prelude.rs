//! Common re-exports for convenience.
//!
//! ```rust
//! use rover_common::prelude::*;
//! ```

pub use crate::config::{ConfigError, RobotConfig};
pub use crate::event::{ContactZones, Event, Payload};
pub use crate::geometry::Geometry;
pub use crate::types::Orientation;
