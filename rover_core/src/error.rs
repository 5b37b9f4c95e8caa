//! Runtime error types.
//!
//! Lifecycle violations are usage errors: fatal to the offending subsystem
//! and never silently recovered. Handler errors are a separate, non-fatal
//! type caught at the dispatch boundary.

use thiserror::Error;

use crate::fsm::State;

/// Error produced by the control runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A lifecycle transition outside the shared table.
    #[error("invalid transition in {name} from {from:?} to {to:?}")]
    IllegalTransition {
        name: String,
        from: State,
        to: State,
    },

    /// The bus queue is at capacity; the message was not enqueued.
    #[error("message queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Failed to spawn the backing thread for a task.
    #[error("failed to spawn thread for {name}: {reason}")]
    SpawnFailed { name: String, reason: String },

    /// A maneuver wheel thread panicked before joining.
    #[error("{name} wheel thread panicked during maneuver")]
    ManeuverPanicked { name: String },

    /// A parameter outside its permitted range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// RT system call failed during setup.
    #[error("RT setup error: {0}")]
    RtSetup(String),
}

/// Non-fatal error returned by a message handler.
///
/// Caught at the dispatch boundary and logged with the offending handler
/// identified; never stops delivery to other handlers.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
