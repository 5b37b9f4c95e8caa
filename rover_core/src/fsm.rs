//! Subsystem lifecycle state machine.
//!
//! One shared transition table guarantees every subsystem exposes an
//! identical lifecycle contract: an initial `run()` followed by repeated
//! transitions between `enable()` and `disable()`, then a terminal
//! `close()`. Composing behaviours never needs subsystem-specific
//! lifecycle handling.

use tracing::{debug, warn};

use crate::error::RuntimeError;

/// Lifecycle state of a subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Pre-construction placeholder.
    New,
    /// Constructed, not yet running.
    Initial,
    /// Backing thread running, periodic work not yet enabled.
    Started,
    /// Periodic work running.
    Enabled,
    /// Periodic work paused.
    Disabled,
    /// Terminal.
    Closed,
}

/// Outcome of looking a transition up in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Legality {
    /// Permitted.
    Legal,
    /// Tolerated but logged as suspect (same-state enable/disable).
    Suspect,
    /// Rejected with an error.
    Illegal,
}

/// The single transition table.
const fn legality(from: State, to: State) -> Legality {
    use Legality::*;
    use State::*;
    match (from, to) {
        (New, Initial) => Legal,
        (Initial, Started | Closed) => Legal,
        (Started, Enabled | Disabled | Closed) => Legal,
        (Enabled, Disabled | Closed) => Legal,
        (Enabled, Enabled) => Suspect,
        (Disabled, Enabled | Closed) => Legal,
        (Disabled, Disabled) => Suspect,
        _ => Illegal,
    }
}

/// Named lifecycle state machine.
#[derive(Debug, Clone)]
pub struct StateMachine {
    name: String,
    state: State,
}

impl StateMachine {
    /// Create a new machine, performing the New → Initial transition.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(subsystem = %name, "fsm initialised");
        Self {
            name,
            state: State::Initial,
        }
    }

    /// Current state.
    #[inline]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Subsystem name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Initial → Started.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        self.transition(State::Started)
    }

    /// Started/Disabled → Enabled.
    pub fn enable(&mut self) -> Result<(), RuntimeError> {
        self.transition(State::Enabled)
    }

    /// Started/Enabled → Disabled.
    pub fn disable(&mut self) -> Result<(), RuntimeError> {
        self.transition(State::Disabled)
    }

    /// Any non-Closed state → Closed. A second close is rejected.
    pub fn close(&mut self) -> Result<(), RuntimeError> {
        self.transition(State::Closed)
    }

    fn transition(&mut self, next: State) -> Result<(), RuntimeError> {
        match legality(self.state, next) {
            Legality::Legal => {
                debug!(subsystem = %self.name, from = ?self.state, to = ?next, "transition");
                self.state = next;
                Ok(())
            }
            Legality::Suspect => {
                warn!(subsystem = %self.name, from = ?self.state, to = ?next, "suspect transition");
                self.state = next;
                Ok(())
            }
            Legality::Illegal => Err(RuntimeError::IllegalTransition {
                name: self.name.clone(),
                from: self.state,
                to: next,
            }),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use Legality::*;
    use State::*;

    #[test]
    fn starts_in_initial() {
        let fsm = StateMachine::new("test");
        assert_eq!(fsm.state(), Initial);
    }

    #[test]
    fn normal_lifecycle() {
        let mut fsm = StateMachine::new("test");
        fsm.run().unwrap();
        assert_eq!(fsm.state(), Started);
        fsm.enable().unwrap();
        assert_eq!(fsm.state(), Enabled);
        fsm.disable().unwrap();
        assert_eq!(fsm.state(), Disabled);
        fsm.enable().unwrap();
        fsm.close().unwrap();
        assert_eq!(fsm.state(), Closed);
    }

    #[test]
    fn close_without_running() {
        let mut fsm = StateMachine::new("test");
        fsm.close().unwrap();
        assert_eq!(fsm.state(), Closed);
    }

    #[test]
    fn run_twice_rejected() {
        let mut fsm = StateMachine::new("test");
        fsm.run().unwrap();
        assert!(matches!(
            fsm.run(),
            Err(RuntimeError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn enable_before_run_rejected() {
        let mut fsm = StateMachine::new("test");
        assert!(fsm.enable().is_err());
    }

    #[test]
    fn second_close_rejected() {
        let mut fsm = StateMachine::new("test");
        fsm.run().unwrap();
        fsm.close().unwrap();
        let err = fsm.close().unwrap_err();
        assert!(matches!(err, RuntimeError::IllegalTransition { .. }));
        // Still closed.
        assert_eq!(fsm.state(), Closed);
    }

    #[test]
    fn closed_is_terminal() {
        let mut fsm = StateMachine::new("test");
        fsm.close().unwrap();
        assert!(fsm.run().is_err());
        assert!(fsm.enable().is_err());
        assert!(fsm.disable().is_err());
    }

    #[test]
    fn same_state_toggle_is_suspect_not_error() {
        let mut fsm = StateMachine::new("test");
        fsm.run().unwrap();
        fsm.enable().unwrap();
        fsm.enable().unwrap();
        assert_eq!(fsm.state(), Enabled);
        fsm.disable().unwrap();
        fsm.disable().unwrap();
        assert_eq!(fsm.state(), Disabled);
    }

    #[test]
    fn table_covers_new_state() {
        assert_eq!(legality(New, Initial), Legal);
        assert_eq!(legality(New, Started), Illegal);
        assert_eq!(legality(New, Closed), Illegal);
    }

    #[test]
    fn table_rejects_backwards_transitions() {
        assert_eq!(legality(Started, Initial), Illegal);
        assert_eq!(legality(Enabled, Started), Illegal);
        assert_eq!(legality(Closed, Started), Illegal);
        assert_eq!(legality(Closed, Closed), Illegal);
    }
}
