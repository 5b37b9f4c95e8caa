//! Behaviours and maneuver arbitration built on the bus and the motor
//! controller.

pub mod arbitrator;
pub mod cruise;
pub mod travel;

pub use arbitrator::Arbitrator;
pub use cruise::CruiseBehaviour;
pub use travel::{TravelBehaviour, TravelOutcome, TravelPhase, TravelPlan};
