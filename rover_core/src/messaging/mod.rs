//! Event-laden messages and the priority-ordered bus.

pub mod bus;
pub mod message;

pub use bus::{HandlerResult, MessageBus};
pub use message::{Message, MessageFactory};
