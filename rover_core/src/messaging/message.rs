//! Messages and their sole construction path.
//!
//! A `Message` wraps an [`Event`] with a sequence number, priority and
//! payload. Don't create one directly: the [`MessageFactory`] assigns
//! sequence numbers from an atomic counter, guaranteeing monotonic
//! ordinals under concurrent producers. Messages are read-only to
//! handlers; the only mutable field is the terminal processed marker set
//! by the bus after dispatch.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use rover_common::event::{Event, Payload};

/// An event wrapped with identity, priority and content.
#[derive(Debug, Clone)]
pub struct Message {
    sequence: u64,
    event: Event,
    priority: u16,
    payload: Payload,
    timestamp: SystemTime,
    processed: bool,
}

impl Message {
    fn new(sequence: u64, event: Event, payload: Payload, priority: u16) -> Self {
        Self {
            sequence,
            event,
            priority,
            payload,
            timestamp: SystemTime::now(),
            processed: false,
        }
    }

    /// Creation ordinal, unique and monotonic per factory.
    #[inline]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The wrapped event.
    #[inline]
    pub const fn event(&self) -> Event {
        self.event
    }

    /// Dispatch priority: lower is served first. Stamped from the event
    /// unless explicitly overridden at construction.
    #[inline]
    pub const fn priority(&self) -> u16 {
        self.priority
    }

    /// The message content.
    #[inline]
    pub const fn payload(&self) -> Payload {
        self.payload
    }

    /// Creation wall-clock time.
    #[inline]
    pub const fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Whether the bus has finished delivering this message.
    #[inline]
    pub const fn is_processed(&self) -> bool {
        self.processed
    }

    /// Terminal marker, set by the bus once every handler has seen the
    /// message.
    pub(crate) fn mark_processed(&mut self) {
        self.processed = true;
    }

    /// `NAME/description` label for log lines.
    pub fn label(&self) -> String {
        format!("{:?}/{}", self.event, self.event.description())
    }
}

// Queue order: priority ascending, ties broken by sequence ascending.
// Only these two fields participate, so the float payload does not break
// totality.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for Message {}

impl PartialOrd for Message {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Message {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, self.sequence).cmp(&(other.priority, other.sequence))
    }
}

/// The sole construction path for messages.
#[derive(Debug, Default)]
pub struct MessageFactory {
    counter: AtomicU64,
}

impl MessageFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a message, stamping priority from the event.
    pub fn message(&self, event: Event, payload: Payload) -> Message {
        let sequence = self.counter.fetch_add(1, AtomicOrdering::Relaxed);
        Message::new(sequence, event, payload, event.priority())
    }

    /// Build a message with an explicit priority override.
    pub fn message_with_priority(&self, event: Event, payload: Payload, priority: u16) -> Message {
        let sequence = self.counter.fetch_add(1, AtomicOrdering::Relaxed);
        Message::new(sequence, event, payload, priority)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn priority_stamped_from_event() {
        let factory = MessageFactory::new();
        let msg = factory.message(Event::BumperContact, Payload::None);
        assert_eq!(msg.priority(), Event::BumperContact.priority());
        assert_eq!(msg.event(), Event::BumperContact);
        assert!(!msg.is_processed());
    }

    #[test]
    fn priority_override() {
        let factory = MessageFactory::new();
        let msg = factory.message_with_priority(Event::ClockTick, Payload::Tick(1), 7);
        assert_eq!(msg.priority(), 7);
    }

    #[test]
    fn sequences_are_monotonic() {
        let factory = MessageFactory::new();
        let a = factory.message(Event::NoAction, Payload::None);
        let b = factory.message(Event::NoAction, Payload::None);
        assert!(b.sequence() > a.sequence());
    }

    #[test]
    fn sequences_unique_under_concurrent_producers() {
        let factory = Arc::new(MessageFactory::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let f = Arc::clone(&factory);
            handles.push(std::thread::spawn(move || {
                (0..250)
                    .map(|_| f.message(Event::ClockTick, Payload::None).sequence())
                    .collect::<Vec<u64>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for seq in handle.join().expect("producer thread") {
                assert!(seen.insert(seq), "duplicate sequence {seq}");
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn queue_order_is_priority_then_sequence() {
        let factory = MessageFactory::new();
        let tick = factory.message(Event::ClockTick, Payload::None); // prio 500, seq 0
        let drive = factory.message(Event::ForwardVelocity, Payload::Velocity(10.0)); // prio 200
        let bumper = factory.message(Event::BumperContact, Payload::None); // prio 10
        let tick2 = factory.message(Event::ClockTick, Payload::None); // prio 500, seq 3

        assert!(bumper < drive);
        assert!(drive < tick);
        assert!(tick < tick2, "equal priority must order by sequence");
    }
}
