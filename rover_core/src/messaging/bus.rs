//! Priority-ordered message dispatcher.
//!
//! Producers enqueue with [`MessageBus::handle`]; a dispatch loop drains
//! the queue in (priority, sequence) order and delivers each message to
//! every handler registered for its event, in registration order. A
//! collision-class event is therefore serviced ahead of a lower-urgency
//! cruise adjustment even if it arrived later, while same-priority events
//! stay FIFO.
//!
//! The queue and the sequence counter are the only structures in the
//! runtime with multiple concurrent producers; both are locked/atomic.
//! Handler failures are caught per handler and logged so one failing
//! consumer never blocks delivery to the others or the producing thread.
//! Handlers must not register further handlers from inside a callback.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use heapless::binary_heap::{BinaryHeap, Min};
use rover_common::consts::BUS_CAPACITY;
use rover_common::event::Event;
use tracing::{debug, warn};

use crate::error::{HandlerError, RuntimeError};
use crate::messaging::message::Message;

/// Result type returned by message handlers.
pub type HandlerResult = Result<(), HandlerError>;

type HandlerFn = Box<dyn Fn(&Message) -> HandlerResult + Send>;

struct RegisteredHandler {
    name: &'static str,
    callback: HandlerFn,
}

/// Centralised priority-ordered dispatcher for [`Message`]s.
pub struct MessageBus {
    queue: Mutex<BinaryHeap<Message, Min, BUS_CAPACITY>>,
    handlers: Mutex<BTreeMap<Event, Vec<RegisteredHandler>>>,
    dispatched: AtomicU64,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(BinaryHeap::new()),
            handlers: Mutex::new(BTreeMap::new()),
            dispatched: AtomicU64::new(0),
        }
    }

    /// Register a handler for the given event. Multiple handlers per
    /// event run in registration order.
    pub fn add_handler<F>(&self, event: Event, name: &'static str, callback: F)
    where
        F: Fn(&Message) -> HandlerResult + Send + 'static,
    {
        let mut handlers = lock(&self.handlers);
        handlers.entry(event).or_default().push(RegisteredHandler {
            name,
            callback: Box::new(callback),
        });
        debug!(handler = name, event = ?event, "handler registered");
    }

    /// Enqueue a message for dispatch.
    ///
    /// Returns `QueueFull` without enqueuing when the bus is at capacity;
    /// a message is never silently dropped.
    pub fn handle(&self, message: Message) -> Result<(), RuntimeError> {
        let mut queue = lock(&self.queue);
        queue
            .push(message)
            .map_err(|_| RuntimeError::QueueFull {
                capacity: BUS_CAPACITY,
            })
    }

    /// Drain the queue, delivering each message to every handler
    /// registered for its event. Returns the number of messages
    /// dispatched.
    pub fn dispatch(&self) -> usize {
        let mut count = 0;
        loop {
            let popped = lock(&self.queue).pop();
            let Some(mut message) = popped else {
                break;
            };
            {
                let handlers = lock(&self.handlers);
                if let Some(list) = handlers.get(&message.event()) {
                    for handler in list {
                        if let Err(e) = (handler.callback)(&message) {
                            warn!(
                                handler = handler.name,
                                message = %message.label(),
                                error = %e,
                                "handler failed; continuing delivery"
                            );
                        }
                    }
                }
            }
            message.mark_processed();
            count += 1;
        }
        self.dispatched.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Messages currently queued.
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Total messages dispatched over the bus lifetime.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}

// A poisoned lock means a handler panicked; the protected data is still
// structurally sound, so keep delivering.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::message::MessageFactory;
    use rover_common::event::Payload;
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;

    fn recorder(bus: &MessageBus, event: Event, log: &Arc<StdMutex<Vec<(Event, u64)>>>) {
        let log = Arc::clone(log);
        bus.add_handler(event, "recorder", move |m| {
            log.lock().unwrap().push((m.event(), m.sequence()));
            Ok(())
        });
    }

    #[test]
    fn higher_priority_dispatches_first() {
        let bus = MessageBus::new();
        let factory = MessageFactory::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        recorder(&bus, Event::ForwardVelocity, &log);
        recorder(&bus, Event::BumperContact, &log);

        // Low-urgency drive command arrives before the collision event.
        bus.handle(factory.message(Event::ForwardVelocity, Payload::Velocity(10.0)))
            .unwrap();
        bus.handle(factory.message(Event::BumperContact, Payload::None))
            .unwrap();
        assert_eq!(bus.dispatch(), 2);

        let order: Vec<Event> = log.lock().unwrap().iter().map(|(e, _)| *e).collect();
        assert_eq!(order, [Event::BumperContact, Event::ForwardVelocity]);
    }

    #[test]
    fn equal_priority_stays_fifo() {
        let bus = MessageBus::new();
        let factory = MessageFactory::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        recorder(&bus, Event::ClockTick, &log);

        for _ in 0..5 {
            bus.handle(factory.message(Event::ClockTick, Payload::None))
                .unwrap();
        }
        bus.dispatch();

        let sequences: Vec<u64> = log.lock().unwrap().iter().map(|(_, s)| *s).collect();
        let mut sorted = sequences.clone();
        sorted.sort_unstable();
        assert_eq!(sequences, sorted, "same-priority messages must stay FIFO");
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = MessageBus::new();
        let factory = MessageFactory::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            bus.add_handler(Event::ClockTock, tag, move |_| {
                log.lock().unwrap().push(tag);
                Ok(())
            });
        }
        bus.handle(factory.message(Event::ClockTock, Payload::None))
            .unwrap();
        bus.dispatch();
        assert_eq!(*log.lock().unwrap(), ["first", "second", "third"]);
    }

    #[test]
    fn failing_handler_does_not_block_delivery() {
        let bus = MessageBus::new();
        let factory = MessageFactory::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        bus.add_handler(Event::Halt, "faulty", |_| {
            Err(HandlerError::new("sensor offline"))
        });
        let l = Arc::clone(&log);
        bus.add_handler(Event::Halt, "healthy", move |m| {
            l.lock().unwrap().push(m.sequence());
            Ok(())
        });

        bus.handle(factory.message(Event::Halt, Payload::None)).unwrap();
        assert_eq!(bus.dispatch(), 1);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn unhandled_events_are_still_drained() {
        let bus = MessageBus::new();
        let factory = MessageFactory::new();
        bus.handle(factory.message(Event::NoAction, Payload::None))
            .unwrap();
        assert_eq!(bus.pending(), 1);
        assert_eq!(bus.dispatch(), 1);
        assert_eq!(bus.pending(), 0);
        assert_eq!(bus.dispatched(), 1);
    }

    #[test]
    fn queue_full_is_an_error_not_a_drop() {
        let bus = MessageBus::new();
        let factory = MessageFactory::new();
        for _ in 0..BUS_CAPACITY {
            bus.handle(factory.message(Event::ClockTick, Payload::None))
                .unwrap();
        }
        let result = bus.handle(factory.message(Event::ClockTick, Payload::None));
        assert!(matches!(result, Err(RuntimeError::QueueFull { .. })));
        assert_eq!(bus.pending(), BUS_CAPACITY);
    }

    #[test]
    fn every_message_reaches_every_handler_exactly_once() {
        let bus = MessageBus::new();
        let factory = MessageFactory::new();
        let log_a = Arc::new(StdMutex::new(Vec::new()));
        let log_b = Arc::new(StdMutex::new(Vec::new()));
        recorder(&bus, Event::InfraredCntr, &log_a);
        recorder(&bus, Event::InfraredCntr, &log_b);

        for i in 0..10 {
            bus.handle(factory.message(Event::InfraredCntr, Payload::Distance(f64::from(i))))
                .unwrap();
        }
        bus.dispatch();
        assert_eq!(log_a.lock().unwrap().len(), 10);
        assert_eq!(log_b.lock().unwrap().len(), 10);
    }
}
