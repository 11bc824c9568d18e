//! Progress events

use std::fmt;
use tokio::sync::mpsc;

/// Whether an event starts or completes a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// The step is running
    Ongoing,
    /// The step finished
    Done,
}

/// A progress notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Step status
    pub status: EventStatus,
    /// Human readable description
    pub message: String,
}

impl Event {
    /// A step started
    pub fn ongoing(message: impl Into<String>) -> Self {
        Self { status: EventStatus::Ongoing, message: message.into() }
    }

    /// A step finished
    pub fn done(message: impl Into<String>) -> Self {
        Self { status: EventStatus::Done, message: message.into() }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            EventStatus::Ongoing => write!(f, "... {}", self.message),
            EventStatus::Done => write!(f, "✔ {}", self.message),
        }
    }
}

/// Sink for progress events.
///
/// Sending never fails: a bus without a receiver, or whose receiver was
/// dropped, discards events.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    tx: Option<mpsc::UnboundedSender<Event>>,
}

impl EventBus {
    /// A bus and the receiving end of its events
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A bus that discards every event
    pub const fn disabled() -> Self {
        Self { tx: None }
    }

    /// Publish `event`
    pub fn send(&self, event: Event) {
        if let Some(tx) = &self.tx {
            // a closed receiver only means nobody is listening
            let _ = tx.send(event);
        }
    }

    pub(crate) fn ongoing(&self, message: &str) {
        self.send(Event::ongoing(message));
    }

    pub(crate) fn done(&self, message: &str) {
        self.send(Event::done(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_order_and_tolerates_closed_receiver() {
        let (bus, mut rx) = EventBus::channel();
        bus.ongoing("Building the genesis");
        bus.done("Genesis built");

        assert_eq!(rx.try_recv().unwrap(), Event::ongoing("Building the genesis"));
        assert_eq!(rx.try_recv().unwrap().to_string(), "✔ Genesis built");

        drop(rx);
        bus.done("ignored");
        EventBus::disabled().done("ignored");
    }
}
