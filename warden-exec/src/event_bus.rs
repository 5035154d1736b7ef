//! Event bus for domain events.
//!
//! The runner publishes every event the controller reports; loggers,
//! audit writers and tests subscribe independently over a tokio broadcast
//! channel.

use std::fmt;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use warden_domain::Event;

/// Events a subscriber lost because it fell `capacity` events behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lagged(pub u64);

impl fmt::Display for Lagged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber fell behind, missed {} events", self.0)
    }
}

/// Fan-out bus for controller events. Publishing never blocks.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// `capacity` events are buffered per subscriber before it lags.
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    /// Deliver `event` to current subscribers; returns how many got it.
    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            inner: self.sender.subscribe(),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// One subscription to an [`EventBus`].
#[derive(Debug)]
pub struct EventReceiver {
    inner: broadcast::Receiver<Event>,
}

impl EventReceiver {
    /// Wait for the next event; `None` once every bus handle is dropped.
    pub async fn recv(&mut self) -> Option<Result<Event, Lagged>> {
        match self.inner.recv().await {
            Ok(event) => Some(Ok(event)),
            Err(RecvError::Lagged(missed)) => Some(Err(Lagged(missed))),
            Err(RecvError::Closed) => None,
        }
    }

    /// Next buffered event without waiting; `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<Result<Event, Lagged>> {
        match self.inner.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(TryRecvError::Lagged(missed)) => Some(Err(Lagged(missed))),
            Err(TryRecvError::Empty | TryRecvError::Closed) => None,
        }
    }

    /// Everything currently buffered, stopping at the first gap.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv())
            .map_while(Result::ok)
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
