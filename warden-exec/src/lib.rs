//! Warden Execution Layer
//!
//! Async edge around the pure engine.
//!
//! # Architecture
//!
//! ```text
//! ObservationFeed → StrategyRunner → PositionController → IntentJournal → OrderSink
//!                         │
//!                         └──► EventBus (domain events)
//! ```
//!
//! # Components
//!
//! - **Ports**: traits for the observation feed and the order venue
//! - **Intent Journal**: status of every submitted intent
//! - **Event Bus**: broadcast of controller events
//! - **Runner**: the per-observation loop and its report
//! - **Stub**: in-memory feed and venue for tests and replay
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_exec::{StrategyRunner, StubFeed, StubOrderSink};
//!
//! let sink = Arc::new(StubOrderSink::new().with_fill_delay(1));
//! let runner = StrategyRunner::new(StubFeed::new(bars), sink, controller, Box::new(source));
//! let report = runner.run().await?;
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod event_bus;
pub mod intent;
pub mod ports;
pub mod runner;
pub mod stub;

// Re-exports for convenience
pub use error::{ExecError, ExecResult};
pub use event_bus::{EventBus, EventReceiver, Lagged};
pub use intent::{IntentJournal, IntentStatus, JournalEntry};
pub use ports::{ObservationFeed, OrderAck, OrderSink};
pub use runner::{RunReport, StrategyRunner};
pub use stub::{StubFeed, StubOrderSink};
