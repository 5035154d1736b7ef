//! Warden Engine
//!
//! Pure decision logic: observations and fills in, order intents and
//! domain events out. No I/O, no async, no clock reads.
//!
//! - [`PositionLedger`]: net position bookkeeping
//! - [`ProtectiveStopEngine`]: stop-loss, take-profit, trailing and break-even
//! - [`PositionController`]: merges signals, enforces one net position, emits intents

#![warn(clippy::all)]

pub mod controller;
pub mod error;
pub mod ledger;
pub mod protection;
pub mod signal;

pub use controller::{ControllerConfig, Decision, PositionController};
pub use error::{EngineError, EngineResult};
pub use ledger::{LedgerChange, PositionLedger};
pub use protection::{ProtectionUpdate, ProtectiveExit, ProtectiveStopEngine, StopAdvance};
pub use signal::{NoSignal, ScriptedSignals, SignalError, SignalSource};
