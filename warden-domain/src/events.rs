//! Domain Events for Warden
//!
//! Events are immutable records of what the controller decided or observed.
//! They feed logging and observability collaborators and serialize for
//! audit trails.

use crate::entities::{ExitReason, IntentId, OrderIntent, Position, Signal};
use crate::value_objects::{Price, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Domain events for the position and protection lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Net position changed after a fill
    PositionChanged {
        previous: Position,
        current: Position,
        /// Realized P&L fixed by this change
        realized_pnl: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// Protective levels created for a newly opened position
    ProtectionArmed {
        side: Side,
        entry_price: Price,
        stop_price: Option<Price>,
        take_profit_price: Option<Price>,
        timestamp: DateTime<Utc>,
    },

    /// Trailing moved the stop in the position's favour
    StopAdvanced {
        previous_stop: Option<Price>,
        new_stop: Price,
        /// Close that produced the candidate
        trigger_price: Price,
        timestamp: DateTime<Utc>,
    },

    /// Break-even armed; stop now at (or beyond) entry plus offset
    BreakEvenArmed {
        stop_price: Price,
        timestamp: DateTime<Utc>,
    },

    /// A protective level was breached
    ExitTriggered {
        signal: Signal,
        reason: ExitReason,
        /// Bar extreme that crossed the level
        trigger_price: Price,
        level: Price,
        timestamp: DateTime<Utc>,
    },

    /// Protection discarded because the position went flat
    ProtectionCleared { timestamp: DateTime<Utc> },

    /// Controller emitted an order intent
    OrderIntentEmitted {
        intent: OrderIntent,
        timestamp: DateTime<Utc>,
    },

    /// Order sink declined an intent
    OrderRejected {
        intent_id: IntentId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Fill arrived against a position state that changed since its intent
    StaleFill {
        intent_id: Option<IntentId>,
        expected: Option<Position>,
        actual: Position,
        timestamp: DateTime<Utc>,
    },

    /// Venue reported a fill the ledger cannot apply
    InvalidFill {
        intent_id: Option<IntentId>,
        volume: Decimal,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Signal source failed; observation processed as if it returned `None`
    SignalSourceFailed {
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// Get event type as string (for logging and persistence)
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::PositionChanged { .. } => "position_changed",
            Event::ProtectionArmed { .. } => "protection_armed",
            Event::StopAdvanced { .. } => "stop_advanced",
            Event::BreakEvenArmed { .. } => "break_even_armed",
            Event::ExitTriggered { .. } => "exit_triggered",
            Event::ProtectionCleared { .. } => "protection_cleared",
            Event::OrderIntentEmitted { .. } => "order_intent_emitted",
            Event::OrderRejected { .. } => "order_rejected",
            Event::StaleFill { .. } => "stale_fill",
            Event::InvalidFill { .. } => "invalid_fill",
            Event::SignalSourceFailed { .. } => "signal_source_failed",
        }
    }

    /// Get timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::PositionChanged { timestamp, .. }
            | Event::ProtectionArmed { timestamp, .. }
            | Event::StopAdvanced { timestamp, .. }
            | Event::BreakEvenArmed { timestamp, .. }
            | Event::ExitTriggered { timestamp, .. }
            | Event::ProtectionCleared { timestamp }
            | Event::OrderIntentEmitted { timestamp, .. }
            | Event::OrderRejected { timestamp, .. }
            | Event::StaleFill { timestamp, .. }
            | Event::InvalidFill { timestamp, .. }
            | Event::SignalSourceFailed { timestamp, .. } => *timestamp,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
