//! Domain Entities for Warden
//!
//! Net position, trading signals, order intents and fills.

use crate::value_objects::{DomainError, OrderSide, PositionSign, Price, Quantity, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an OrderIntent
pub type IntentId = Uuid;

// =============================================================================
// Position
// =============================================================================

/// Net position in one instrument.
///
/// # Invariants
/// - `volume == 0` ⇔ `sign == Flat`
/// - `entry_price` is `Some` exactly when the position is open
///
/// The entry price is fixed by the fill that opened the position; adding to
/// an open position does not average it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub sign: PositionSign,
    pub volume: Decimal,
    pub entry_price: Option<Price>,
}

impl Position {
    /// No exposure
    pub fn flat() -> Self {
        Self {
            sign: PositionSign::Flat,
            volume: Decimal::ZERO,
            entry_price: None,
        }
    }

    /// Open position
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPosition` if `volume <= 0`
    pub fn open(side: Side, volume: Decimal, entry_price: Price) -> Result<Self, DomainError> {
        if volume <= Decimal::ZERO {
            return Err(DomainError::InvalidPosition(format!(
                "open position needs positive volume, got {}",
                volume
            )));
        }
        Ok(Self {
            sign: side.into(),
            volume,
            entry_price: Some(entry_price),
        })
    }

    pub fn is_flat(&self) -> bool {
        self.sign.is_flat()
    }

    /// The open side, if any
    pub fn side(&self) -> Option<Side> {
        self.sign.side()
    }

    /// Unrealized P&L at `mark`; zero when flat.
    pub fn unrealized_pnl(&self, mark: Price) -> Decimal {
        match (self.side(), self.entry_price) {
            (Some(side), Some(entry)) => {
                side.favorable_move(entry.as_decimal(), mark.as_decimal()) * self.volume
            },
            _ => Decimal::ZERO,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::flat()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entry_price {
            Some(entry) => write!(f, "{} {} @ {}", self.sign, self.volume, entry),
            None => write!(f, "{}", self.sign),
        }
    }
}

// =============================================================================
// Signal
// =============================================================================

/// Discrete trading intent produced by a signal source or by protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    None,
    EnterLong,
    EnterShort,
    ExitLong,
    ExitShort,
}

impl Signal {
    /// Entry signal for a side
    pub fn enter(side: Side) -> Self {
        match side {
            Side::Long => Signal::EnterLong,
            Side::Short => Signal::EnterShort,
        }
    }

    /// Exit signal that closes a position on `side`
    pub fn exit_for(side: Side) -> Self {
        match side {
            Side::Long => Signal::ExitLong,
            Side::Short => Signal::ExitShort,
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self, Signal::EnterLong | Signal::EnterShort)
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Signal::ExitLong | Signal::ExitShort)
    }
}

impl Default for Signal {
    fn default() -> Self {
        Signal::None
    }
}

// =============================================================================
// Reasons
// =============================================================================

/// Why a position is being closed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExitReason {
    /// Protective stop breached before break-even was armed
    StopLoss,
    /// Take-profit level reached
    TakeProfit,
    /// Protective stop breached after break-even was armed
    BreakEven,
    /// Signal source asked to exit
    Signal,
    /// Strategy stopping
    Shutdown,
    /// Position could not be protected after it opened
    ProtectionFailure,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::BreakEven => "break_even",
            ExitReason::Signal => "signal",
            ExitReason::Shutdown => "shutdown",
            ExitReason::ProtectionFailure => "protection_failure",
        };
        f.write_str(name)
    }
}

/// Why an order intent was emitted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderReason {
    /// Opening from flat
    Entry,
    /// Closing the opposite position and opening in one order
    Reversal,
    /// Flattening
    Exit(ExitReason),
}

impl fmt::Display for OrderReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderReason::Entry => f.write_str("entry"),
            OrderReason::Reversal => f.write_str("reversal"),
            OrderReason::Exit(reason) => write!(f, "exit:{}", reason),
        }
    }
}

// =============================================================================
// Order Intent
// =============================================================================

/// A market order the controller wants executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Unique intent identifier (UUID v7, time ordered)
    pub id: IntentId,
    pub side: OrderSide,
    pub volume: Quantity,
    pub reason: OrderReason,
    pub created_at: DateTime<Utc>,
}

impl OrderIntent {
    /// Create a new intent stamped with `created_at`
    pub fn new(
        side: OrderSide,
        volume: Quantity,
        reason: OrderReason,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            side,
            volume,
            reason,
            created_at,
        }
    }
}

// =============================================================================
// Fill
// =============================================================================

/// Execution report from the venue.
///
/// `volume` is the raw reported amount; the ledger rejects non-positive values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Intent this fill executes, if the venue echoed it back
    pub intent_id: Option<IntentId>,
    pub side: OrderSide,
    pub volume: Decimal,
    pub price: Price,
    /// Trading fee paid, in quote currency
    pub fee: Decimal,
    pub filled_at: DateTime<Utc>,
}

impl Fill {
    /// Fill for a known intent, no fee
    pub fn for_intent(intent: &OrderIntent, price: Price, filled_at: DateTime<Utc>) -> Self {
        Self {
            intent_id: Some(intent.id),
            side: intent.side,
            volume: intent.volume.as_decimal(),
            price,
            fee: Decimal::ZERO,
            filled_at,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
