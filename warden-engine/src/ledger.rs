//! Position Ledger: single source of truth for the net position.
//!
//! Pure bookkeeping, no I/O. A fill that crosses through zero is split into
//! a close-to-flat step (realizing P&L on the old position) followed by an
//! open step priced at the fill for the remaining volume.

use rust_decimal::Decimal;
use tracing::debug;

use warden_domain::{Fill, Position};

use crate::error::{EngineError, EngineResult};

/// What a fill did to the position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerChange {
    /// Flat → open
    Opened,
    /// Added in the same direction; entry price unchanged
    Increased,
    /// Partially closed
    Reduced { realized_pnl: Decimal },
    /// Fully closed to flat
    Closed { realized_pnl: Decimal },
    /// Closed and reopened in the other direction by one fill
    Reversed { realized_pnl: Decimal },
}

impl LedgerChange {
    /// Whether a new position (with a new entry price) began
    pub fn opened_position(&self) -> bool {
        matches!(self, LedgerChange::Opened | LedgerChange::Reversed { .. })
    }

    /// Whether the old position ended (flat or reversed)
    pub fn closed_position(&self) -> bool {
        matches!(self, LedgerChange::Closed { .. } | LedgerChange::Reversed { .. })
    }

    /// P&L realized by this change
    pub fn realized_pnl(&self) -> Decimal {
        match self {
            LedgerChange::Opened | LedgerChange::Increased => Decimal::ZERO,
            LedgerChange::Reduced { realized_pnl }
            | LedgerChange::Closed { realized_pnl }
            | LedgerChange::Reversed { realized_pnl } => *realized_pnl,
        }
    }
}

/// Tracks the net position and realized results.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    position: Position,
    realized_pnl: Decimal,
    fees_paid: Decimal,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Immutable copy of the current position.
    pub fn snapshot(&self) -> Position {
        self.position
    }

    /// Cumulative gross realized P&L (fees excluded).
    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Cumulative fees reported by fills.
    pub fn fees_paid(&self) -> Decimal {
        self.fees_paid
    }

    /// Apply a venue fill.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidFill` if `fill.volume <= 0`; the position is unchanged.
    pub fn apply_fill(&mut self, fill: &Fill) -> EngineResult<LedgerChange> {
        if fill.volume <= Decimal::ZERO {
            return Err(EngineError::InvalidFill(format!(
                "fill volume must be positive, got {}",
                fill.volume
            )));
        }

        let fill_side = fill.side.opens();
        let change = match (self.position.side(), self.position.entry_price) {
            (Some(side), Some(entry)) if side != fill_side => {
                let per_unit = side.favorable_move(entry.as_decimal(), fill.price.as_decimal());
                let open_volume = self.position.volume;

                if fill.volume < open_volume {
                    let realized_pnl = per_unit * fill.volume;
                    self.position.volume = open_volume - fill.volume;
                    LedgerChange::Reduced { realized_pnl }
                } else if fill.volume == open_volume {
                    let realized_pnl = per_unit * open_volume;
                    self.position = Position::flat();
                    LedgerChange::Closed { realized_pnl }
                } else {
                    let realized_pnl = per_unit * open_volume;
                    self.position =
                        Position::open(fill_side, fill.volume - open_volume, fill.price)?;
                    LedgerChange::Reversed { realized_pnl }
                }
            },
            (Some(_), Some(_)) => {
                self.position.volume += fill.volume;
                LedgerChange::Increased
            },
            _ => {
                self.position = Position::open(fill_side, fill.volume, fill.price)?;
                LedgerChange::Opened
            },
        };

        self.realized_pnl += change.realized_pnl();
        self.fees_paid += fill.fee;

        debug!(
            side = %fill.side,
            volume = %fill.volume,
            price = %fill.price,
            position = %self.position,
            ?change,
            "Fill applied to ledger"
        );

        Ok(change)
    }

    /// Forget the position and realized totals.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// =============================================================================
// Tests
// =============================================================================
