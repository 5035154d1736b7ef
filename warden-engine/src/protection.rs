//! Protective Stop Engine
//!
//! Derives stop-loss, take-profit, trailing and break-even levels for an
//! open position and detects breaches on each finalized bar.
//!
//! # State Machine (per open position)
//!
//! ```text
//! Armed ──(favorable excursion ≥ trigger)──► BreakEven
//!   │  ▲ trailing advance                      │  ▲ trailing advance
//!   │  └──────┘                                │  └──────┘
//!   └──────────(breach)──► exit ◄──(breach)────┘
//! ```
//!
//! Per bar, breach detection runs first against the levels in force when
//! the bar opened. Only when nothing is breached do trailing and
//! break-even move the stop, using the bar close; moved levels apply from
//! the next bar. When stop and take-profit are both crossed by the same
//! bar, the stop wins.

use rust_decimal::Decimal;
use tracing::warn;

use warden_domain::trailing::{
    advance_trailing_stop, break_even_stop, is_stop_hit, is_target_hit, tighter_stop,
};
use warden_domain::{
    DistanceUnit, ExitReason, Instrument, Position, Price, PriceObservation, ProtectionConfig,
    ProtectionState, Side, Signal,
};

use crate::error::{EngineError, EngineResult};

/// A breached protective level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectiveExit {
    /// `ExitLong` or `ExitShort`
    pub signal: Signal,
    pub reason: ExitReason,
    /// Bar extreme that crossed the level
    pub trigger_price: Price,
    pub level: Price,
}

/// Stop movement produced by one bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopAdvance {
    pub previous: Option<Price>,
    pub new: Price,
}

/// Outcome of evaluating one bar against a protection state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtectionUpdate {
    pub exit: Option<ProtectiveExit>,
    pub stop_advanced: Option<StopAdvance>,
    /// Break-even armed on this bar
    pub break_even_armed: bool,
}

/// Stateless engine; the caller owns each position's `ProtectionState`.
#[derive(Debug, Clone)]
pub struct ProtectiveStopEngine {
    config: ProtectionConfig,
    price_step: Decimal,
}

impl ProtectiveStopEngine {
    /// Create an engine for one instrument.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidConfig` if any distance is negative, or
    /// if price-step units are configured for an instrument without a
    /// positive price step.
    pub fn new(config: ProtectionConfig, instrument: &Instrument) -> EngineResult<Self> {
        config
            .validate()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;

        if config.unit == DistanceUnit::PriceStep && instrument.price_step <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig(format!(
                "price_step units need a positive price step for {}, got {}",
                instrument.symbol, instrument.price_step
            )));
        }

        Ok(Self {
            config,
            price_step: instrument.price_step,
        })
    }

    pub fn config(&self) -> &ProtectionConfig {
        &self.config
    }

    /// Build the initial protection state for a freshly opened position.
    ///
    /// The initial stop is the tighter of the stop-loss level and the
    /// trailing level measured from entry; either leg may be disabled.
    /// Break-even is disabled when its level would not be a positive price.
    ///
    /// # Errors
    /// Returns `EngineError::ProtectionUnavailable` if the position is flat
    /// or a resolved level is not a positive price.
    pub fn arm(&self, position: &Position) -> EngineResult<ProtectionState> {
        let (side, entry) = match (position.side(), position.entry_price) {
            (Some(side), Some(entry)) => (side, entry),
            _ => {
                return Err(EngineError::ProtectionUnavailable(
                    "cannot arm protection for a flat position".to_string(),
                ))
            },
        };

        let mut distances = self.config.resolve(entry, self.price_step);
        if distances.break_even_trigger > Decimal::ZERO
            && break_even_stop(side, entry, distances.break_even_offset).is_none()
        {
            warn!(
                %side,
                %entry,
                offset = %distances.break_even_offset,
                "Break-even level is not a valid price, disabling break-even"
            );
            distances.break_even_trigger = Decimal::ZERO;
        }

        let stop_loss = adverse_level(side, entry, distances.stop_loss, "stop-loss")?;
        let trailing = adverse_level(side, entry, distances.trailing, "trailing stop")?;
        let take_profit = favorable_level(side, entry, distances.take_profit)?;

        Ok(ProtectionState {
            side,
            entry_price: entry,
            stop_price: tighter_stop(side, stop_loss, trailing),
            take_profit_price: take_profit,
            is_break_even_armed: false,
            distances,
        })
    }

    /// Evaluate one bar: detect breaches, then advance trailing and break-even.
    pub fn evaluate(&self, state: &mut ProtectionState, bar: &PriceObservation) -> ProtectionUpdate {
        if let Some(exit) = detect_breach(state, bar) {
            return ProtectionUpdate {
                exit: Some(exit),
                ..ProtectionUpdate::default()
            };
        }

        let side = state.side;
        let previous = state.stop_price;
        let mut update = ProtectionUpdate::default();

        if let Some(stop) =
            advance_trailing_stop(side, bar.close, state.stop_price, state.distances.trailing)
        {
            state.stop_price = Some(stop);
        }

        if !state.is_break_even_armed && state.distances.break_even_trigger > Decimal::ZERO {
            let excursion =
                side.favorable_move(state.entry_price.as_decimal(), bar.close.as_decimal());

            if excursion >= state.distances.break_even_trigger {
                if let Some(level) =
                    break_even_stop(side, state.entry_price, state.distances.break_even_offset)
                {
                    state.stop_price = tighter_stop(side, state.stop_price, Some(level));
                    state.is_break_even_armed = true;
                    update.break_even_armed = true;
                }
            }
        }

        if let Some(new) = state.stop_price {
            if previous != Some(new) {
                update.stop_advanced = Some(StopAdvance { previous, new });
            }
        }

        update
    }
}

/// Check the levels in force against the bar. Stop is checked first.
fn detect_breach(state: &ProtectionState, bar: &PriceObservation) -> Option<ProtectiveExit> {
    let side = state.side;
    let signal = Signal::exit_for(side);

    if let Some(stop) = state.stop_price {
        if is_stop_hit(side, bar, stop) {
            let reason = if state.is_break_even_armed {
                ExitReason::BreakEven
            } else {
                ExitReason::StopLoss
            };
            let trigger_price = match side {
                Side::Long => bar.low,
                Side::Short => bar.high,
            };
            return Some(ProtectiveExit {
                signal,
                reason,
                trigger_price,
                level: stop,
            });
        }
    }

    if let Some(target) = state.take_profit_price {
        if is_target_hit(side, bar, target) {
            let trigger_price = match side {
                Side::Long => bar.high,
                Side::Short => bar.low,
            };
            return Some(ProtectiveExit {
                signal,
                reason: ExitReason::TakeProfit,
                trigger_price,
                level: target,
            });
        }
    }

    None
}

/// Level `distance` against the position; `None` when the leg is disabled.
fn adverse_level(
    side: Side,
    entry: Price,
    distance: Decimal,
    leg: &str,
) -> EngineResult<Option<Price>> {
    if distance <= Decimal::ZERO {
        return Ok(None);
    }
    let level = match side {
        Side::Long => entry.as_decimal() - distance,
        Side::Short => entry.as_decimal() + distance,
    };
    Price::new(level).map(Some).map_err(|_| {
        EngineError::ProtectionUnavailable(format!(
            "{} {} from entry {} is not a valid price",
            leg, distance, entry
        ))
    })
}

/// Take-profit level `distance` in favour of the position.
fn favorable_level(side: Side, entry: Price, distance: Decimal) -> EngineResult<Option<Price>> {
    if distance <= Decimal::ZERO {
        return Ok(None);
    }
    let level = match side {
        Side::Long => entry.as_decimal() + distance,
        Side::Short => entry.as_decimal() - distance,
    };
    Price::new(level).map(Some).map_err(|_| {
        EngineError::ProtectionUnavailable(format!(
            "take-profit {} from entry {} is not a valid price",
            distance, entry
        ))
    })
}

// =============================================================================
// Tests
// =============================================================================
