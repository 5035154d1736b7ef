//! Trailing Stop and Breach Logic (Pure Functions)
//!
//! Deterministic helpers shared by the protective stop engine.
//!
//! # Trailing Stop Algorithm
//!
//! The candidate stop is anchored to the bar close:
//! - LONG: candidate = close - trailing_distance
//! - SHORT: candidate = close + trailing_distance
//!
//! Key invariants:
//! - Stop is monotonic (never moves against the position)
//! - A candidate that is not a positive price is ignored

use rust_decimal::Decimal;

use crate::market_data::PriceObservation;
use crate::value_objects::{Price, Side};

/// Advance a trailing stop from the latest close.
///
/// Returns the new stop when the candidate is strictly more favorable than
/// `current_stop` (or there is no stop yet), `None` otherwise.
///
/// ```text
/// LONG:  candidate = close - distance, update if candidate > current
/// SHORT: candidate = close + distance, update if candidate < current
/// ```
///
/// # Examples
///
/// ```
/// # use warden_domain::trailing::advance_trailing_stop;
/// # use warden_domain::value_objects::{Price, Side};
/// # use rust_decimal_macros::dec;
/// let stop = Price::new(dec!(97)).unwrap();
///
/// // Close rises to 105: stop moves to 102
/// let moved = advance_trailing_stop(Side::Long, Price::new(dec!(105)).unwrap(), Some(stop), dec!(3));
/// assert_eq!(moved.unwrap().as_decimal(), dec!(102));
///
/// // Close drops to 99: candidate 96 is worse, no update
/// let held = advance_trailing_stop(Side::Long, Price::new(dec!(99)).unwrap(), Some(stop), dec!(3));
/// assert!(held.is_none());
/// ```
pub fn advance_trailing_stop(
    side: Side,
    close: Price,
    current_stop: Option<Price>,
    distance: Decimal,
) -> Option<Price> {
    if distance <= Decimal::ZERO {
        return None;
    }

    let candidate = match side {
        Side::Long => close.as_decimal() - distance,
        Side::Short => close.as_decimal() + distance,
    };
    let candidate = Price::new(candidate).ok()?;

    match current_stop {
        None => Some(candidate),
        Some(stop) if is_tighter(side, candidate, stop) => Some(candidate),
        Some(_) => None,
    }
}

/// Whether `candidate` protects the position better than `current`.
///
/// LONG: higher is tighter. SHORT: lower is tighter.
pub fn is_tighter(side: Side, candidate: Price, current: Price) -> bool {
    match side {
        Side::Long => candidate > current,
        Side::Short => candidate < current,
    }
}

/// The tighter of two optional stops.
pub fn tighter_stop(side: Side, a: Option<Price>, b: Option<Price>) -> Option<Price> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if is_tighter(side, b, a) { b } else { a }),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Check if a bar breaches the stop.
///
/// LONG exits when `low <= stop`, SHORT when `high >= stop`.
///
/// ```
/// # use warden_domain::trailing::is_stop_hit;
/// # use warden_domain::market_data::PriceObservation;
/// # use warden_domain::value_objects::{Price, Side};
/// # use rust_decimal_macros::dec;
/// let bar = PriceObservation::new(chrono::Utc::now(), dec!(98), dec!(99), dec!(94), dec!(96)).unwrap();
/// assert!(is_stop_hit(Side::Long, &bar, Price::new(dec!(95)).unwrap()));
/// assert!(!is_stop_hit(Side::Short, &bar, Price::new(dec!(105)).unwrap()));
/// ```
pub fn is_stop_hit(side: Side, bar: &PriceObservation, stop: Price) -> bool {
    match side {
        Side::Long => bar.low <= stop,
        Side::Short => bar.high >= stop,
    }
}

/// Check if a bar reaches the take-profit.
///
/// LONG exits when `high >= target`, SHORT when `low <= target`.
pub fn is_target_hit(side: Side, bar: &PriceObservation, target: Price) -> bool {
    match side {
        Side::Long => bar.high >= target,
        Side::Short => bar.low <= target,
    }
}

/// Stop level once break-even arms: `entry + offset` (long), `entry - offset` (short).
///
/// Returns `None` if the level would not be a positive price.
pub fn break_even_stop(side: Side, entry: Price, offset: Decimal) -> Option<Price> {
    let level = match side {
        Side::Long => entry.as_decimal() + offset,
        Side::Short => entry.as_decimal() - offset,
    };
    Price::new(level).ok()
}

// =============================================================================
// Tests
// =============================================================================
