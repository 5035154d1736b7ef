//! Market Data Types
//!
//! Finalized price bars and the instrument metadata the protection logic
//! needs. Exchange-agnostic; used for both live and replayed data.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::{DomainError, Price, Symbol};

// =============================================================================
// PriceObservation
// =============================================================================

/// One finalized OHLC bar for a single instrument.
///
/// # Invariants
/// - All prices are positive
/// - `high >= max(open, close)` and `low <= min(open, close)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Bar close time
    pub timestamp: DateTime<Utc>,
    /// Open price
    pub open: Price,
    /// High price
    pub high: Price,
    /// Low price
    pub low: Price,
    /// Close price
    pub close: Price,
}

impl PriceObservation {
    /// Create a validated observation.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrice` for non-positive prices and
    /// `DomainError::InvalidObservation` when high/low do not bracket open/close.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> Result<Self, DomainError> {
        let open = Price::new(open)?;
        let high = Price::new(high)?;
        let low = Price::new(low)?;
        let close = Price::new(close)?;

        if high < open.max(close) {
            return Err(DomainError::InvalidObservation(format!(
                "high {} below open/close ({} / {})",
                high, open, close
            )));
        }

        if low > open.min(close) {
            return Err(DomainError::InvalidObservation(format!(
                "low {} above open/close ({} / {})",
                low, open, close
            )));
        }

        Ok(Self {
            timestamp,
            open,
            high,
            low,
            close,
        })
    }

    /// Flat bar where every field equals `price` (ticks, tests).
    pub fn at_price(timestamp: DateTime<Utc>, price: Price) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }
}

// =============================================================================
// Instrument
// =============================================================================

/// Venue metadata for the traded instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Trading pair
    pub symbol: Symbol,
    /// Minimum price increment
    pub price_step: Decimal,
}

impl Instrument {
    /// Create instrument metadata.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidInstrument` if `price_step` is not positive.
    pub fn new(symbol: Symbol, price_step: Decimal) -> Result<Self, DomainError> {
        if price_step <= Decimal::ZERO {
            return Err(DomainError::InvalidInstrument(format!(
                "price step must be positive for {}, got {}",
                symbol, price_step
            )));
        }
        Ok(Self { symbol, price_step })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_observation_valid() {
        let bar = PriceObservation::new(Utc::now(), dec!(100), dec!(105), dec!(98), dec!(103));
        assert!(bar.is_ok());
        assert_eq!(bar.unwrap().close.as_decimal(), dec!(103));
    }

    #[test]
    fn test_observation_high_below_close() {
        let bar = PriceObservation::new(Utc::now(), dec!(100), dec!(101), dec!(98), dec!(103));
        assert!(matches!(bar, Err(DomainError::InvalidObservation(_))));
    }

    #[test]
    fn test_observation_low_above_open() {
        let bar = PriceObservation::new(Utc::now(), dec!(100), dec!(105), dec!(101), dec!(103));
        assert!(matches!(bar, Err(DomainError::InvalidObservation(_))));
    }

    #[test]
    fn test_observation_rejects_zero_price() {
        let bar = PriceObservation::new(Utc::now(), dec!(0), dec!(105), dec!(98), dec!(103));
        assert!(matches!(bar, Err(DomainError::InvalidPrice(_))));
    }

    #[test]
    fn test_instrument_requires_positive_step() {
        let symbol = Symbol::from_pair("BTCUSDT").unwrap();
        assert!(Instrument::new(symbol.clone(), dec!(0.01)).is_ok());
        assert!(Instrument::new(symbol, dec!(0)).is_err());
    }
}
