//! Protection configuration and per-position protection state.
//!
//! Distances are configured once per strategy in one of three units and
//! resolved to absolute price units against the entry price when a
//! position opens. From then on the state only deals in prices.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::value_objects::{DomainError, Price, Side};

// =============================================================================
// DistanceUnit
// =============================================================================

/// Unit in which protection distances are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    /// Quote-currency price units
    #[default]
    Absolute,
    /// Percent of the entry price (1 = 1%)
    Percent,
    /// Multiples of the instrument's minimum price increment
    PriceStep,
}

impl DistanceUnit {
    /// Convert `distance` to absolute price units.
    pub fn resolve(&self, distance: Decimal, entry: Price, price_step: Decimal) -> Decimal {
        match self {
            DistanceUnit::Absolute => distance,
            DistanceUnit::Percent => entry.as_decimal() * distance / Decimal::ONE_HUNDRED,
            DistanceUnit::PriceStep => distance * price_step,
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "absolute" | "abs" => Ok(DistanceUnit::Absolute),
            "percent" | "pct" | "%" => Ok(DistanceUnit::Percent),
            "price_step" | "pricestep" | "step" | "steps" => Ok(DistanceUnit::PriceStep),
            other => Err(DomainError::InvalidProtectionConfig(format!(
                "unknown distance unit '{}', expected absolute, percent or price_step",
                other
            ))),
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceUnit::Absolute => f.write_str("absolute"),
            DistanceUnit::Percent => f.write_str("percent"),
            DistanceUnit::PriceStep => f.write_str("price_step"),
        }
    }
}

// =============================================================================
// ProtectionConfig
// =============================================================================

/// Protective order parameters, fixed for the life of a strategy.
///
/// A distance of zero disables that leg.
///
/// # Example
///
/// ```
/// # use warden_domain::protection::{ProtectionConfig, DistanceUnit};
/// # use rust_decimal_macros::dec;
/// let config = ProtectionConfig {
///     stop_loss: dec!(5),
///     take_profit: dec!(10),
///     ..ProtectionConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// assert!(!config.has_trailing());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProtectionConfig {
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    pub trailing: Decimal,
    /// Favorable excursion that arms break-even
    pub break_even_trigger: Decimal,
    /// Where the stop goes relative to entry once break-even arms
    pub break_even_offset: Decimal,
    pub unit: DistanceUnit,
}

impl ProtectionConfig {
    /// Check every distance is non-negative.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidProtectionConfig` naming the first negative field.
    pub fn validate(&self) -> Result<(), DomainError> {
        let fields = [
            ("take_profit", self.take_profit),
            ("stop_loss", self.stop_loss),
            ("trailing", self.trailing),
            ("break_even_trigger", self.break_even_trigger),
            ("break_even_offset", self.break_even_offset),
        ];

        for (name, value) in fields {
            if value < Decimal::ZERO {
                return Err(DomainError::InvalidProtectionConfig(format!(
                    "{} must not be negative, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    pub fn has_trailing(&self) -> bool {
        self.trailing > Decimal::ZERO
    }

    pub fn has_break_even(&self) -> bool {
        self.break_even_trigger > Decimal::ZERO
    }

    /// Resolve all distances to absolute price units for a position entered at `entry`.
    pub fn resolve(&self, entry: Price, price_step: Decimal) -> ResolvedDistances {
        let unit = self.unit;
        ResolvedDistances {
            take_profit: unit.resolve(self.take_profit, entry, price_step),
            stop_loss: unit.resolve(self.stop_loss, entry, price_step),
            trailing: unit.resolve(self.trailing, entry, price_step),
            break_even_trigger: unit.resolve(self.break_even_trigger, entry, price_step),
            break_even_offset: unit.resolve(self.break_even_offset, entry, price_step),
        }
    }
}

/// Protection distances in absolute price units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResolvedDistances {
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    pub trailing: Decimal,
    pub break_even_trigger: Decimal,
    pub break_even_offset: Decimal,
}

// =============================================================================
// ProtectionState
// =============================================================================

/// Live protective levels for one open position.
///
/// Created when the position opens, discarded when it returns to flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionState {
    pub side: Side,
    pub entry_price: Price,
    /// `None` when neither stop-loss, trailing nor break-even has placed a stop
    pub stop_price: Option<Price>,
    pub take_profit_price: Option<Price>,
    /// One-way: never reset while the position lives
    pub is_break_even_armed: bool,
    pub distances: ResolvedDistances,
}

// =============================================================================
// Tests
// =============================================================================
