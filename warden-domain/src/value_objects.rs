//! Validated primitives shared by every Warden crate.
//!
//! Constructors reject values that would break an invariant, so code
//! holding a `Price` or `Quantity` never re-checks the sign.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rejected domain value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Bar prices are inconsistent (e.g. high below close)
    #[error("Invalid observation: {0}")]
    InvalidObservation(String),

    /// Protection distances or units are malformed
    #[error("Invalid protection config: {0}")]
    InvalidProtectionConfig(String),

    /// Position fields violate the flat/open invariant
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    /// Instrument metadata is unusable
    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),
}

/// `Ok(value)` when strictly positive, otherwise the error built by `reject`.
fn strictly_positive(
    value: Decimal,
    what: &str,
    reject: fn(String) -> DomainError,
) -> Result<Decimal, DomainError> {
    if value > Decimal::ZERO {
        Ok(value)
    } else {
        Err(reject(format!("{} must be positive, got {}", what, value)))
    }
}

// =============================================================================
// Price
// =============================================================================

/// Quote-currency price, always > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    /// # Errors
    /// `DomainError::InvalidPrice` for zero or negative values.
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        strictly_positive(value, "price", DomainError::InvalidPrice).map(Self)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// Order or position volume, always > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(Decimal);

impl Quantity {
    /// # Errors
    /// `DomainError::InvalidQuantity` for zero or negative values.
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        strictly_positive(value, "quantity", DomainError::InvalidQuantity).map(Self)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// =============================================================================
// Symbol
// =============================================================================

/// Quote assets recognised when splitting a concatenated pair, longest first
/// where one is a suffix of another (`USDT` before `USD`).
const KNOWN_QUOTES: &[&str] = &["USDT", "USDC", "BUSD", "USD", "EUR", "BTC", "ETH"];

/// Instrument identifier as a base/quote pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    base: String,
    quote: String,
}

impl Symbol {
    /// Split a venue pair such as `BTCUSDT` on a known quote asset.
    ///
    /// ```
    /// # use warden_domain::value_objects::Symbol;
    /// let symbol = Symbol::from_pair("SOLUSDC").unwrap();
    /// assert_eq!((symbol.base(), symbol.quote()), ("SOL", "USDC"));
    /// ```
    ///
    /// # Errors
    /// `DomainError::InvalidSymbol` when no known quote leaves a non-empty base.
    pub fn from_pair(pair: &str) -> Result<Self, DomainError> {
        KNOWN_QUOTES
            .iter()
            .find_map(|quote| {
                pair.strip_suffix(quote)
                    .filter(|base| !base.is_empty())
                    .map(|base| Self {
                        base: base.to_string(),
                        quote: quote.to_string(),
                    })
            })
            .ok_or_else(|| DomainError::InvalidSymbol(format!("no known quote asset in '{}'", pair)))
    }

    pub fn new(base: String, quote: String) -> Result<Self, DomainError> {
        if base.is_empty() || quote.is_empty() {
            return Err(DomainError::InvalidSymbol(format!(
                "empty base or quote in '{}/{}'",
                base, quote
            )));
        }
        Ok(Self { base, quote })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Concatenated venue form, e.g. `BTCUSDT`
    pub fn as_pair(&self) -> String {
        [self.base.as_str(), self.quote.as_str()].concat()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}

// =============================================================================
// Side / OrderSide
// =============================================================================

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Order that opens or grows this side
    pub fn opening_order(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// Order that reduces or closes this side
    pub fn closing_order(&self) -> OrderSide {
        self.opposite().opening_order()
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// Price move in this side's favour: `to - from` for longs, `from - to` for shorts
    pub fn favorable_move(&self, from: Decimal, to: Decimal) -> Decimal {
        match self {
            Side::Long => to - from,
            Side::Short => from - to,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Long => "long",
            Side::Short => "short",
        })
    }
}

/// Direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The position side a fill of this order grows
    pub fn opens(&self) -> Side {
        match self {
            OrderSide::Buy => Side::Long,
            OrderSide::Sell => Side::Short,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        })
    }
}

// =============================================================================
// PositionSign
// =============================================================================

/// Net direction of the account's position in one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSign {
    Flat,
    Long,
    Short,
}

impl PositionSign {
    /// The open side, if any
    pub fn side(&self) -> Option<Side> {
        match self {
            PositionSign::Flat => None,
            PositionSign::Long => Some(Side::Long),
            PositionSign::Short => Some(Side::Short),
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, PositionSign::Flat)
    }
}

impl From<Side> for PositionSign {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => PositionSign::Long,
            Side::Short => PositionSign::Short,
        }
    }
}

impl fmt::Display for PositionSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side() {
            Some(side) => fmt::Display::fmt(&side, f),
            None => f.write_str("flat"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
