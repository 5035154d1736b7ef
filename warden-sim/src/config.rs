//! Simulation configuration.
//!
//! Loads configuration from environment variables (and `.env`) with
//! sensible defaults. Every invalid value is reported with its variable name.

use crate::error::{SimError, SimResult};
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use warden_domain::{DistanceUnit, ProtectionConfig, Quantity, Symbol};

// =============================================================================
// Configuration
// =============================================================================

/// Simulation configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// CSV file of bars
    pub bars_path: PathBuf,

    /// Instrument symbol
    pub symbol: Symbol,

    /// Minimum price increment
    pub price_step: Decimal,

    /// Volume opened by each entry signal
    pub volume: Quantity,

    /// Protective stop configuration
    pub protection: ProtectionConfig,

    /// Signal source selection
    pub signal: SignalConfig,

    /// Stub venue behaviour
    pub venue: VenueConfig,

    /// Log output format
    pub log_format: LogFormat,
}

/// Reference signal source to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalConfig {
    /// Moving-average crossover
    Sma { fast: usize, slow: usize },
    /// RSI threshold crossings
    Rsi {
        period: usize,
        oversold: Decimal,
        overbought: Decimal,
    },
}

/// Stub venue configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VenueConfig {
    /// Fee rate on notional (0.001 = 0.1%)
    pub fee_rate: Decimal,
    /// Observations before fills arrive
    pub fill_delay: u32,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> SimResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SimResult<Self> {
        let vars = Vars { lookup: &lookup };

        let bars_path = vars
            .get("WARDEN_BARS_PATH")
            .map(PathBuf::from)
            .ok_or_else(|| SimError::Config("WARDEN_BARS_PATH is required".to_string()))?;

        let symbol_str = vars.get("WARDEN_SYMBOL").unwrap_or_else(|| "BTCUSDT".to_string());
        let symbol = Symbol::from_pair(&symbol_str)
            .map_err(|e| SimError::Config(format!("Invalid WARDEN_SYMBOL: {}", e)))?;

        let price_step = vars.decimal("WARDEN_PRICE_STEP", Decimal::new(1, 2))?;
        if price_step <= Decimal::ZERO {
            return Err(SimError::Config(format!(
                "Invalid WARDEN_PRICE_STEP: {} (must be positive)",
                price_step
            )));
        }

        let volume = vars.decimal("WARDEN_VOLUME", Decimal::ONE)?;
        let volume = Quantity::new(volume)
            .map_err(|e| SimError::Config(format!("Invalid WARDEN_VOLUME: {}", e)))?;

        let protection = Self::load_protection(&vars)?;
        let signal = Self::load_signal(&vars)?;

        let fee_rate = vars.decimal("WARDEN_FEE_RATE", Decimal::new(1, 3))?;
        if fee_rate < Decimal::ZERO {
            return Err(SimError::Config(format!("Invalid WARDEN_FEE_RATE: {}", fee_rate)));
        }
        let venue = VenueConfig {
            fee_rate,
            fill_delay: vars.parse("WARDEN_FILL_DELAY", 0)?,
        };

        let log_format = match vars.get("WARDEN_LOG_FORMAT").as_deref().map(str::to_lowercase) {
            None => LogFormat::Pretty,
            Some(format) => match format.as_str() {
                "pretty" | "text" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                other => {
                    return Err(SimError::Config(format!(
                        "Invalid WARDEN_LOG_FORMAT: {}. Expected: pretty, json",
                        other
                    )))
                },
            },
        };

        Ok(Self {
            bars_path,
            symbol,
            price_step,
            volume,
            protection,
            signal,
            venue,
            log_format,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            bars_path: PathBuf::from("bars.csv"),
            symbol: Symbol::new("BTC".to_string(), "USDT".to_string())
                .unwrap_or_else(|_| unreachable!("non-empty literals")),
            price_step: Decimal::new(1, 2),
            volume: Quantity::new(Decimal::ONE).unwrap_or_else(|_| unreachable!("one is positive")),
            protection: ProtectionConfig {
                stop_loss: Decimal::new(5, 0),
                take_profit: Decimal::new(10, 0),
                ..ProtectionConfig::default()
            },
            signal: SignalConfig::Sma { fast: 3, slow: 5 },
            venue: VenueConfig {
                fee_rate: Decimal::ZERO,
                fill_delay: 0,
            },
            log_format: LogFormat::Pretty,
        }
    }

    fn load_protection(vars: &Vars<'_>) -> SimResult<ProtectionConfig> {
        let unit = match vars.get("WARDEN_DISTANCE_UNIT") {
            None => DistanceUnit::Absolute,
            Some(raw) => DistanceUnit::from_str(&raw).map_err(|_| {
                SimError::Config(format!(
                    "Invalid WARDEN_DISTANCE_UNIT: {}. Expected: absolute, percent, price_step",
                    raw
                ))
            })?,
        };

        let protection = ProtectionConfig {
            take_profit: vars.decimal("WARDEN_TAKE_PROFIT", Decimal::ZERO)?,
            stop_loss: vars.decimal("WARDEN_STOP_LOSS", Decimal::ZERO)?,
            trailing: vars.decimal("WARDEN_TRAILING", Decimal::ZERO)?,
            break_even_trigger: vars.decimal("WARDEN_BREAK_EVEN_TRIGGER", Decimal::ZERO)?,
            break_even_offset: vars.decimal("WARDEN_BREAK_EVEN_OFFSET", Decimal::ZERO)?,
            unit,
        };

        protection
            .validate()
            .map_err(|e| SimError::Config(e.to_string()))?;

        Ok(protection)
    }

    fn load_signal(vars: &Vars<'_>) -> SimResult<SignalConfig> {
        let kind = vars.get("WARDEN_SIGNAL").unwrap_or_else(|| "sma".to_string());

        match kind.to_lowercase().as_str() {
            "sma" => {
                let fast = vars.parse("WARDEN_SMA_FAST", 10usize)?;
                let slow = vars.parse("WARDEN_SMA_SLOW", 30usize)?;
                if fast == 0 || fast >= slow {
                    return Err(SimError::Config(format!(
                        "Invalid WARDEN_SMA_FAST/WARDEN_SMA_SLOW: {}/{} (need 0 < fast < slow)",
                        fast, slow
                    )));
                }
                Ok(SignalConfig::Sma { fast, slow })
            },
            "rsi" => {
                let period = vars.parse("WARDEN_RSI_PERIOD", 14usize)?;
                if period == 0 {
                    return Err(SimError::Config("Invalid WARDEN_RSI_PERIOD: 0".to_string()));
                }
                let oversold = vars.decimal("WARDEN_RSI_OVERSOLD", Decimal::new(30, 0))?;
                let overbought = vars.decimal("WARDEN_RSI_OVERBOUGHT", Decimal::new(70, 0))?;
                if oversold <= Decimal::ZERO || oversold >= overbought || overbought >= Decimal::ONE_HUNDRED {
                    return Err(SimError::Config(format!(
                        "Invalid WARDEN_RSI_OVERSOLD/WARDEN_RSI_OVERBOUGHT: {}/{} (need 0 < oversold < overbought < 100)",
                        oversold, overbought
                    )));
                }
                Ok(SignalConfig::Rsi {
                    period,
                    oversold,
                    overbought,
                })
            },
            other => Err(SimError::Config(format!(
                "Invalid WARDEN_SIGNAL: {}. Expected: sma, rsi",
                other
            ))),
        }
    }
}

/// Variable source with typed getters.
struct Vars<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Vars<'_> {
    /// Trimmed value; blank counts as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn decimal(&self, key: &str, default: Decimal) -> SimResult<Decimal> {
        match self.get(key) {
            Some(val) => Decimal::from_str(&val)
                .map_err(|_| SimError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> SimResult<T> {
        match self.get(key) {
            Some(val) => val
                .parse::<T>()
                .map_err(|_| SimError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
