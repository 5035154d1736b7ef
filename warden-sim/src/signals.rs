//! Reference signal sources.
//!
//! Concrete detectors plugged into the controller through
//! [`SignalSource`]. All math is done in `Decimal`.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use warden_domain::{PriceObservation, Signal};
use warden_engine::{SignalError, SignalSource};

use crate::config::SignalConfig;

/// Build the source selected by configuration.
pub fn from_config(config: &SignalConfig) -> Box<dyn SignalSource> {
    match *config {
        SignalConfig::Sma { fast, slow } => Box::new(SmaCrossover::new(fast, slow)),
        SignalConfig::Rsi {
            period,
            oversold,
            overbought,
        } => Box::new(RsiThreshold::new(period, oversold, overbought)),
    }
}

// =============================================================================
// SMA Crossover
// =============================================================================

/// Fast/slow simple moving average crossover on closes.
///
/// Fast crossing above slow gives `EnterLong`, crossing below gives
/// `EnterShort`. Needs `slow + 1` closes before the first signal.
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    fast: usize,
    slow: usize,
    closes: VecDeque<Decimal>,
    /// Previous (fast, slow) averages
    previous: Option<(Decimal, Decimal)>,
}

impl SmaCrossover {
    pub fn new(fast: usize, slow: usize) -> Self {
        Self {
            fast,
            slow,
            closes: VecDeque::with_capacity(slow + 1),
            previous: None,
        }
    }

    fn average(&self, period: usize) -> Decimal {
        let sum: Decimal = self.closes.iter().rev().take(period).sum();
        sum / Decimal::from(period as u64)
    }
}

impl SignalSource for SmaCrossover {
    fn evaluate(&mut self, observation: &PriceObservation) -> Result<Signal, SignalError> {
        if self.fast == 0 || self.fast >= self.slow {
            return Err(SignalError::Failed(format!(
                "invalid periods fast={} slow={}",
                self.fast, self.slow
            )));
        }

        self.closes.push_back(observation.close.as_decimal());
        if self.closes.len() > self.slow {
            self.closes.pop_front();
        }

        if self.closes.len() < self.slow {
            return Err(SignalError::InsufficientData(format!(
                "{} of {} closes",
                self.closes.len(),
                self.slow
            )));
        }

        let current = (self.average(self.fast), self.average(self.slow));
        let Some((fast_prev, slow_prev)) = self.previous.replace(current) else {
            return Err(SignalError::InsufficientData(
                "waiting for a second average".to_string(),
            ));
        };
        let (fast_now, slow_now) = current;

        let signal = if fast_prev <= slow_prev && fast_now > slow_now {
            Signal::EnterLong
        } else if fast_prev >= slow_prev && fast_now < slow_now {
            Signal::EnterShort
        } else {
            Signal::None
        };

        Ok(signal)
    }

    fn name(&self) -> &str {
        "sma_crossover"
    }
}

// =============================================================================
// RSI Threshold
// =============================================================================

/// Wilder RSI threshold crossings.
///
/// The averages are seeded with the simple mean of the first `period`
/// changes and smoothed with `(prev * (period - 1) + x) / period` after.
/// RSI crossing up through `oversold` gives `EnterLong`, crossing down
/// through `overbought` gives `EnterShort`.
#[derive(Debug, Clone)]
pub struct RsiThreshold {
    period: usize,
    oversold: Decimal,
    overbought: Decimal,
    prev_close: Option<Decimal>,
    /// Changes seen while seeding
    seeded: usize,
    avg_gain: Decimal,
    avg_loss: Decimal,
    prev_rsi: Option<Decimal>,
}

impl RsiThreshold {
    pub fn new(period: usize, oversold: Decimal, overbought: Decimal) -> Self {
        Self {
            period,
            oversold,
            overbought,
            prev_close: None,
            seeded: 0,
            avg_gain: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            prev_rsi: None,
        }
    }

    /// Current RSI, once seeded.
    pub fn value(&self) -> Option<Decimal> {
        (self.seeded >= self.period).then(|| self.rsi())
    }

    fn rsi(&self) -> Decimal {
        if self.avg_gain.is_zero() && self.avg_loss.is_zero() {
            return Decimal::new(50, 0);
        }
        if self.avg_loss.is_zero() {
            return Decimal::ONE_HUNDRED;
        }
        if self.avg_gain.is_zero() {
            return Decimal::ZERO;
        }

        let rs = self.avg_gain / self.avg_loss;
        Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED / (Decimal::ONE + rs)
    }

    fn push_change(&mut self, change: Decimal) {
        let gain = change.max(Decimal::ZERO);
        let loss = (-change).max(Decimal::ZERO);
        let period = Decimal::from(self.period as u64);

        if self.seeded < self.period {
            self.avg_gain += gain;
            self.avg_loss += loss;
            self.seeded += 1;
            if self.seeded == self.period {
                self.avg_gain /= period;
                self.avg_loss /= period;
            }
        } else {
            let keep = period - Decimal::ONE;
            self.avg_gain = (self.avg_gain * keep + gain) / period;
            self.avg_loss = (self.avg_loss * keep + loss) / period;
        }
    }
}

impl SignalSource for RsiThreshold {
    fn evaluate(&mut self, observation: &PriceObservation) -> Result<Signal, SignalError> {
        if self.period == 0 {
            return Err(SignalError::Failed("RSI period must be positive".to_string()));
        }

        let close = observation.close.as_decimal();
        let Some(prev_close) = self.prev_close.replace(close) else {
            return Err(SignalError::InsufficientData("first close".to_string()));
        };
        self.push_change(close - prev_close);

        let Some(rsi) = self.value() else {
            return Err(SignalError::InsufficientData(format!(
                "{} of {} changes",
                self.seeded, self.period
            )));
        };

        let Some(prev_rsi) = self.prev_rsi.replace(rsi) else {
            return Err(SignalError::InsufficientData(
                "waiting for a second RSI value".to_string(),
            ));
        };

        let signal = if prev_rsi < self.oversold && rsi >= self.oversold {
            Signal::EnterLong
        } else if prev_rsi > self.overbought && rsi <= self.overbought {
            Signal::EnterShort
        } else {
            Signal::None
        };

        tracing::trace!(%rsi, %prev_rsi, ?signal, "RSI evaluated");
        Ok(signal)
    }

    fn name(&self) -> &str {
        "rsi_threshold"
    }
}

// =============================================================================
// Tests
// =============================================================================
