//! Signal Source capability.
//!
//! Any indicator crossover or threshold detector plugs into the controller
//! through [`SignalSource`]. The controller never depends on indicator math.

use warden_domain::{PriceObservation, Signal};

/// Errors a signal source may report for one observation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// Not enough history yet (warm-up)
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Detector failed on this observation
    #[error("Signal source failed: {0}")]
    Failed(String),
}

/// Produces a discrete signal from each finalized bar.
///
/// Sources may keep internal indicator state; they are fed every
/// observation exactly once, in order.
pub trait SignalSource: Send {
    /// Evaluate the latest observation.
    fn evaluate(&mut self, observation: &PriceObservation) -> Result<Signal, SignalError>;

    /// Short identifier for logs
    fn name(&self) -> &str {
        "signal"
    }
}

impl<F> SignalSource for F
where
    F: FnMut(&PriceObservation) -> Result<Signal, SignalError> + Send,
{
    fn evaluate(&mut self, observation: &PriceObservation) -> Result<Signal, SignalError> {
        self(observation)
    }
}

/// Source that never signals. Useful to run protection alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignal;

impl SignalSource for NoSignal {
    fn evaluate(&mut self, _observation: &PriceObservation) -> Result<Signal, SignalError> {
        Ok(Signal::None)
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Replays a fixed list of signals, one per observation, then `None`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSignals {
    signals: Vec<Signal>,
    cursor: usize,
}

impl ScriptedSignals {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self { signals, cursor: 0 }
    }
}

impl SignalSource for ScriptedSignals {
    fn evaluate(&mut self, _observation: &PriceObservation) -> Result<Signal, SignalError> {
        let signal = self.signals.get(self.cursor).copied().unwrap_or_default();
        self.cursor += 1;
        Ok(signal)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
