//! Position & Order Controller
//!
//! The only component allowed to emit order intents. It owns the position
//! ledger and the protection state of the open position, merges protective
//! exits with the signal source, and reports every decision as domain
//! events.
//!
//! # Per observation
//!
//! 1. Evaluate protection for the open position (breach, trailing, break-even)
//! 2. Query the signal source; a failure counts as `Signal::None`
//! 3. A protective exit beats any source signal on the same bar
//! 4. Resolve the winning signal against the current position
//! 5. Emit at most one intent, unless an earlier intent still awaits its fill

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use warden_domain::{
    Event, ExitReason, Fill, IntentId, OrderIntent, OrderReason, Position, PriceObservation,
    ProtectionState, Quantity, Side, Signal,
};

use crate::ledger::PositionLedger;
use crate::protection::{ProtectiveExit, ProtectiveStopEngine};
use crate::signal::{SignalError, SignalSource};

/// Controller settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Volume opened by each entry signal
    pub volume: Quantity,
}

/// What the controller decided for one input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    /// Order to forward to the sink, if any
    pub intent: Option<OrderIntent>,
    pub events: Vec<Event>,
}

impl Decision {
    pub fn is_empty(&self) -> bool {
        self.intent.is_none() && self.events.is_empty()
    }
}

/// Intent emitted but not yet fully filled or rejected
#[derive(Debug, Clone)]
struct InFlight {
    intent: OrderIntent,
    /// Position the next fill of this intent should find
    expected: Position,
    remaining: Decimal,
}

/// Signal-driven position and protective-stop controller for one instrument.
#[derive(Debug)]
pub struct PositionController {
    config: ControllerConfig,
    engine: ProtectiveStopEngine,
    ledger: PositionLedger,
    protection: Option<ProtectionState>,
    in_flight: Option<InFlight>,
    /// Set by `stop`; later fills that leave exposure are flattened
    stopping: bool,
}

impl PositionController {
    pub fn new(config: ControllerConfig, engine: ProtectiveStopEngine) -> Self {
        Self {
            config,
            engine,
            ledger: PositionLedger::new(),
            protection: None,
            in_flight: None,
            stopping: false,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Current net position
    pub fn position(&self) -> Position {
        self.ledger.snapshot()
    }

    /// Protection of the open position; `None` while flat
    pub fn protection(&self) -> Option<&ProtectionState> {
        self.protection.as_ref()
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.ledger.realized_pnl()
    }

    pub fn fees_paid(&self) -> Decimal {
        self.ledger.fees_paid()
    }

    /// Intent awaiting its fill, if any
    pub fn in_flight_intent(&self) -> Option<&OrderIntent> {
        self.in_flight.as_ref().map(|f| &f.intent)
    }

    // =========================================================================
    // Observations
    // =========================================================================

    /// Process one finalized bar.
    pub fn on_observation(
        &mut self,
        bar: &PriceObservation,
        source: &mut dyn SignalSource,
    ) -> Decision {
        let mut events = Vec::new();

        // An earlier flatten of an unprotected position may have been rejected
        let recovery = match self.in_flight {
            None => self.ensure_protected(bar.timestamp, &mut events),
            Some(_) => None,
        };

        let protective_exit = self.evaluate_protection(bar, &mut events);
        let source_signal = poll_source(source, bar, &mut events);

        if let Some(intent) = recovery {
            if source_signal != Signal::None {
                debug!(?source_signal, "Unprotected position flatten overrides source signal");
            }
            return Decision {
                intent: Some(intent),
                events,
            };
        }

        let (signal, exit_reason) = match protective_exit {
            Some(exit) => {
                if source_signal != Signal::None && source_signal != exit.signal {
                    debug!(
                        ?source_signal,
                        reason = %exit.reason,
                        "Protective exit overrides source signal"
                    );
                }
                (exit.signal, exit.reason)
            },
            None => (source_signal, ExitReason::Signal),
        };

        let intent = match self.resolve(signal, exit_reason, bar.timestamp) {
            Some(intent) if self.in_flight.is_some() => {
                debug!(
                    side = %intent.side,
                    volume = %intent.volume,
                    reason = %intent.reason,
                    "Intent suppressed, previous intent still in flight"
                );
                None
            },
            Some(intent) => Some(self.dispatch(intent, &mut events)),
            None => None,
        };

        Decision { intent, events }
    }

    fn evaluate_protection(
        &mut self,
        bar: &PriceObservation,
        events: &mut Vec<Event>,
    ) -> Option<ProtectiveExit> {
        let state = self.protection.as_mut()?;
        let update = self.engine.evaluate(state, bar);

        if let Some(advance) = update.stop_advanced {
            debug!(
                previous = ?advance.previous.map(|p| p.as_decimal()),
                new = %advance.new,
                close = %bar.close,
                "Stop advanced"
            );
            events.push(Event::StopAdvanced {
                previous_stop: advance.previous,
                new_stop: advance.new,
                trigger_price: bar.close,
                timestamp: bar.timestamp,
            });
        }

        if update.break_even_armed {
            if let Some(stop_price) = state.stop_price {
                info!(%stop_price, entry = %state.entry_price, "Break-even armed");
                events.push(Event::BreakEvenArmed {
                    stop_price,
                    timestamp: bar.timestamp,
                });
            }
        }

        if let Some(exit) = update.exit {
            info!(
                reason = %exit.reason,
                level = %exit.level,
                trigger = %exit.trigger_price,
                "Protective level breached"
            );
            events.push(Event::ExitTriggered {
                signal: exit.signal,
                reason: exit.reason,
                trigger_price: exit.trigger_price,
                level: exit.level,
                timestamp: bar.timestamp,
            });
        }

        update.exit
    }

    /// Turn a signal into an order against the current position.
    fn resolve(
        &self,
        signal: Signal,
        exit_reason: ExitReason,
        timestamp: DateTime<Utc>,
    ) -> Option<OrderIntent> {
        let position = self.ledger.snapshot();
        let current = position.side();

        let (side, volume, reason) = match signal {
            Signal::None => return None,
            Signal::EnterLong | Signal::EnterShort => {
                let target = if signal == Signal::EnterLong { Side::Long } else { Side::Short };
                match current {
                    Some(side) if side == target => return None,
                    // Close the opposite position and open in one order
                    Some(_) => (
                        target.opening_order(),
                        self.config.volume.as_decimal() + position.volume.abs(),
                        OrderReason::Reversal,
                    ),
                    None => (target.opening_order(), self.config.volume.as_decimal(), OrderReason::Entry),
                }
            },
            Signal::ExitLong | Signal::ExitShort => {
                let target = if signal == Signal::ExitLong { Side::Long } else { Side::Short };
                match current {
                    Some(side) if side == target => {
                        (side.closing_order(), position.volume, OrderReason::Exit(exit_reason))
                    },
                    _ => return None,
                }
            },
        };

        let volume = Quantity::new(volume).ok()?;
        Some(OrderIntent::new(side, volume, reason, timestamp))
    }

    /// Record an intent as in flight and report it.
    fn dispatch(&mut self, intent: OrderIntent, events: &mut Vec<Event>) -> OrderIntent {
        info!(
            intent_id = %intent.id,
            side = %intent.side,
            volume = %intent.volume,
            reason = %intent.reason,
            "Order intent emitted"
        );

        self.in_flight = Some(InFlight {
            intent: intent.clone(),
            expected: self.ledger.snapshot(),
            remaining: intent.volume.as_decimal(),
        });
        events.push(Event::OrderIntentEmitted {
            intent: intent.clone(),
            timestamp: intent.created_at,
        });

        intent
    }

    // =========================================================================
    // Execution callbacks
    // =========================================================================

    /// Apply a fill reported by the order sink.
    ///
    /// Returns a flattening intent when the resulting position cannot be
    /// protected, or when it leaves exposure after `stop`.
    pub fn on_fill(&mut self, fill: &Fill) -> Decision {
        let mut events = Vec::new();
        let timestamp = fill.filled_at;
        let before = self.ledger.snapshot();

        let expected = match (&self.in_flight, fill.intent_id) {
            (Some(in_flight), Some(id)) if in_flight.intent.id == id => Some(in_flight.expected),
            _ => None,
        };

        if expected != Some(before) {
            warn!(
                intent_id = ?fill.intent_id,
                expected = ?expected.map(|p| p.to_string()),
                actual = %before,
                "Stale fill, applying to current position"
            );
            events.push(Event::StaleFill {
                intent_id: fill.intent_id,
                expected,
                actual: before,
                timestamp,
            });
        }

        let change = match self.ledger.apply_fill(fill) {
            Ok(change) => change,
            Err(e) => {
                warn!(intent_id = ?fill.intent_id, volume = %fill.volume, error = %e, "Fill discarded");
                events.push(Event::InvalidFill {
                    intent_id: fill.intent_id,
                    volume: fill.volume,
                    reason: e.to_string(),
                    timestamp,
                });
                return Decision { intent: None, events };
            },
        };

        let after = self.ledger.snapshot();
        info!(
            previous = %before,
            current = %after,
            realized_pnl = %change.realized_pnl(),
            "Position changed"
        );
        events.push(Event::PositionChanged {
            previous: before,
            current: after,
            realized_pnl: change.realized_pnl(),
            timestamp,
        });

        if expected.is_some() {
            let covered = match self.in_flight.as_mut() {
                Some(in_flight) => {
                    in_flight.remaining -= fill.volume;
                    in_flight.expected = after;
                    in_flight.remaining <= Decimal::ZERO
                },
                None => false,
            };
            if covered {
                self.in_flight = None;
            }
        }

        if change.closed_position() && self.protection.take().is_some() {
            debug!("Protection cleared");
            events.push(Event::ProtectionCleared { timestamp });
        }

        let mut intent = self.ensure_protected(timestamp, &mut events);

        if intent.is_none() && self.stopping && self.in_flight.is_none() {
            intent = flatten_intent(&after, ExitReason::Shutdown, timestamp).map(|flatten| {
                warn!(position = %after, "Fill after stop left exposure, flattening");
                self.dispatch(flatten, &mut events)
            });
        }

        Decision { intent, events }
    }

    /// Arm protection for an open position that has none, or flatten it.
    ///
    /// The flatten covers the whole position and replaces any intent in
    /// flight, unless a protection-failure flatten is already outstanding.
    fn ensure_protected(
        &mut self,
        timestamp: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) -> Option<OrderIntent> {
        let position = self.ledger.snapshot();
        if position.is_flat() || self.protection.is_some() {
            return None;
        }

        let error = match self.engine.arm(&position) {
            Ok(state) => {
                info!(
                    side = %state.side,
                    entry = %state.entry_price,
                    stop = ?state.stop_price.map(|p| p.as_decimal()),
                    take_profit = ?state.take_profit_price.map(|p| p.as_decimal()),
                    "Protection armed"
                );
                events.push(Event::ProtectionArmed {
                    side: state.side,
                    entry_price: state.entry_price,
                    stop_price: state.stop_price,
                    take_profit_price: state.take_profit_price,
                    timestamp,
                });
                self.protection = Some(state);
                return None;
            },
            Err(e) => e,
        };

        let flatten_pending = self.in_flight.as_ref().is_some_and(|f| {
            f.intent.reason == OrderReason::Exit(ExitReason::ProtectionFailure)
        });
        if flatten_pending {
            debug!(position = %position, "Unprotected, flatten already in flight");
            return None;
        }

        error!(position = %position, error = %error, "Cannot protect position, flattening");
        flatten_intent(&position, ExitReason::ProtectionFailure, timestamp)
            .map(|flatten| self.dispatch(flatten, events))
    }

    /// The sink declined an intent. Position and protection are unchanged.
    pub fn on_order_rejected(
        &mut self,
        intent_id: IntentId,
        reason: &str,
        timestamp: DateTime<Utc>,
    ) -> Decision {
        if self.in_flight.as_ref().map(|f| f.intent.id) == Some(intent_id) {
            self.in_flight = None;
        }

        warn!(%intent_id, %reason, position = %self.ledger.snapshot(), "Order rejected");

        Decision {
            intent: None,
            events: vec![Event::OrderRejected {
                intent_id,
                reason: reason.to_string(),
                timestamp,
            }],
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flatten the open position before the strategy stops.
    ///
    /// Fills arriving afterwards for intents still in flight are applied,
    /// and any exposure they leave is flattened with reason `Shutdown`.
    pub fn stop(&mut self, timestamp: DateTime<Utc>) -> Decision {
        let position = self.ledger.snapshot();
        let mut events = Vec::new();
        self.stopping = true;

        if let Some(in_flight) = &self.in_flight {
            warn!(
                intent_id = %in_flight.intent.id,
                remaining = %in_flight.remaining,
                "Stopping with an intent in flight"
            );
        }

        let intent = flatten_intent(&position, ExitReason::Shutdown, timestamp)
            .map(|flatten| self.dispatch(flatten, &mut events));

        if intent.is_none() {
            debug!("Stopping while flat, nothing to close");
        }

        Decision { intent, events }
    }

    /// Discard position, protection and in-flight tracking.
    pub fn reset(&mut self) {
        self.ledger.reset();
        self.protection = None;
        self.in_flight = None;
        self.stopping = false;
    }
}

/// Market order closing `position`; `None` when flat.
fn flatten_intent(
    position: &Position,
    reason: ExitReason,
    timestamp: DateTime<Utc>,
) -> Option<OrderIntent> {
    let side = position.side()?;
    let volume = Quantity::new(position.volume).ok()?;
    Some(OrderIntent::new(side.closing_order(), volume, OrderReason::Exit(reason), timestamp))
}

fn poll_source(
    source: &mut dyn SignalSource,
    bar: &PriceObservation,
    events: &mut Vec<Event>,
) -> Signal {
    match source.evaluate(bar) {
        Ok(signal) => signal,
        Err(SignalError::InsufficientData(detail)) => {
            debug!(source = source.name(), %detail, "Signal source warming up");
            Signal::None
        },
        Err(e) => {
            warn!(source = source.name(), error = %e, "Signal source failed, treating as no signal");
            events.push(Event::SignalSourceFailed {
                error: e.to_string(),
                timestamp: bar.timestamp,
            });
            Signal::None
        },
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::ScriptedSignals;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use warden_domain::{Instrument, OrderSide, PositionSign, Price, ProtectionConfig, Symbol};

    fn controller(volume: Decimal, protection: ProtectionConfig) -> PositionController {
        let instrument = Instrument::new(Symbol::from_pair("BTCUSDT").unwrap(), dec!(0.01)).unwrap();
        let engine = ProtectiveStopEngine::new(protection, &instrument).unwrap();
        PositionController::new(
            ControllerConfig {
                volume: Quantity::new(volume).unwrap(),
            },
            engine,
        )
    }

    fn bar(minute: i64, close: Decimal) -> PriceObservation {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        PriceObservation::at_price(ts, Price::new(close).unwrap())
    }

    fn fill_at(intent: &OrderIntent, price: Decimal) -> Fill {
        Fill::for_intent(intent, Price::new(price).unwrap(), intent.created_at)
    }

    #[test]
    fn test_entry_from_flat() {
        let mut ctl = controller(dec!(1), ProtectionConfig::default());
        let mut source = ScriptedSignals::new(vec![Signal::EnterLong]);

        let decision = ctl.on_observation(&bar(0, dec!(100)), &mut source);
        let intent = decision.intent.unwrap();
        assert_eq!(intent.side, OrderSide::Buy);
        assert_eq!(intent.volume.as_decimal(), dec!(1));
        assert_eq!(intent.reason, OrderReason::Entry);
        assert!(ctl.position().is_flat());
        assert_eq!(ctl.in_flight_intent().map(|i| i.id), Some(intent.id));
    }

    #[test]
    fn test_enter_same_side_is_noop() {
        let mut ctl = controller(dec!(1), ProtectionConfig::default());
        let mut source = ScriptedSignals::new(vec![Signal::EnterLong, Signal::EnterLong]);

        let intent = ctl.on_observation(&bar(0, dec!(100)), &mut source).intent.unwrap();
        ctl.on_fill(&fill_at(&intent, dec!(100)));

        let decision = ctl.on_observation(&bar(1, dec!(101)), &mut source);
        assert!(decision.intent.is_none());
    }

    #[test]
    fn test_exit_on_wrong_side_is_noop() {
        let mut ctl = controller(dec!(1), ProtectionConfig::default());
        let mut source = ScriptedSignals::new(vec![Signal::ExitShort]);
        assert!(ctl.on_observation(&bar(0, dec!(100)), &mut source).is_empty());
    }

    #[test]
    fn test_in_flight_suppresses_new_intents() {
        let mut ctl = controller(dec!(1), ProtectionConfig::default());
        let mut source = ScriptedSignals::new(vec![Signal::EnterLong, Signal::EnterShort]);

        let first = ctl.on_observation(&bar(0, dec!(100)), &mut source).intent.unwrap();
        let second = ctl.on_observation(&bar(1, dec!(99)), &mut source);
        assert!(second.intent.is_none());
        assert_eq!(ctl.in_flight_intent().map(|i| i.id), Some(first.id));
    }

    #[test]
    fn test_partial_fills_keep_intent_in_flight() {
        let mut ctl = controller(dec!(2), ProtectionConfig::default());
        let mut source = ScriptedSignals::new(vec![Signal::EnterLong]);
        let intent = ctl.on_observation(&bar(0, dec!(100)), &mut source).intent.unwrap();

        let mut part = fill_at(&intent, dec!(100));
        part.volume = dec!(1);

        let decision = ctl.on_fill(&part);
        assert!(!decision.events.iter().any(|e| matches!(e, Event::StaleFill { .. })));
        assert!(ctl.in_flight_intent().is_some());

        let decision = ctl.on_fill(&part);
        assert!(!decision.events.iter().any(|e| matches!(e, Event::StaleFill { .. })));
        assert!(ctl.in_flight_intent().is_none());
        assert_eq!(ctl.position().volume, dec!(2));
    }

    #[test]
    fn test_rejection_clears_in_flight_without_touching_position() {
        let mut ctl = controller(dec!(1), ProtectionConfig::default());
        let mut source = ScriptedSignals::new(vec![Signal::EnterLong, Signal::EnterLong]);

        let intent = ctl.on_observation(&bar(0, dec!(100)), &mut source).intent.unwrap();
        let decision = ctl.on_order_rejected(intent.id, "insufficient balance", intent.created_at);

        assert!(matches!(decision.events[0], Event::OrderRejected { .. }));
        assert!(ctl.in_flight_intent().is_none());
        assert!(ctl.position().is_flat());

        // Next observation re-evaluates from scratch
        let retry = ctl.on_observation(&bar(1, dec!(100)), &mut source);
        assert!(retry.intent.is_some());
    }

    #[test]
    fn test_fill_without_intent_is_stale_but_applied() {
        let mut ctl = controller(dec!(1), ProtectionConfig::default());
        let fill = Fill {
            intent_id: None,
            side: OrderSide::Sell,
            volume: dec!(1),
            price: Price::new(dec!(100)).unwrap(),
            fee: Decimal::ZERO,
            filled_at: Utc::now(),
        };

        let decision = ctl.on_fill(&fill);
        assert!(matches!(decision.events[0], Event::StaleFill { expected: None, .. }));
        assert_eq!(ctl.position().sign, PositionSign::Short);
    }

    #[test]
    fn test_invalid_fill_leaves_position() {
        let mut ctl = controller(dec!(1), ProtectionConfig::default());
        let mut source = ScriptedSignals::new(vec![Signal::EnterLong]);
        let intent = ctl.on_observation(&bar(0, dec!(100)), &mut source).intent.unwrap();

        let mut bad = fill_at(&intent, dec!(100));
        bad.volume = Decimal::ZERO;
        let decision = ctl.on_fill(&bad);

        assert!(decision.events.iter().any(|e| matches!(e, Event::InvalidFill { .. })));
        assert!(ctl.position().is_flat());
        assert!(ctl.in_flight_intent().is_some());
    }

    #[test]
    fn test_stop_flattens_and_reset_clears() {
        let mut ctl = controller(
            dec!(1),
            ProtectionConfig {
                stop_loss: dec!(5),
                ..ProtectionConfig::default()
            },
        );
        let mut source = ScriptedSignals::new(vec![Signal::EnterShort]);
        let intent = ctl.on_observation(&bar(0, dec!(100)), &mut source).intent.unwrap();
        ctl.on_fill(&fill_at(&intent, dec!(100)));
        assert!(ctl.protection().is_some());

        let decision = ctl.stop(Utc::now());
        let flatten = decision.intent.unwrap();
        assert_eq!(flatten.side, OrderSide::Buy);
        assert_eq!(flatten.reason, OrderReason::Exit(ExitReason::Shutdown));

        ctl.reset();
        assert!(ctl.position().is_flat());
        assert!(ctl.protection().is_none());
        assert!(ctl.in_flight_intent().is_none());
        assert_eq!(ctl.realized_pnl(), Decimal::ZERO);
    }

    #[test]
    fn test_stop_while_flat_emits_nothing() {
        let mut ctl = controller(dec!(1), ProtectionConfig::default());
        assert!(ctl.stop(Utc::now()).is_empty());
    }
}
