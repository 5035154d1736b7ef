//! Controller scenarios: bar sequences through the full decision loop.
//!
//! Each test feeds synthetic bars and fills straight into the controller,
//! fills every intent at the bar close, and checks intents, levels and
//! emitted events.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use warden_domain::{
    DistanceUnit, Event, ExitReason, Fill, Instrument, OrderIntent, OrderReason, OrderSide,
    PositionSign, Price, PriceObservation, ProtectionConfig, Quantity, Signal, Symbol,
};
use warden_engine::{
    ControllerConfig, NoSignal, PositionController, ProtectiveStopEngine, ScriptedSignals,
    SignalError,
};

// =============================================================================
// Helpers
// =============================================================================

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

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

fn ohlc(i: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> PriceObservation {
    PriceObservation::new(start() + Duration::minutes(i), open, high, low, close).unwrap()
}

fn flat_bar(i: i64, close: Decimal) -> PriceObservation {
    ohlc(i, close, close, close, close)
}

fn fill(intent: &OrderIntent, bar: &PriceObservation) -> Fill {
    Fill::for_intent(intent, bar.close, bar.timestamp)
}

/// Open a position by signal and fill it at the bar close.
fn open(ctl: &mut PositionController, signal: Signal, price: Decimal) -> OrderIntent {
    let bar = flat_bar(0, price);
    let mut source = ScriptedSignals::new(vec![signal]);
    let intent = ctl.on_observation(&bar, &mut source).intent.unwrap();
    let decision = ctl.on_fill(&fill(&intent, &bar));
    assert!(decision.intent.is_none());
    intent
}

fn stop_of(ctl: &PositionController) -> Decimal {
    ctl.protection().unwrap().stop_price.unwrap().as_decimal()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_entry_arms_stop_and_target() {
    let mut ctl = controller(
        dec!(1),
        ProtectionConfig {
            stop_loss: dec!(5),
            take_profit: dec!(10),
            ..ProtectionConfig::default()
        },
    );

    let bar = flat_bar(0, dec!(100));
    let mut source = ScriptedSignals::new(vec![Signal::EnterLong]);
    let intent = ctl.on_observation(&bar, &mut source).intent.unwrap();
    assert_eq!(intent.side, OrderSide::Buy);
    assert_eq!(intent.volume.as_decimal(), dec!(1));

    let decision = ctl.on_fill(&fill(&intent, &bar));
    assert!(decision
        .events
        .iter()
        .any(|e| matches!(e, Event::ProtectionArmed { .. })));

    let state = ctl.protection().unwrap();
    assert_eq!(state.stop_price.unwrap().as_decimal(), dec!(95));
    assert_eq!(state.take_profit_price.unwrap().as_decimal(), dec!(110));
}

#[test]
fn test_stop_loss_breach_flattens() {
    let mut ctl = controller(
        dec!(1),
        ProtectionConfig {
            stop_loss: dec!(5),
            take_profit: dec!(10),
            ..ProtectionConfig::default()
        },
    );
    open(&mut ctl, Signal::EnterLong, dec!(100));

    let bar = ohlc(1, dec!(99), dec!(99), dec!(94), dec!(96));
    let decision = ctl.on_observation(&bar, &mut NoSignal);

    let intent = decision.intent.unwrap();
    assert_eq!(intent.side, OrderSide::Sell);
    assert_eq!(intent.volume.as_decimal(), dec!(1));
    assert_eq!(intent.reason, OrderReason::Exit(ExitReason::StopLoss));
    assert!(decision.events.iter().any(|e| matches!(
        e,
        Event::ExitTriggered {
            signal: Signal::ExitLong,
            reason: ExitReason::StopLoss,
            ..
        }
    )));
}

#[test]
fn test_trailing_sequence() {
    let mut ctl = controller(
        dec!(1),
        ProtectionConfig {
            trailing: dec!(3),
            ..ProtectionConfig::default()
        },
    );
    open(&mut ctl, Signal::EnterLong, dec!(100));
    assert_eq!(stop_of(&ctl), dec!(97));

    let mut stops = Vec::new();
    for (i, close) in [dec!(105), dec!(108), dec!(103)].into_iter().enumerate() {
        let decision = ctl.on_observation(&flat_bar(i as i64 + 1, close), &mut NoSignal);
        assert!(decision.intent.is_none());
        stops.push(stop_of(&ctl));
    }

    assert_eq!(stops, vec![dec!(102), dec!(105), dec!(105)]);
}

#[test]
fn test_break_even_arms_and_holds() {
    let mut ctl = controller(
        dec!(1),
        ProtectionConfig {
            break_even_trigger: dec!(5),
            break_even_offset: dec!(1),
            ..ProtectionConfig::default()
        },
    );
    open(&mut ctl, Signal::EnterLong, dec!(100));
    assert!(ctl.protection().unwrap().stop_price.is_none());

    let decision = ctl.on_observation(&ohlc(1, dec!(101), dec!(106), dec!(101), dec!(106)), &mut NoSignal);
    assert!(decision
        .events
        .iter()
        .any(|e| matches!(e, Event::BreakEvenArmed { .. })));
    assert_eq!(stop_of(&ctl), dec!(101));
    assert!(ctl.protection().unwrap().is_break_even_armed);

    // The drop to 95 breaches the break-even stop; arming is never reverted
    let decision = ctl.on_observation(&ohlc(2, dec!(100), dec!(100), dec!(95), dec!(95)), &mut NoSignal);
    assert!(ctl.protection().unwrap().is_break_even_armed);
    assert_eq!(
        decision.intent.unwrap().reason,
        OrderReason::Exit(ExitReason::BreakEven)
    );
}

#[test]
fn test_reversal_in_one_order() {
    let mut ctl = controller(dec!(2), ProtectionConfig::default());
    open(&mut ctl, Signal::EnterShort, dec!(100));
    assert_eq!(ctl.position().sign, PositionSign::Short);
    assert_eq!(ctl.position().volume, dec!(2));

    let bar = flat_bar(1, dec!(95));
    let mut source = ScriptedSignals::new(vec![Signal::EnterLong]);
    let decision = ctl.on_observation(&bar, &mut source);

    let intent = decision.intent.unwrap();
    assert_eq!(intent.side, OrderSide::Buy);
    assert_eq!(intent.volume.as_decimal(), dec!(4));
    assert_eq!(intent.reason, OrderReason::Reversal);

    ctl.on_fill(&fill(&intent, &bar));
    let position = ctl.position();
    assert_eq!(position.sign, PositionSign::Long);
    assert_eq!(position.volume, dec!(2));
    assert_eq!(position.entry_price.unwrap().as_decimal(), dec!(95));
    assert_eq!(ctl.realized_pnl(), dec!(10));
}

// =============================================================================
// Precedence and failure handling
// =============================================================================

#[test]
fn test_stop_beats_target_on_same_bar() {
    let mut ctl = controller(
        dec!(1),
        ProtectionConfig {
            stop_loss: dec!(5),
            take_profit: dec!(10),
            ..ProtectionConfig::default()
        },
    );
    open(&mut ctl, Signal::EnterLong, dec!(100));

    let decision = ctl.on_observation(&ohlc(1, dec!(100), dec!(112), dec!(90), dec!(100)), &mut NoSignal);
    assert_eq!(
        decision.intent.unwrap().reason,
        OrderReason::Exit(ExitReason::StopLoss)
    );
}

#[test]
fn test_protective_exit_beats_fresh_entry() {
    let mut ctl = controller(
        dec!(1),
        ProtectionConfig {
            stop_loss: dec!(5),
            ..ProtectionConfig::default()
        },
    );
    open(&mut ctl, Signal::EnterLong, dec!(100));

    // Source wants a reversal short on the very bar the stop is hit
    let mut source = ScriptedSignals::new(vec![Signal::EnterShort]);
    let decision = ctl.on_observation(&ohlc(1, dec!(97), dec!(97), dec!(93), dec!(94)), &mut source);

    let intent = decision.intent.unwrap();
    assert_eq!(intent.volume.as_decimal(), dec!(1));
    assert_eq!(intent.reason, OrderReason::Exit(ExitReason::StopLoss));
}

#[test]
fn test_no_protection_after_flatten() {
    let mut ctl = controller(
        dec!(1),
        ProtectionConfig {
            take_profit: dec!(10),
            ..ProtectionConfig::default()
        },
    );
    open(&mut ctl, Signal::EnterShort, dec!(100));

    let bar = ohlc(1, dec!(95), dec!(95), dec!(89), dec!(90));
    let exit = ctl.on_observation(&bar, &mut NoSignal).intent.unwrap();
    assert_eq!(exit.reason, OrderReason::Exit(ExitReason::TakeProfit));

    let decision = ctl.on_fill(&fill(&exit, &bar));
    assert!(ctl.position().is_flat());
    assert!(ctl.protection().is_none());
    assert!(decision
        .events
        .iter()
        .any(|e| matches!(e, Event::ProtectionCleared { .. })));
    assert_eq!(ctl.realized_pnl(), dec!(10));
}

#[test]
fn test_signal_exit_uses_signal_reason() {
    let mut ctl = controller(dec!(1), ProtectionConfig::default());
    open(&mut ctl, Signal::EnterLong, dec!(100));

    let mut source = ScriptedSignals::new(vec![Signal::ExitLong]);
    let intent = ctl.on_observation(&flat_bar(1, dec!(101)), &mut source).intent.unwrap();
    assert_eq!(intent.reason, OrderReason::Exit(ExitReason::Signal));
}

#[test]
fn test_failing_source_does_not_block_protection() {
    let mut ctl = controller(
        dec!(1),
        ProtectionConfig {
            stop_loss: dec!(5),
            ..ProtectionConfig::default()
        },
    );
    open(&mut ctl, Signal::EnterLong, dec!(100));

    let mut broken = |_: &PriceObservation| -> Result<Signal, SignalError> {
        Err(SignalError::Failed("indicator overflow".to_string()))
    };
    let decision = ctl.on_observation(&ohlc(1, dec!(96), dec!(96), dec!(94), dec!(95)), &mut broken);

    assert!(decision
        .events
        .iter()
        .any(|e| matches!(e, Event::SignalSourceFailed { .. })));
    assert_eq!(
        decision.intent.unwrap().reason,
        OrderReason::Exit(ExitReason::StopLoss)
    );
}

#[test]
fn test_warmup_is_silent() {
    let mut ctl = controller(dec!(1), ProtectionConfig::default());
    let mut warming = |_: &PriceObservation| -> Result<Signal, SignalError> {
        Err(SignalError::InsufficientData("need 30 bars".to_string()))
    };
    let decision = ctl.on_observation(&flat_bar(0, dec!(100)), &mut warming);
    assert!(decision.is_empty());
}

#[test]
fn test_unprotectable_position_is_flattened() {
    // Short take-profit of 150 from entry 100 would be a negative price
    let mut ctl = controller(
        dec!(1),
        ProtectionConfig {
            take_profit: dec!(150),
            ..ProtectionConfig::default()
        },
    );

    let bar = flat_bar(0, dec!(100));
    let mut source = ScriptedSignals::new(vec![Signal::EnterShort]);
    let entry = ctl.on_observation(&bar, &mut source).intent.unwrap();
    let decision = ctl.on_fill(&fill(&entry, &bar));

    let flatten = decision.intent.unwrap();
    assert_eq!(flatten.side, OrderSide::Buy);
    assert_eq!(flatten.volume.as_decimal(), dec!(1));
    assert_eq!(flatten.reason, OrderReason::Exit(ExitReason::ProtectionFailure));
    assert!(ctl.protection().is_none());
    assert_eq!(ctl.in_flight_intent().map(|i| i.id), Some(flatten.id));
}

#[test]
fn test_partial_entry_fills_on_unprotectable_position_are_fully_flattened() {
    // Long stop-loss of 150 from entry 100 would be a negative price
    let mut ctl = controller(
        dec!(2),
        ProtectionConfig {
            stop_loss: dec!(150),
            ..ProtectionConfig::default()
        },
    );

    let bar = flat_bar(0, dec!(100));
    let mut source = ScriptedSignals::new(vec![Signal::EnterLong]);
    let entry = ctl.on_observation(&bar, &mut source).intent.unwrap();
    let mut part = fill(&entry, &bar);
    part.volume = dec!(1);

    let first_flatten = ctl.on_fill(&part).intent.unwrap();
    assert_eq!(first_flatten.side, OrderSide::Sell);
    assert_eq!(first_flatten.volume.as_decimal(), dec!(1));
    assert_eq!(first_flatten.reason, OrderReason::Exit(ExitReason::ProtectionFailure));

    // Rest of the entry arrives while the first flatten is pending
    assert!(ctl.on_fill(&part).intent.is_none());
    assert_eq!(ctl.position().volume, dec!(2));

    // The residual is flattened once the first flatten fills
    let second_flatten = ctl.on_fill(&fill(&first_flatten, &bar)).intent.unwrap();
    assert_eq!(second_flatten.side, OrderSide::Sell);
    assert_eq!(second_flatten.volume.as_decimal(), dec!(1));
    assert_eq!(second_flatten.reason, OrderReason::Exit(ExitReason::ProtectionFailure));

    assert!(ctl.on_fill(&fill(&second_flatten, &bar)).intent.is_none());
    assert!(ctl.position().is_flat());
    assert!(ctl.protection().is_none());
    assert!(ctl.in_flight_intent().is_none());
}

#[test]
fn test_rejected_protection_flatten_is_retried_next_bar() {
    let mut ctl = controller(
        dec!(1),
        ProtectionConfig {
            stop_loss: dec!(150),
            ..ProtectionConfig::default()
        },
    );

    let bar = flat_bar(0, dec!(100));
    let mut source = ScriptedSignals::new(vec![Signal::EnterLong]);
    let entry = ctl.on_observation(&bar, &mut source).intent.unwrap();
    let flatten = ctl.on_fill(&fill(&entry, &bar)).intent.unwrap();
    ctl.on_order_rejected(flatten.id, "halted", bar.timestamp);
    assert!(ctl.in_flight_intent().is_none());

    let retry = ctl.on_observation(&flat_bar(1, dec!(100)), &mut NoSignal).intent.unwrap();
    assert_eq!(retry.side, OrderSide::Sell);
    assert_eq!(retry.volume.as_decimal(), dec!(1));
    assert_eq!(retry.reason, OrderReason::Exit(ExitReason::ProtectionFailure));

    // Rejected again: the next bar keeps trying, whatever the source says
    ctl.on_order_rejected(retry.id, "halted", bar.timestamp);
    let mut source = ScriptedSignals::new(vec![Signal::EnterLong]);
    let again = ctl.on_observation(&flat_bar(2, dec!(40)), &mut source).intent.unwrap();
    assert_eq!(again.reason, OrderReason::Exit(ExitReason::ProtectionFailure));

    ctl.on_fill(&fill(&again, &flat_bar(2, dec!(40))));
    assert!(ctl.position().is_flat());
}

#[test]
fn test_percent_protection() {
    let mut ctl = controller(
        dec!(1),
        ProtectionConfig {
            stop_loss: dec!(2),
            take_profit: dec!(4),
            unit: DistanceUnit::Percent,
            ..ProtectionConfig::default()
        },
    );
    open(&mut ctl, Signal::EnterLong, dec!(250));

    let state = ctl.protection().unwrap();
    assert_eq!(state.stop_price.unwrap().as_decimal(), dec!(245));
    assert_eq!(state.take_profit_price.unwrap().as_decimal(), dec!(260));
}

#[test]
fn test_late_fill_after_stop_is_stale() {
    let mut ctl = controller(dec!(1), ProtectionConfig::default());

    let bar = flat_bar(0, dec!(100));
    let mut source = ScriptedSignals::new(vec![Signal::EnterLong]);
    let entry = ctl.on_observation(&bar, &mut source).intent.unwrap();

    // Shutdown while the entry is still unfilled
    assert!(ctl.stop(bar.timestamp).is_empty());
    ctl.reset();

    let decision = ctl.on_fill(&fill(&entry, &bar));
    assert!(decision
        .events
        .iter()
        .any(|e| matches!(e, Event::StaleFill { .. })));
    assert_eq!(ctl.position().sign, PositionSign::Long);
}

#[test]
fn test_entry_filled_after_stop_is_flattened() {
    let mut ctl = controller(dec!(1), ProtectionConfig::default());

    let bar = flat_bar(0, dec!(100));
    let mut source = ScriptedSignals::new(vec![Signal::EnterLong]);
    let entry = ctl.on_observation(&bar, &mut source).intent.unwrap();

    // Nothing to flatten yet: the entry is still unfilled
    assert!(ctl.stop(bar.timestamp).is_empty());

    let flatten = ctl.on_fill(&fill(&entry, &bar)).intent.unwrap();
    assert_eq!(flatten.side, OrderSide::Sell);
    assert_eq!(flatten.volume.as_decimal(), dec!(1));
    assert_eq!(flatten.reason, OrderReason::Exit(ExitReason::Shutdown));

    assert!(ctl.on_fill(&fill(&flatten, &bar)).intent.is_none());
    assert!(ctl.position().is_flat());
}

#[test]
fn test_fees_tracked_separately() {
    let mut ctl = controller(dec!(1), ProtectionConfig::default());
    let bar = flat_bar(0, dec!(100));
    let mut source = ScriptedSignals::new(vec![Signal::EnterLong]);
    let entry = ctl.on_observation(&bar, &mut source).intent.unwrap();

    let mut filled = fill(&entry, &bar);
    filled.fee = dec!(0.1);
    ctl.on_fill(&filled);

    assert_eq!(ctl.fees_paid(), dec!(0.1));
    assert_eq!(ctl.realized_pnl(), Decimal::ZERO);
    assert_eq!(
        ctl.position().unrealized_pnl(Price::new(dec!(103)).unwrap()),
        dec!(3)
    );
}
