//! Warden Simulation Host
//!
//! Replays a CSV of bars through the position controller against the stub
//! venue, driven by a reference signal source.
//!
//! # Environment Variables
//!
//! - `WARDEN_BARS_PATH`: CSV of `timestamp,open,high,low,close` (required)
//! - `WARDEN_SIGNAL`: `sma` or `rsi` (default: sma)
//! - `WARDEN_STOP_LOSS`, `WARDEN_TAKE_PROFIT`, `WARDEN_TRAILING`: protection distances
//! - `WARDEN_DISTANCE_UNIT`: absolute, percent or price_step (default: absolute)
//! - `WARDEN_FILL_DELAY`: observations before stub fills arrive (default: 0)
//!
//! See [`Config`] for the full list.

#![warn(clippy::all)]

pub mod bars;
pub mod config;
pub mod error;
pub mod signals;

use std::sync::Arc;

use tracing::info;

use warden_domain::{Instrument, PriceObservation};
use warden_engine::{ControllerConfig, PositionController, ProtectiveStopEngine};
use warden_exec::{EventBus, RunReport, StrategyRunner, StubFeed, StubOrderSink};

pub use bars::{load_bars, read_bars};
pub use config::{Config, LogFormat, SignalConfig, VenueConfig};
pub use error::{SimError, SimResult};
pub use signals::{RsiThreshold, SmaCrossover};

/// Wire a runner for `bars` from configuration.
pub fn build_runner(
    config: &Config,
    bars: Vec<PriceObservation>,
) -> SimResult<StrategyRunner<StubFeed, StubOrderSink>> {
    let instrument = Instrument::new(config.symbol.clone(), config.price_step)?;
    let engine = ProtectiveStopEngine::new(config.protection, &instrument)?;
    let controller = PositionController::new(
        ControllerConfig {
            volume: config.volume,
        },
        engine,
    );

    let sink = Arc::new(
        StubOrderSink::new()
            .with_fee_rate(config.venue.fee_rate)
            .with_fill_delay(config.venue.fill_delay),
    );

    Ok(StrategyRunner::new(
        StubFeed::new(bars),
        sink,
        controller,
        signals::from_config(&config.signal),
    ))
}

/// Load the configured bar file and replay it, publishing events on `bus`.
pub async fn run(config: &Config, bus: EventBus) -> SimResult<RunReport> {
    let bars = load_bars(&config.bars_path)?;

    info!(
        symbol = %config.symbol,
        bars = bars.len(),
        signal = ?config.signal,
        unit = %config.protection.unit,
        "Starting replay"
    );

    let report = build_runner(config, bars)?.with_event_bus(bus).run().await?;
    Ok(report)
}
