//! Warden replay binary
//!
//! # Usage
//!
//! ```bash
//! WARDEN_BARS_PATH=bars.csv WARDEN_STOP_LOSS=50 cargo run -p warden-sim
//!
//! # RSI source, trailing stop in percent, JSON logs
//! WARDEN_BARS_PATH=bars.csv WARDEN_SIGNAL=rsi WARDEN_DISTANCE_UNIT=percent \
//!     WARDEN_TRAILING=1.5 WARDEN_LOG_FORMAT=json cargo run -p warden-sim
//! ```

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use warden_exec::EventBus;
use warden_sim::{Config, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive("warden=info".parse()?);
    match config.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bars = %config.bars_path.display(),
        log_format = %config.log_format,
        "Warden replay"
    );

    let bus = EventBus::default();
    let mut receiver = bus.subscribe();
    let listener = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            match event {
                Ok(event) => info!(
                    event_type = event.event_type(),
                    timestamp = %event.timestamp(),
                    "Event"
                ),
                Err(lag) => warn!(%lag, "Event listener lagged"),
            }
        }
    });

    let report = warden_sim::run(&config, bus).await?;
    listener.await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
