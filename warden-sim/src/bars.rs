//! Bar file loading.
//!
//! Reads `timestamp,open,high,low,close` CSV with RFC 3339 timestamps and
//! decimal strings. Rows are numbered from 1, header excluded.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use warden_domain::PriceObservation;

use crate::error::{SimError, SimResult};

/// One CSV row.
#[derive(Debug, Deserialize)]
struct BarRecord {
    timestamp: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::str")]
    open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    close: Decimal,
}

/// Load every bar from a CSV file.
pub fn load_bars(path: impl AsRef<Path>) -> SimResult<Vec<PriceObservation>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let bars = read_bars(file)?;

    info!(path = %path.display(), bars = bars.len(), "Loaded bars");
    Ok(bars)
}

/// Parse bars from any reader.
///
/// # Errors
/// `SimError::Csv` naming the row for unparseable fields, invalid OHLC
/// values and timestamps that do not strictly increase.
pub fn read_bars(reader: impl Read) -> SimResult<Vec<PriceObservation>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars: Vec<PriceObservation> = Vec::new();

    for (index, record) in csv.deserialize::<BarRecord>().enumerate() {
        let row = index + 1;
        let record = record.map_err(|e| SimError::Csv(format!("row {}: {}", row, e)))?;

        let bar = PriceObservation::new(
            record.timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
        )
        .map_err(|e| SimError::Csv(format!("row {}: {}", row, e)))?;

        if let Some(previous) = bars.last() {
            if bar.timestamp <= previous.timestamp {
                return Err(SimError::Csv(format!(
                    "row {}: timestamp {} not after {}",
                    row, bar.timestamp, previous.timestamp
                )));
            }
        }

        bars.push(bar);
    }

    Ok(bars)
}
