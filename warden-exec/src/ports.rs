//! Execution layer port definitions.
//!
//! Ports define the interfaces for the market-data feed and the order
//! venue. Adapters implement them for specific venues (stub, replay, live).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use warden_domain::{Fill, OrderIntent, PriceObservation};

use crate::error::ExecError;

// =============================================================================
// Observation Feed Port
// =============================================================================

/// Port delivering finalized bars for one instrument.
///
/// Implementations must yield bars in non-decreasing timestamp order; the
/// runner does not reorder or deduplicate.
#[async_trait]
pub trait ObservationFeed: Send {
    /// Next finalized bar, or `None` when the feed is exhausted.
    async fn next(&mut self) -> Result<Option<PriceObservation>, ExecError>;
}

// =============================================================================
// Order Sink Port
// =============================================================================

/// Port for submitting market orders.
///
/// Implementations:
/// - `StubOrderSink` - fills at the bar close, optionally delayed
#[async_trait]
pub trait OrderSink: Send + Sync {
    /// Submit a market order for `intent`.
    ///
    /// `observation` is the bar on which the intent was decided; venues
    /// without their own price source may use it as a reference price.
    ///
    /// # Errors
    ///
    /// `ExecError::OrderRejected` when the venue declines the order,
    /// `ExecError::Exchange` when it cannot be reached.
    async fn submit(
        &self,
        intent: &OrderIntent,
        observation: &PriceObservation,
    ) -> Result<OrderAck, ExecError>;

    /// Fills that arrived since the last call, in arrival order.
    async fn drain_fills(&self) -> Result<Vec<Fill>, ExecError>;

    /// Wait for every outstanding order to settle and return its fills.
    ///
    /// Called at shutdown so no fill is left behind. Defaults to
    /// [`OrderSink::drain_fills`].
    async fn flush(&self) -> Result<Vec<Fill>, ExecError> {
        self.drain_fills().await
    }

    /// Check if the venue is reachable.
    async fn health_check(&self) -> Result<(), ExecError>;
}

/// Venue acknowledgement for a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderAck {
    /// Executed synchronously
    Filled(Vec<Fill>),
    /// Accepted; fills arrive later through `drain_fills`
    Accepted { venue_order_id: String },
}
