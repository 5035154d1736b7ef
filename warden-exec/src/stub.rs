//! Stub implementations for testing and replay.
//!
//! These implementations simulate a market-data feed and an order venue
//! without any network access.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

use warden_domain::{Fill, OrderIntent, PriceObservation};

use crate::error::ExecError;
use crate::ports::{ObservationFeed, OrderAck, OrderSink};

// =============================================================================
// Stub Feed
// =============================================================================

/// In-memory feed replaying a fixed list of bars.
#[derive(Debug, Clone, Default)]
pub struct StubFeed {
    bars: VecDeque<PriceObservation>,
}

impl StubFeed {
    pub fn new(bars: impl IntoIterator<Item = PriceObservation>) -> Self {
        Self {
            bars: bars.into_iter().collect(),
        }
    }

    /// Bars not yet delivered
    pub fn remaining(&self) -> usize {
        self.bars.len()
    }
}

#[async_trait]
impl ObservationFeed for StubFeed {
    async fn next(&mut self) -> Result<Option<PriceObservation>, ExecError> {
        Ok(self.bars.pop_front())
    }
}

// =============================================================================
// Stub Order Sink
// =============================================================================

/// A fill waiting for its delay to elapse
#[derive(Debug, Clone)]
struct PendingFill {
    fill: Fill,
    drains_left: u32,
}

/// Stub venue.
///
/// Fills every order at the close of the bar it was decided on, charging
/// `fee_rate` on notional. With a fill delay of `n`, fills are held back
/// until the `n`-th call to `drain_fills` after submission.
pub struct StubOrderSink {
    /// Simulated fee rate (0.001 = 0.1%)
    fee_rate: Decimal,
    /// Drains before an accepted order's fills are released
    fill_delay: u32,
    /// Fills per order; volume is split evenly, the last fill takes the remainder
    fills_per_order: u32,
    /// Order counter for generating IDs
    order_counter: AtomicU64,
    /// Whether to reject the next submission
    fail_next: AtomicBool,
    /// Submissions received so far
    submissions: AtomicU64,
    /// 1-based submission to reject; 0 rejects none
    reject_nth: AtomicU64,
    /// Whether `health_check` fails
    unhealthy: AtomicBool,
    pending: Mutex<Vec<PendingFill>>,
    submitted: Mutex<Vec<OrderIntent>>,
}

impl StubOrderSink {
    /// Create a stub that fills immediately with a 0.1% fee.
    pub fn new() -> Self {
        Self {
            fee_rate: Decimal::new(1, 3),
            fill_delay: 0,
            fills_per_order: 1,
            order_counter: AtomicU64::new(0),
            fail_next: AtomicBool::new(false),
            submissions: AtomicU64::new(0),
            reject_nth: AtomicU64::new(0),
            unhealthy: AtomicBool::new(false),
            pending: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    /// Hold fills back for `observations` drains.
    pub fn with_fill_delay(mut self, observations: u32) -> Self {
        self.fill_delay = observations;
        self
    }

    /// Report each order as `count` partial fills.
    pub fn with_partial_fills(mut self, count: u32) -> Self {
        self.fills_per_order = count.max(1);
        self
    }

    /// Configure the next submission to be rejected.
    pub fn set_fail_next(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }

    /// Reject the `n`-th submission (1-based) regardless of `fail_next`.
    pub fn with_rejected_submission(self, n: u64) -> Self {
        self.reject_nth.store(n, Ordering::SeqCst);
        self
    }

    /// Make `health_check` fail until cleared.
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    /// Every intent submitted so far, including rejected ones.
    pub async fn submitted(&self) -> Vec<OrderIntent> {
        self.submitted.lock().await.clone()
    }

    /// Fills held back by the delay
    pub async fn pending_fills(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Generate a unique order ID.
    fn next_order_id(&self) -> String {
        let n = self.order_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("STUB-{}", n)
    }

    /// Check if we should fail the next operation.
    fn should_fail(&self) -> bool {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        let chosen = n == self.reject_nth.load(Ordering::SeqCst);
        self.fail_next.swap(false, Ordering::SeqCst) || chosen
    }

    fn fills_for(&self, intent: &OrderIntent, observation: &PriceObservation) -> Vec<Fill> {
        let total = intent.volume.as_decimal();
        let parts = self.fills_per_order;
        let chunk = (total / Decimal::from(parts)).round_dp(8);

        (0..parts)
            .map(|i| {
                let volume = if i + 1 == parts {
                    total - chunk * Decimal::from(parts - 1)
                } else {
                    chunk
                };
                let mut fill = Fill::for_intent(intent, observation.close, observation.timestamp);
                fill.volume = volume;
                fill.fee = observation.close.as_decimal() * volume * self.fee_rate;
                fill
            })
            .collect()
    }
}

impl Default for StubOrderSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderSink for StubOrderSink {
    async fn submit(
        &self,
        intent: &OrderIntent,
        observation: &PriceObservation,
    ) -> Result<OrderAck, ExecError> {
        self.submitted.lock().await.push(intent.clone());

        if self.should_fail() {
            return Err(ExecError::OrderRejected("Simulated venue rejection".to_string()));
        }

        let venue_order_id = self.next_order_id();
        let fills = self.fills_for(intent, observation);

        tracing::debug!(
            %venue_order_id,
            intent_id = %intent.id,
            price = %observation.close,
            delay = self.fill_delay,
            "Stub: order accepted"
        );

        if self.fill_delay == 0 {
            return Ok(OrderAck::Filled(fills));
        }

        let mut pending = self.pending.lock().await;
        pending.extend(fills.into_iter().map(|fill| PendingFill {
            fill,
            drains_left: self.fill_delay,
        }));

        Ok(OrderAck::Accepted { venue_order_id })
    }

    async fn drain_fills(&self) -> Result<Vec<Fill>, ExecError> {
        let mut pending = self.pending.lock().await;
        let mut ready = Vec::new();

        pending.retain_mut(|p| {
            p.drains_left = p.drains_left.saturating_sub(1);
            if p.drains_left == 0 {
                ready.push(p.fill.clone());
                false
            } else {
                true
            }
        });

        Ok(ready)
    }

    async fn flush(&self) -> Result<Vec<Fill>, ExecError> {
        let mut pending = self.pending.lock().await;
        Ok(pending.drain(..).map(|p| p.fill).collect())
    }

    async fn health_check(&self) -> Result<(), ExecError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(ExecError::Exchange("Simulated health check failure".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
