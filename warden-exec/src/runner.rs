//! Strategy runner: drives feed → controller → sink, one bar at a time.
//!
//! # Flow (per observation)
//!
//! ```text
//! drain fills ─► controller.on_fill ─┐
//!                                    ├─► journal ─► sink.submit ─► fills / rejection
//! bar ─► controller.on_observation ──┘
//! ```
//!
//! Every decision's events are published on the event bus. A bar is fully
//! processed, including the fills and rejections its intent produces,
//! before the next bar is pulled from the feed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{info, warn};

use warden_domain::{Event, Fill, OrderIntent, OrderReason, Position, PriceObservation};
use warden_engine::{Decision, PositionController, SignalSource};

use crate::error::{ExecError, ExecResult};
use crate::event_bus::EventBus;
use crate::intent::IntentJournal;
use crate::ports::{ObservationFeed, OrderAck, OrderSink};

// =============================================================================
// Run Report
// =============================================================================

/// Summary of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub observations: u64,
    pub intents_submitted: u64,
    pub rejections: u64,
    pub fills: u64,
    pub stale_fills: u64,
    pub invalid_fills: u64,
    /// Exit intents by reason (`stop_loss`, `take_profit`, ...)
    pub exits: BTreeMap<String, u64>,
    /// Gross realized P&L
    pub realized_pnl: Decimal,
    pub fees_paid: Decimal,
    /// Realized P&L net of fees
    pub net_pnl: Decimal,
    /// Position just before the final reset; flat unless the flatten failed
    pub final_position: Position,
}

// =============================================================================
// Strategy Runner
// =============================================================================

/// Replays a feed through the controller against an order sink.
pub struct StrategyRunner<F: ObservationFeed, S: OrderSink> {
    feed: F,
    sink: Arc<S>,
    controller: PositionController,
    source: Box<dyn SignalSource>,
    journal: Arc<IntentJournal>,
    bus: EventBus,
    report: RunReport,
}

impl<F: ObservationFeed, S: OrderSink> StrategyRunner<F, S> {
    pub fn new(
        feed: F,
        sink: Arc<S>,
        controller: PositionController,
        source: Box<dyn SignalSource>,
    ) -> Self {
        Self {
            feed,
            sink,
            controller,
            source,
            journal: Arc::new(IntentJournal::new()),
            bus: EventBus::default(),
            report: RunReport::default(),
        }
    }

    /// Publish events on an existing bus.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    /// Share a journal with the caller.
    pub fn with_journal(mut self, journal: Arc<IntentJournal>) -> Self {
        self.journal = journal;
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn journal(&self) -> Arc<IntentJournal> {
        Arc::clone(&self.journal)
    }

    /// Run until the feed is exhausted, then flatten and reset.
    ///
    /// # Errors
    /// Feed failures, an unreachable venue at startup, and journal
    /// failures abort the run. Order rejections do not.
    pub async fn run(mut self) -> ExecResult<RunReport> {
        self.sink.health_check().await?;
        info!(source = self.source.name(), "Run started");

        let mut last_bar = None;
        while let Some(bar) = self.feed.next().await? {
            self.report.observations += 1;

            for fill in self.sink.drain_fills().await? {
                let decision = self.on_fill(&fill);
                self.process(decision, &bar).await?;
            }

            let decision = self.controller.on_observation(&bar, self.source.as_mut());
            self.process(decision, &bar).await?;

            last_bar = Some(bar);
        }

        if let Some(bar) = last_bar {
            self.shutdown(&bar).await?;
        }

        self.finish()
    }

    /// Settle outstanding orders, flatten, settle again, reset.
    async fn shutdown(&mut self, bar: &PriceObservation) -> ExecResult<()> {
        self.settle(bar).await?;

        let decision = self.controller.stop(bar.timestamp);
        self.process(decision, bar).await?;

        self.settle(bar).await?;
        Ok(())
    }

    async fn settle(&mut self, bar: &PriceObservation) -> ExecResult<()> {
        // A settled fill may itself trigger a protection-failure flatten
        loop {
            let fills = self.sink.flush().await?;
            if fills.is_empty() {
                return Ok(());
            }
            for fill in fills {
                let decision = self.on_fill(&fill);
                self.process(decision, bar).await?;
            }
        }
    }

    fn finish(mut self) -> ExecResult<RunReport> {
        let mut report = std::mem::take(&mut self.report);
        report.realized_pnl = self.controller.realized_pnl();
        report.fees_paid = self.controller.fees_paid();
        report.net_pnl = report.realized_pnl - report.fees_paid;
        report.final_position = self.controller.position();

        if !report.final_position.is_flat() {
            warn!(position = %report.final_position, "Run ended with an open position");
        }
        self.controller.reset();

        info!(
            observations = report.observations,
            intents = report.intents_submitted,
            fills = report.fills,
            realized_pnl = %report.realized_pnl,
            net_pnl = %report.net_pnl,
            "Run complete"
        );
        Ok(report)
    }

    /// Publish a decision's events and submit its intent, following every
    /// fill or rejection it produces.
    async fn process(&mut self, first: Decision, bar: &PriceObservation) -> ExecResult<()> {
        let mut queue = VecDeque::from([first]);

        while let Some(decision) = queue.pop_front() {
            self.publish(decision.events);
            if let Some(intent) = decision.intent {
                let follow_ups = self.submit(&intent, bar).await?;
                queue.extend(follow_ups);
            }
        }

        Ok(())
    }

    async fn submit(
        &mut self,
        intent: &OrderIntent,
        bar: &PriceObservation,
    ) -> ExecResult<Vec<Decision>> {
        self.journal.record(intent)?;
        self.report.intents_submitted += 1;

        match self.sink.submit(intent, bar).await {
            Ok(OrderAck::Filled(fills)) => {
                self.journal.mark_submitted(intent.id, None)?;
                self.count_exit(intent);
                Ok(fills.iter().map(|fill| self.on_fill(fill)).collect())
            },
            Ok(OrderAck::Accepted { venue_order_id }) => {
                self.journal.mark_submitted(intent.id, Some(venue_order_id))?;
                self.count_exit(intent);
                Ok(Vec::new())
            },
            Err(e @ (ExecError::OrderRejected(_) | ExecError::Exchange(_))) => {
                let reason = e.to_string();
                self.journal.mark_rejected(intent.id, &reason, bar.timestamp)?;
                self.report.rejections += 1;
                Ok(vec![self.controller.on_order_rejected(intent.id, &reason, bar.timestamp)])
            },
            Err(e) => Err(e),
        }
    }

    /// Exits are counted once the venue accepts them.
    fn count_exit(&mut self, intent: &OrderIntent) {
        if let OrderReason::Exit(reason) = intent.reason {
            *self.report.exits.entry(reason.to_string()).or_default() += 1;
        }
    }

    fn on_fill(&mut self, fill: &Fill) -> Decision {
        self.report.fills += 1;
        if let Err(e) = self.journal.record_fill(fill) {
            warn!(intent_id = ?fill.intent_id, error = %e, "Fill does not match journal");
        }
        self.controller.on_fill(fill)
    }

    fn publish(&mut self, events: Vec<Event>) {
        for event in events {
            match event {
                Event::StaleFill { .. } => self.report.stale_fills += 1,
                Event::InvalidFill { .. } => self.report.invalid_fills += 1,
                _ => {},
            }
            self.bus.publish(event);
        }
    }
}
