//! Intent journal: audit trail of every order intent handed to the venue.
//!
//! # Flow
//!
//! ```text
//! Pending ──submit ok──► Submitted ──fills cover volume──► Filled
//!    │                       │
//!    └──────submit err───────┴──────────────────────────► Rejected
//! ```
//!
//! An intent is recorded before submission, so a crash between recording
//! and the venue call leaves it `Pending` and visible via [`IntentJournal::open_intents`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use warden_domain::{Fill, IntentId, OrderIntent};

use crate::error::{ExecError, ExecResult};

// =============================================================================
// Entry Types
// =============================================================================

/// Status of a journaled intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentStatus {
    /// Recorded, not yet acknowledged by the venue
    Pending,
    /// Venue accepted the order
    Submitted,
    /// Fills cover the full volume
    Filled,
    /// Venue declined the order
    Rejected,
}

impl IntentStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, IntentStatus::Pending | IntentStatus::Submitted)
    }
}

/// One intent and what happened to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub intent: OrderIntent,
    pub status: IntentStatus,
    /// Venue identifier once accepted
    pub venue_order_id: Option<String>,
    /// Sum of fill volumes applied so far
    pub filled_volume: Decimal,
    /// Rejection reason, if rejected
    pub rejection: Option<String>,
    /// When the entry reached `Filled` or `Rejected`
    pub completed_at: Option<DateTime<Utc>>,
}

impl JournalEntry {
    fn new(intent: OrderIntent) -> Self {
        Self {
            intent,
            status: IntentStatus::Pending,
            venue_order_id: None,
            filled_volume: Decimal::ZERO,
            rejection: None,
            completed_at: None,
        }
    }
}

// =============================================================================
// Intent Journal
// =============================================================================

/// In-memory journal keyed by intent id.
pub struct IntentJournal {
    entries: RwLock<HashMap<IntentId, JournalEntry>>,
}

impl IntentJournal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Record an intent before it is submitted.
    ///
    /// Returns error if an intent with the same id already exists.
    pub fn record(&self, intent: &OrderIntent) -> ExecResult<()> {
        let mut entries = self.entries.write().map_err(|e| {
            ExecError::IntentJournal(format!("Failed to acquire write lock: {}", e))
        })?;

        if entries.contains_key(&intent.id) {
            return Err(ExecError::AlreadyRecorded(intent.id));
        }

        entries.insert(intent.id, JournalEntry::new(intent.clone()));
        Ok(())
    }

    /// Get an entry by intent id.
    pub fn get(&self, intent_id: IntentId) -> ExecResult<Option<JournalEntry>> {
        let entries = self.entries.read().map_err(|e| {
            ExecError::IntentJournal(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entries.get(&intent_id).cloned())
    }

    /// Mark a pending intent as accepted by the venue.
    pub fn mark_submitted(
        &self,
        intent_id: IntentId,
        venue_order_id: Option<String>,
    ) -> ExecResult<()> {
        self.update(intent_id, |entry| {
            if entry.status != IntentStatus::Pending {
                return Err(invalid_transition(intent_id, entry.status, IntentStatus::Submitted));
            }
            entry.status = IntentStatus::Submitted;
            entry.venue_order_id = venue_order_id;
            Ok(())
        })
    }

    /// Mark an open intent as declined.
    pub fn mark_rejected(
        &self,
        intent_id: IntentId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> ExecResult<()> {
        self.update(intent_id, |entry| {
            if !entry.status.is_open() {
                return Err(invalid_transition(intent_id, entry.status, IntentStatus::Rejected));
            }
            entry.status = IntentStatus::Rejected;
            entry.rejection = Some(reason.to_string());
            entry.completed_at = Some(at);
            Ok(())
        })
    }

    /// Account a fill against its intent.
    ///
    /// Returns the entry's status after the fill, or `None` when the fill
    /// names no journaled intent.
    pub fn record_fill(&self, fill: &Fill) -> ExecResult<Option<IntentStatus>> {
        let Some(intent_id) = fill.intent_id else {
            return Ok(None);
        };

        let mut entries = self.entries.write().map_err(|e| {
            ExecError::IntentJournal(format!("Failed to acquire write lock: {}", e))
        })?;

        let Some(entry) = entries.get_mut(&intent_id) else {
            return Ok(None);
        };

        if entry.status != IntentStatus::Submitted {
            return Err(invalid_transition(intent_id, entry.status, IntentStatus::Filled));
        }

        entry.filled_volume += fill.volume;
        if entry.filled_volume >= entry.intent.volume.as_decimal() {
            entry.status = IntentStatus::Filled;
            entry.completed_at = Some(fill.filled_at);
        }

        Ok(Some(entry.status))
    }

    /// Intents still `Pending` or `Submitted`, oldest first.
    pub fn open_intents(&self) -> ExecResult<Vec<JournalEntry>> {
        self.filtered(|entry| entry.status.is_open())
    }

    /// Every entry, oldest first.
    pub fn entries(&self) -> ExecResult<Vec<JournalEntry>> {
        self.filtered(|_| true)
    }

    /// Number of entries with `status`.
    pub fn count(&self, status: IntentStatus) -> ExecResult<usize> {
        Ok(self.filtered(|entry| entry.status == status)?.len())
    }

    fn filtered(&self, keep: impl Fn(&JournalEntry) -> bool) -> ExecResult<Vec<JournalEntry>> {
        let entries = self.entries.read().map_err(|e| {
            ExecError::IntentJournal(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut selected: Vec<JournalEntry> = entries.values().filter(|e| keep(e)).cloned().collect();
        // v7 ids sort by creation time
        selected.sort_by_key(|e| e.intent.id);
        Ok(selected)
    }

    fn update(
        &self,
        intent_id: IntentId,
        apply: impl FnOnce(&mut JournalEntry) -> ExecResult<()>,
    ) -> ExecResult<()> {
        let mut entries = self.entries.write().map_err(|e| {
            ExecError::IntentJournal(format!("Failed to acquire write lock: {}", e))
        })?;

        let entry = entries.get_mut(&intent_id).ok_or_else(|| {
            ExecError::IntentJournal(format!("Intent not found: {}", intent_id))
        })?;

        apply(entry)
    }
}

impl Default for IntentJournal {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_transition(intent_id: IntentId, from: IntentStatus, to: IntentStatus) -> ExecError {
    ExecError::IntentJournal(format!("Intent {} cannot move from {:?} to {:?}", intent_id, from, to))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use warden_domain::{OrderReason, OrderSide, Price, Quantity};

    fn intent(volume: Decimal) -> OrderIntent {
        OrderIntent::new(
            OrderSide::Buy,
            Quantity::new(volume).unwrap(),
            OrderReason::Entry,
            Utc::now(),
        )
    }

    fn fill(intent: &OrderIntent, volume: Decimal) -> Fill {
        let mut fill = Fill::for_intent(intent, Price::new(dec!(100)).unwrap(), Utc::now());
        fill.volume = volume;
        fill
    }

    #[test]
    fn test_record_and_get() {
        let journal = IntentJournal::new();
        let intent = intent(dec!(1));

        journal.record(&intent).unwrap();

        let entry = journal.get(intent.id).unwrap().unwrap();
        assert_eq!(entry.status, IntentStatus::Pending);
        assert_eq!(entry.intent.id, intent.id);
    }

    #[test]
    fn test_duplicate_intent_rejected() {
        let journal = IntentJournal::new();
        let intent = intent(dec!(1));

        journal.record(&intent).unwrap();
        let result = journal.record(&intent);
        assert!(matches!(result, Err(ExecError::AlreadyRecorded(id)) if id == intent.id));
    }

    #[test]
    fn test_full_lifecycle_with_partial_fills() {
        let journal = IntentJournal::new();
        let intent = intent(dec!(2));
        journal.record(&intent).unwrap();
        journal.mark_submitted(intent.id, Some("STUB-1".to_string())).unwrap();

        assert_eq!(journal.record_fill(&fill(&intent, dec!(1))).unwrap(), Some(IntentStatus::Submitted));
        assert_eq!(journal.record_fill(&fill(&intent, dec!(1))).unwrap(), Some(IntentStatus::Filled));

        let entry = journal.get(intent.id).unwrap().unwrap();
        assert_eq!(entry.filled_volume, dec!(2));
        assert_eq!(entry.venue_order_id.as_deref(), Some("STUB-1"));
        assert!(entry.completed_at.is_some());
        assert!(journal.open_intents().unwrap().is_empty());
    }

    #[test]
    fn test_rejection() {
        let journal = IntentJournal::new();
        let intent = intent(dec!(1));
        journal.record(&intent).unwrap();

        journal.mark_rejected(intent.id, "halted", Utc::now()).unwrap();

        let entry = journal.get(intent.id).unwrap().unwrap();
        assert_eq!(entry.status, IntentStatus::Rejected);
        assert_eq!(entry.rejection.as_deref(), Some("halted"));
        assert_eq!(journal.count(IntentStatus::Rejected).unwrap(), 1);

        // Terminal: cannot be submitted afterwards
        assert!(journal.mark_submitted(intent.id, None).is_err());
    }

    #[test]
    fn test_fill_for_unknown_intent_is_ignored() {
        let journal = IntentJournal::new();
        let stray = intent(dec!(1));
        assert_eq!(journal.record_fill(&fill(&stray, dec!(1))).unwrap(), None);
    }

    #[test]
    fn test_fill_before_submission_is_an_error() {
        let journal = IntentJournal::new();
        let intent = intent(dec!(1));
        journal.record(&intent).unwrap();
        assert!(journal.record_fill(&fill(&intent, dec!(1))).is_err());
    }

    #[test]
    fn test_open_intents_sorted_by_id() {
        let journal = IntentJournal::new();
        let first = intent(dec!(1));
        let second = intent(dec!(1));
        journal.record(&second).unwrap();
        journal.record(&first).unwrap();
        journal.mark_submitted(first.id, None).unwrap();

        let open = journal.open_intents().unwrap();
        assert_eq!(open.len(), 2);
        assert!(open[0].intent.id <= open[1].intent.id);
        assert_eq!(journal.count(IntentStatus::Submitted).unwrap(), 1);
    }
}
