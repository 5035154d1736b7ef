//! Execution layer error types.

use thiserror::Error;

/// Errors that can occur during execution operations.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Venue communication error
    #[error("Exchange error: {0}")]
    Exchange(String),

    /// Order was declined by the venue
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Intent journal error
    #[error("Intent journal error: {0}")]
    IntentJournal(String),

    /// Intent already recorded
    #[error("Intent already recorded: {0}")]
    AlreadyRecorded(uuid::Uuid),

    /// Engine error
    #[error("Engine error: {0}")]
    Engine(#[from] warden_engine::EngineError),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] warden_domain::DomainError),

    /// Observation feed failed
    #[error("Feed error: {0}")]
    Feed(String),
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;
