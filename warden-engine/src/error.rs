//! Engine error types.

use thiserror::Error;
use warden_domain::DomainError;

/// Errors raised by the pure decision layer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Protection configuration is malformed (fatal at construction)
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Fill volume is zero or negative; the fill is discarded
    #[error("Invalid fill: {0}")]
    InvalidFill(String),

    /// Protective levels could not be derived for an open position
    #[error("Protection unavailable: {0}")]
    ProtectionUnavailable(String),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
