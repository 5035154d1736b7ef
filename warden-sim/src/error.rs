//! Simulation host error types.

use thiserror::Error;
use warden_domain::DomainError;
use warden_engine::EngineError;
use warden_exec::ExecError;

/// Host-level errors.
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed bar file
    #[error("CSV error: {0}")]
    Csv(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Execution error
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// Engine error
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Result type for host operations.
pub type SimResult<T> = Result<T, SimError>;
