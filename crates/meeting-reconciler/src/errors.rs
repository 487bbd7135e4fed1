//! Meeting Reconciler error types.
//!
//! Runtime errors are always contained to the operation (one meeting, one
//! connection) that produced them. Only configuration and startup failures
//! terminate the process, and those use [`crate::config::ConfigError`] or
//! surface directly from `main`.

use thiserror::Error;

/// Runtime error for store, push gateway and task operations.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// Document store operation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// An operation exceeded its configured timeout.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Identifier is not a valid store identifier.
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    /// Stored document could not be decoded into a domain type.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Push gateway unreachable or returned a retryable failure.
    #[error("Push gateway error: {0}")]
    PushGateway(String),

    /// Push gateway rejected the request (bad payload or credentials).
    #[error("Push gateway rejected request: {0}")]
    PushRejected(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReconcilerError {
    /// Bounded label for metrics and structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::Store(_) => "store",
            ReconcilerError::Timeout(_) => "timeout",
            ReconcilerError::InvalidId(_) => "invalid_id",
            ReconcilerError::InvalidDocument(_) => "invalid_document",
            ReconcilerError::PushGateway(_) => "push_gateway",
            ReconcilerError::PushRejected(_) => "push_rejected",
            ReconcilerError::Internal(_) => "internal",
        }
    }
}

/// Convert driver errors to `ReconcilerError`
impl From<mongodb::error::Error> for ReconcilerError {
    fn from(err: mongodb::error::Error) -> Self {
        ReconcilerError::Store(err.to_string())
    }
}
