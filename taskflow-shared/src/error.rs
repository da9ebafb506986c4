//! # Error Taxonomy
//!
//! Unified error type shared by every component of the core: the broker
//! client, the task store, the worker loop, and the HTTP layer. Each
//! public operation returns `TaskerResult<T>`.

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type TaskerResult<T> = Result<T, TaskerError>;

/// Errors the core distinguishes.
#[derive(Debug, Error)]
pub enum TaskerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("transient infrastructure failure: {0}")]
    TransientInfra(String),

    #[error("poison message: {0}")]
    PoisonMessage(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("interrupted")]
    Interrupt,

    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("other: {0}")]
    Other(String),
}

impl TaskerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the failure is worth retrying. Mirrors the worker loop's
    /// `shouldRetry(err)` policy: permanent data-shape violations
    /// (unique/FK constraint breaks, poison messages, validation errors)
    /// are never retried; everything that looks like transient
    /// infrastructure is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            TaskerError::UniqueViolation(_)
            | TaskerError::ForeignKeyViolation(_)
            | TaskerError::PoisonMessage(_)
            | TaskerError::Validation(_)
            | TaskerError::Auth(_)
            | TaskerError::NotFound(_)
            | TaskerError::Config(_) => false,
            TaskerError::Broker(_)
            | TaskerError::Store(_)
            | TaskerError::Serde(_)
            | TaskerError::TransientInfra(_)
            | TaskerError::RateLimited(_)
            | TaskerError::Timeout(_)
            | TaskerError::Interrupt
            | TaskerError::Other(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!TaskerError::validation("bad enum").is_retryable());
        assert!(!TaskerError::UniqueViolation("dup".into()).is_retryable());
        assert!(!TaskerError::ForeignKeyViolation("no such user".into()).is_retryable());
        assert!(!TaskerError::PoisonMessage("undecodable".into()).is_retryable());
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(TaskerError::TransientInfra("connection reset".into()).is_retryable());
        assert!(TaskerError::Timeout("deadline".into()).is_retryable());
    }

    #[test]
    fn display_messages_are_stable() {
        let err = TaskerError::not_found("task abc");
        assert_eq!(err.to_string(), "not found: task abc");
    }
}
