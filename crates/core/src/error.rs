//! Unified error types for the session engine.
//!
//! Column writers report two recoverable conditions:
//! - `BrokenEvent`: the event is marked broken and dropped before writing
//! - `BrokenSession`: the whole session is marked broken and dropped
//!
//! Everything else aborts the batch that produced it.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the session engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("broken event: {0}")]
    BrokenEvent(String),

    #[error("broken session: {0}")]
    BrokenSession(String),

    #[error("retryable: {0}")]
    Retryable(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Column graph problems. The message is rendered verbatim.
    #[error("{0}")]
    Dependency(String),

    #[error("expression error: {0}")]
    Expression(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("warehouse error: {0}")]
    Warehouse(String),

    #[error("table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("context deadline exceeded")]
    Timeout,

    #[error("context canceled")]
    Canceled,

    #[error("writer stopped")]
    Stopped,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn broken_event(msg: impl Into<String>) -> Self {
        Self::BrokenEvent(msg.into())
    }

    pub fn broken_session(msg: impl Into<String>) -> Self {
        Self::BrokenSession(msg.into())
    }

    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::Dependency(msg.into())
    }

    pub fn expression(msg: impl Into<String>) -> Self {
        Self::Expression(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn warehouse(msg: impl Into<String>) -> Self {
        Self::Warehouse(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Retryable(_) | Self::Timeout | Self::Warehouse(_) | Self::Io(_)
        )
    }

    /// Whether this error marks a single event as unusable.
    pub fn is_broken_event(&self) -> bool {
        matches!(self, Self::BrokenEvent(_))
    }

    /// Whether this error marks a whole session as unusable.
    pub fn is_broken_session(&self) -> bool {
        matches!(self, Self::BrokenSession(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_message_is_verbatim() {
        let err = Error::dependency("column a depends on b, which is not present");
        assert_eq!(err.to_string(), "column a depends on b, which is not present");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::retryable("later").is_retryable());
        assert!(Error::Timeout.is_retryable());
        assert!(!Error::broken_event("x").is_retryable());
        assert!(!Error::Stopped.is_retryable());
    }

    #[test]
    fn test_broken_kinds() {
        assert!(Error::broken_event("no name").is_broken_event());
        assert!(Error::broken_session("negative").is_broken_session());
        assert!(!Error::internal("x").is_broken_session());
    }
}
