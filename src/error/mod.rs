//! Error types for cadence.

use thiserror::Error;

/// Primary error type for all cadence operations.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The event stream broke the protocol (bad ordering, unparseable tool arguments).
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The producer's stream failed or the producer raised.
    #[error("Producer error: {0}")]
    Producer(String),

    /// The producer reported a `RUN_ERROR` event.
    #[error("Run error: {message}")]
    Run {
        message: String,
        code: Option<String>,
    },

    #[error("Run aborted")]
    Aborted,

    #[error("Subscriber error: {0}")]
    Subscriber(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Coarse classification of an [`AgentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Protocol,
    Producer,
    Subscriber,
    Cancelled,
    Configuration,
    Serialization,
    Timeout,
    Unknown,
}

impl AgentError {
    /// Create a protocol violation.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a producer failure.
    pub fn producer(message: impl Into<String>) -> Self {
        Self::Producer(message.into())
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Protocol(_) => ErrorCategory::Protocol,
            Self::Producer(_) | Self::Run { .. } => ErrorCategory::Producer,
            Self::Subscriber(_) => ErrorCategory::Subscriber,
            Self::Aborted => ErrorCategory::Cancelled,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Io(_) | Self::InvalidState(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether the stream itself was malformed.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_errors_classify_as_producer_failures() {
        let err = AgentError::Run {
            message: "boom".into(),
            code: Some("E42".into()),
        };
        assert_eq!(err.category(), ErrorCategory::Producer);
        assert_eq!(err.to_string(), "Run error: boom");
    }

    #[test]
    fn protocol_violation_is_detected() {
        let err = AgentError::protocol("TEXT_MESSAGE_CONTENT before start");
        assert!(err.is_protocol_violation());
        assert_eq!(err.category().to_string(), "protocol");
        assert!(!AgentError::Aborted.is_protocol_violation());
    }
}
