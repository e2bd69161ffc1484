//! Error types shared across Pulse crates.

use thiserror::Error;

/// Errors raised by core helpers (argument coercion, request validation).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A required argument was missing or empty.
    #[error("{0} is required")]
    MissingArgument(String),

    /// An argument had the wrong type or an out-of-range value.
    #[error("invalid {field}: {message}")]
    InvalidArgument {
        /// Argument name.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// An unknown control level string.
    #[error("unknown control level: {0}")]
    UnknownControlLevel(String),

    /// A command payload failed transport-side validation.
    #[error("invalid command request: {0}")]
    InvalidRequest(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by an [`AgentTransport`](crate::AgentTransport).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The agent is not (or no longer) connected.
    #[error("agent {0} is not connected")]
    AgentNotConnected(String),

    /// The payload was rejected before it was sent.
    #[error("command rejected: {0}")]
    Rejected(String),

    /// The invocation was cancelled while the command was in flight.
    #[error("command cancelled")]
    Cancelled,

    /// The remote command did not finish in time.
    #[error("command timed out after {0}s")]
    Timeout(u64),

    /// Any other RPC failure.
    #[error("{0}")]
    Failed(String),
}

impl TransportError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        const TRANSIENT: &[&str] = &[
            "temporary failure",
            "queue full",
            "resource busy",
            "database is locked",
            "deadlock",
            "eof",
            "try again",
            "connection reset",
        ];
        match self {
            Self::Timeout(_) => true,
            Self::Failed(msg) => {
                let msg = msg.to_ascii_lowercase();
                TRANSIENT.iter().any(|p| msg.contains(p))
            },
            Self::AgentNotConnected(_) | Self::Rejected(_) | Self::Cancelled => false,
        }
    }
}

impl From<CoreError> for TransportError {
    fn from(err: CoreError) -> Self {
        Self::Rejected(err.to_string())
    }
}
