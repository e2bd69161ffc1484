//! Internal error type for tool handlers.

use pulse_core::{Blocked, CoreError, ToolResult, TransportError};

/// Failures inside a tool handler.
///
/// Handlers never hand these to the dispatcher. The single conversion into
/// [`ToolResult`] turns each variant into the envelope the model sees.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Missing or malformed argument.
    #[error("{0}")]
    InvalidArguments(String),

    /// A policy or resolution gate refused the call.
    #[error("{}: {}", .0.code, .0.message)]
    Blocked(Box<Blocked>),

    /// The agent transport failed.
    #[error("{context}: {source}")]
    Transport {
        /// What was being attempted.
        context: String,
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },

    /// A provider or agent needed at execution time is missing.
    #[error("{0}")]
    Unavailable(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ToolError {
    /// Wrap a transport error with what was being attempted.
    pub(crate) fn transport(context: impl Into<String>, source: TransportError) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }
}

impl From<CoreError> for ToolError {
    fn from(e: CoreError) -> Self {
        Self::InvalidArguments(e.to_string())
    }
}

impl From<Blocked> for ToolError {
    fn from(b: Blocked) -> Self {
        Self::Blocked(Box::new(b))
    }
}

impl From<ToolError> for ToolResult {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::Blocked(b) => ToolResult::Blocked(*b),
            other => ToolResult::error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::BlockedCode;

    #[test]
    fn test_core_error_becomes_error_result() {
        let err: ToolError = CoreError::MissingArgument("path".to_string()).into();
        let result = ToolResult::from(err);
        assert_eq!(result, ToolResult::error("path is required"));
    }

    #[test]
    fn test_blocked_passes_through() {
        let err: ToolError = Blocked::new(BlockedCode::SensitivePath, "nope").into();
        let result = ToolResult::from(err);
        assert_eq!(result.blocked_code(), Some(BlockedCode::SensitivePath));
    }

    #[test]
    fn test_transport_error_keeps_context() {
        let err = ToolError::transport(
            "failed to write file",
            TransportError::AgentNotConnected("delly-agent".to_string()),
        );
        let msg = ToolResult::from(err).to_string();
        assert!(msg.contains("failed to write file"));
        assert!(msg.contains("delly-agent"));
    }
}
