//! Tool result envelope returned to the language model.
//!
//! Every handler produces a [`ToolResult`]. Handlers never propagate errors:
//! input problems become [`ToolResult::Error`], policy refusals become
//! [`ToolResult::Blocked`] with a machine-readable [`BlockedCode`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Machine-readable reason a call was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockedCode {
    /// A write or unknown command was submitted to a read tool.
    ReadOnlyViolation,
    /// The call touches a credential or secret path.
    SensitivePath,
    /// The command harvests secrets or reaches a forbidden endpoint.
    SensitiveCommand,
    /// A node name was given for a write while guests exist under it.
    AmbiguousHostTarget,
    /// No route can execute inside the requested guest.
    ExecutionContextUnavailable,
    /// Human approval is required before execution.
    ApprovalRequired,
    /// The named target could not be resolved.
    UnknownResource,
    /// The command matches a hard-blocked policy pattern.
    PolicyBlocked,
}

impl BlockedCode {
    /// Wire form of the code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnlyViolation => "READ_ONLY_VIOLATION",
            Self::SensitivePath => "SENSITIVE_PATH",
            Self::SensitiveCommand => "SENSITIVE_COMMAND",
            Self::AmbiguousHostTarget => "AMBIGUOUS_HOST_TARGET",
            Self::ExecutionContextUnavailable => "EXECUTION_CONTEXT_UNAVAILABLE",
            Self::ApprovalRequired => "APPROVAL_REQUIRED",
            Self::UnknownResource => "UNKNOWN_RESOURCE",
            Self::PolicyBlocked => "POLICY_BLOCKED",
        }
    }
}

impl fmt::Display for BlockedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured details attached to a [`Blocked`] result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockedDetails {
    /// Whether the model can fix the call on its own.
    pub auto_recoverable: bool,
    /// Short instruction for recovering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_hint: Option<String>,
    /// A command that would be accepted instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_rewrite: Option<String>,
    /// Code-specific fields (candidates, provenance, the offending command).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A policy refusal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blocked {
    /// Refusal code.
    pub code: BlockedCode,
    /// Human-readable explanation.
    pub message: String,
    /// Recovery details.
    pub details: BlockedDetails,
}

impl Blocked {
    /// Create a non-recoverable block.
    #[must_use]
    pub fn new(code: BlockedCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: BlockedDetails::default(),
        }
    }

    /// Mark the block as auto-recoverable with a hint.
    #[must_use]
    pub fn recoverable(mut self, hint: impl Into<String>) -> Self {
        self.details.auto_recoverable = true;
        self.details.recovery_hint = Some(hint.into());
        self
    }

    /// Attach a recovery hint without marking the block recoverable.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.details.recovery_hint = Some(hint.into());
        self
    }

    /// Attach a suggested rewrite.
    #[must_use]
    pub fn with_rewrite(mut self, rewrite: impl Into<String>) -> Self {
        self.details.suggested_rewrite = Some(rewrite.into());
        self
    }

    /// Attach a code-specific detail field.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.extra.insert(key.into(), value.into());
        self
    }
}

/// Result of a tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    /// Plain text, possibly carrying an `APPROVAL_REQUIRED:` sentinel.
    Text(String),
    /// A structured JSON object.
    Json(Value),
    /// A failed call the model should correct and retry.
    Error {
        /// Error message.
        message: String,
        /// Optional structured details (remote streams, exit code).
        details: Option<Value>,
    },
    /// A policy refusal.
    Blocked(Blocked),
}

impl ToolResult {
    /// Plain text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Error without details.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            details: None,
        }
    }

    /// Error carrying structured details.
    #[must_use]
    pub fn error_with_details(message: impl Into<String>, details: Value) -> Self {
        Self::Error {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Whether the model sees this as an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Blocked(_))
    }

    /// The blocked code, if this is a refusal.
    #[must_use]
    pub fn blocked_code(&self) -> Option<BlockedCode> {
        match self {
            Self::Blocked(b) => Some(b.code),
            _ => None,
        }
    }

    /// The text payload of a [`ToolResult::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    /// The JSON payload of a [`ToolResult::Json`].
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Render the result in its wire shape.
    ///
    /// `Error` becomes `{is_error, text}`; `Blocked` becomes
    /// `{is_error, code, message, details}`.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Text(t) => json!({ "is_error": false, "text": t }),
            Self::Json(v) => v.clone(),
            Self::Error { message, details } => {
                let mut obj = json!({ "is_error": true, "text": message });
                if let (Some(details), Some(map)) = (details, obj.as_object_mut()) {
                    map.insert("details".to_string(), details.clone());
                }
                obj
            },
            Self::Blocked(b) => json!({
                "is_error": true,
                "code": b.code,
                "message": b.message,
                "details": b.details,
            }),
        }
    }
}

impl From<Blocked> for ToolResult {
    fn from(b: Blocked) -> Self {
        Self::Blocked(b)
    }
}

impl fmt::Display for ToolResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(t) => f.write_str(t),
            Self::Json(v) => write!(f, "{v}"),
            Self::Error { message, .. } => write!(f, "error: {message}"),
            Self::Blocked(b) => write!(f, "{}: {}", b.code, b.message),
        }
    }
}
