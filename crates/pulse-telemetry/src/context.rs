//! Per-invocation tracing context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context for a single tool invocation.
///
/// Every dispatch gets one; its [`span`](Self::span) wraps the handler so
/// that every log line emitted while the call runs carries the request id,
/// tool, org, and target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Unique request identifier.
    pub request_id: Uuid,
    /// Correlation id shared by calls of one conversation turn.
    pub correlation_id: Uuid,
    /// Tenant.
    pub org_id: String,
    /// Tool being invoked.
    pub tool: String,
    /// Raw `target_host` argument, when present.
    pub target_host: Option<String>,
    /// When the call started.
    pub started_at: DateTime<Utc>,
}

impl RequestContext {
    /// Create a context for a call to `tool`.
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            request_id: id,
            correlation_id: id,
            org_id: String::new(),
            tool: tool.into(),
            target_host: None,
            started_at: Utc::now(),
        }
    }

    /// Set the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = id;
        self
    }

    /// Set the org.
    #[must_use]
    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = org_id.into();
        self
    }

    /// Set the target.
    #[must_use]
    pub fn with_target_host(mut self, target_host: impl Into<String>) -> Self {
        self.target_host = Some(target_host.into());
        self
    }

    /// Time since the call started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.started_at)
    }

    /// Elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed().num_milliseconds()
    }

    /// First eight characters of the request id.
    #[must_use]
    pub fn short_id(&self) -> String {
        self.request_id.simple().to_string().chars().take(8).collect()
    }

    /// A span carrying this context.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "tool_call",
            request_id = %self.short_id(),
            correlation_id = %self.correlation_id,
            tool = %self.tool,
            org_id = %self.org_id,
            target_host = self.target_host.as_deref(),
        )
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_context_creation() {
        let ctx = RequestContext::new("pulse_read");
        assert_eq!(ctx.tool, "pulse_read");
        assert_eq!(ctx.request_id, ctx.correlation_id);
        assert!(ctx.target_host.is_none());
        assert!(ctx.org_id.is_empty());
    }

    #[test]
    fn test_request_context_builder() {
        let correlation = Uuid::new_v4();
        let ctx = RequestContext::new("pulse_control")
            .with_correlation_id(correlation)
            .with_org("acme")
            .with_target_host("delly");

        assert_eq!(ctx.correlation_id, correlation);
        assert_ne!(ctx.request_id, correlation);
        assert_eq!(ctx.org_id, "acme");
        assert_eq!(ctx.target_host.as_deref(), Some("delly"));
    }

    #[test]
    fn test_elapsed() {
        let ctx = RequestContext::new("test");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(ctx.elapsed_ms() >= 10);
    }

    #[test]
    fn test_short_id() {
        let ctx = RequestContext::new("test");
        let short = ctx.short_id();
        assert_eq!(short.len(), 8);
        assert!(ctx.request_id.simple().to_string().starts_with(&short));
    }

    #[test]
    fn test_span_can_be_entered_without_subscriber() {
        let ctx = RequestContext::new("pulse_query").with_org("default");
        let span = ctx.span();
        let _guard = span.enter();
        tracing::info!("inside");
    }

    #[test]
    fn test_serialization() {
        let ctx = RequestContext::new("pulse_docker").with_target_host("nas");
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"tool\":\"pulse_docker\""));

        let parsed: RequestContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ctx);
    }
}
