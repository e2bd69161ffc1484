//! Dispatcher: the single entry point the assistant calls tools through.

use std::sync::Arc;

use pulse_approval::ApprovalStore;
use pulse_config::Config;
use pulse_core::{ControlLevel, ToolResult};
use pulse_telemetry::RequestContext;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::context::{ExecutorSettings, Providers, ToolContext};
use crate::error::ToolError;
use crate::{ToolDefinition, ToolRegistry};

/// Owns the registry, providers, and approval store, and applies the
/// control-level and availability gates before any handler runs.
pub struct ToolExecutor {
    registry: ToolRegistry,
    providers: Providers,
    settings: Arc<ExecutorSettings>,
    approvals: Arc<ApprovalStore>,
    control_level: ControlLevel,
    org_id: String,
}

impl ToolExecutor {
    /// An executor with every tool registered, no providers, default
    /// settings, and a private approval store.
    #[must_use]
    pub fn new(control_level: ControlLevel) -> Self {
        Self {
            registry: ToolRegistry::with_defaults(),
            providers: Providers::default(),
            settings: Arc::new(ExecutorSettings::default()),
            approvals: Arc::new(ApprovalStore::new()),
            control_level,
            org_id: "default".to_string(),
        }
    }

    /// Build an executor from a loaded configuration.
    ///
    /// Environment overrides for strict resolution and loopback fetches
    /// are applied on top of the file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the control level is unknown, the approval
    /// settings are out of range, or a blocked-command pattern does not
    /// compile.
    pub fn from_config(config: &Config) -> Result<Self, ToolError> {
        let control_level = config
            .control
            .level
            .parse::<ControlLevel>()
            .map_err(|e| ToolError::Other(e.to_string()))?;
        let approvals =
            ApprovalStore::with_settings(config.approvals.ttl_secs, config.approvals.max_pending)
                .map_err(|e| ToolError::Other(e.to_string()))?;
        let settings = ExecutorSettings::from_config(config)?.with_env_overrides();

        info!(
            control_level = %control_level,
            org_id = %config.org.id,
            strict_resolution = ?settings.strict_resolution,
            "Tool executor configured"
        );
        Ok(Self {
            registry: ToolRegistry::with_defaults(),
            providers: Providers::default(),
            settings: Arc::new(settings),
            approvals: Arc::new(approvals),
            control_level,
            org_id: config.org.id.clone(),
        })
    }

    /// Set the providers.
    #[must_use]
    pub fn with_providers(mut self, providers: Providers) -> Self {
        self.providers = providers;
        self
    }

    /// Replace the registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ExecutorSettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    /// Share an approval store, typically [`ApprovalStore::shared`].
    #[must_use]
    pub fn with_approvals(mut self, approvals: Arc<ApprovalStore>) -> Self {
        self.approvals = approvals;
        self
    }

    /// Set the org that owns approvals created by this executor.
    #[must_use]
    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = org_id.into();
        self
    }

    /// Change the control level.
    pub fn set_control_level(&mut self, level: ControlLevel) {
        info!(from = %self.control_level, to = %level, "Control level changed");
        self.control_level = level;
    }

    /// Current control level.
    #[must_use]
    pub fn control_level(&self) -> ControlLevel {
        self.control_level
    }

    /// The approval store.
    #[must_use]
    pub fn approvals(&self) -> &Arc<ApprovalStore> {
        &self.approvals
    }

    /// The org id.
    #[must_use]
    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    /// Tools the model may see right now.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.registry.list_tools(self.control_level, &self.providers)
    }

    /// Invoke `name` with `args`.
    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        self.execute_with_cancel(name, args, CancellationToken::new()).await
    }

    /// Invoke `name` with `args`; remote commands are abandoned when
    /// `cancel` fires.
    pub async fn execute_with_cancel(
        &self,
        name: &str,
        args: Value,
        cancel: CancellationToken,
    ) -> ToolResult {
        let mut request = RequestContext::new(name).with_org(self.org_id.clone());
        if let Some(host) = args.get("target_host").and_then(Value::as_str) {
            request = request.with_target_host(host);
        }
        let span = request.span();

        async {
            let result = self.dispatch(name, args, cancel).await;
            debug!(
                outcome = outcome(&result),
                elapsed_ms = request.elapsed_ms(),
                "Tool call finished"
            );
            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, name: &str, args: Value, cancel: CancellationToken) -> ToolResult {
        let Some(tool) = self.registry.get(name) else {
            warn!("Unknown tool requested");
            return ToolResult::error(format!("unknown tool: {name}"));
        };
        if tool.require_control() && !self.control_level.allows_control_tools() {
            return ToolResult::text(format!(
                "{name} is not available in read-only mode. Change the control level to use it."
            ));
        }
        if let Some(reason) = tool.unavailable_reason(&self.providers) {
            return ToolResult::text(reason);
        }
        let args = match args {
            Value::Null => json!({}),
            Value::Object(_) => args,
            _ => return ToolResult::error(format!("arguments for {name} must be a JSON object")),
        };

        let ctx = self.context().with_cancel(cancel);
        tool.execute(args, &ctx).await
    }

    fn context(&self) -> ToolContext {
        ToolContext {
            control_level: self.control_level,
            org_id: self.org_id.clone(),
            providers: self.providers.clone(),
            approvals: Arc::clone(&self.approvals),
            settings: Arc::clone(&self.settings),
            cancel: CancellationToken::new(),
        }
    }
}

fn outcome(result: &ToolResult) -> &'static str {
    match result {
        ToolResult::Text(_) => "text",
        ToolResult::Json(_) => "json",
        ToolResult::Error { .. } => "error",
        ToolResult::Blocked(_) => "blocked",
    }
}
