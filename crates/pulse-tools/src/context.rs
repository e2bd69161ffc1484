//! Per-invocation context shared by every tool.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pulse_approval::ApprovalStore;
use pulse_config::Config;
use pulse_core::{
    AgentTransport, AlertProvider, ConnectedAgent, ControlLevel, StateProvider, StateSnapshot,
    UpdateProvider,
};
use pulse_safety::CommandPolicy;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;

/// An external collaborator a tool may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Fleet inventory.
    State,
    /// Remote command execution.
    Transport,
    /// Firing alerts.
    Alerts,
    /// Docker image checks and updates.
    Updates,
}

impl Provider {
    /// Name used in "not available" messages.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::State => "state provider",
            Self::Transport => "agent transport",
            Self::Alerts => "alert provider",
            Self::Updates => "update provider",
        }
    }
}

/// The providers wired into an executor. Any of them may be absent.
#[derive(Clone, Default)]
pub struct Providers {
    /// Fleet inventory.
    pub state: Option<Arc<dyn StateProvider>>,
    /// Remote command execution.
    pub transport: Option<Arc<dyn AgentTransport>>,
    /// Firing alerts.
    pub alerts: Option<Arc<dyn AlertProvider>>,
    /// Docker image checks and updates.
    pub updates: Option<Arc<dyn UpdateProvider>>,
}

impl Providers {
    /// Set the state provider.
    #[must_use]
    pub fn with_state(mut self, state: Arc<dyn StateProvider>) -> Self {
        self.state = Some(state);
        self
    }

    /// Set the agent transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn AgentTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the alert provider.
    #[must_use]
    pub fn with_alerts(mut self, alerts: Arc<dyn AlertProvider>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Set the update provider.
    #[must_use]
    pub fn with_updates(mut self, updates: Arc<dyn UpdateProvider>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Whether `provider` is configured.
    #[must_use]
    pub fn has(&self, provider: Provider) -> bool {
        match provider {
            Provider::State => self.state.is_some(),
            Provider::Transport => self.transport.is_some(),
            Provider::Alerts => self.alerts.is_some(),
            Provider::Updates => self.updates.is_some(),
        }
    }
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Providers")
            .field("state", &self.state.is_some())
            .field("transport", &self.transport.is_some())
            .field("alerts", &self.alerts.is_some())
            .field("updates", &self.updates.is_some())
            .finish()
    }
}

/// Limits and policy knobs read from configuration.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Explicit strict-resolution mode. `None` derives it from the control
    /// level.
    pub strict_resolution: Option<bool>,
    /// Permit loopback and link-local targets for fetches.
    pub allow_loopback: bool,
    /// Timeout for post-write verification.
    pub verify_timeout: Duration,
    /// Timeout for every other remote command.
    pub command_timeout: Duration,
    /// Output is truncated to this many characters.
    pub max_output_chars: usize,
    /// Timeout for URL fetches.
    pub http_timeout: Duration,
    /// Response bodies are cut at this many bytes.
    pub max_body_bytes: usize,
    /// Guests (vmid or name) that control tools refuse to touch.
    pub protected_guests: Vec<String>,
    /// Hard-blocked command patterns.
    pub policy: CommandPolicy,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            strict_resolution: None,
            allow_loopback: false,
            verify_timeout: Duration::from_secs(20),
            command_timeout: Duration::from_secs(300),
            max_output_chars: 30_000,
            http_timeout: Duration::from_secs(30),
            max_body_bytes: 51_200,
            protected_guests: Vec::new(),
            policy: CommandPolicy::new(),
        }
    }
}

impl ExecutorSettings {
    /// Build settings from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a `safety.blocked_commands` pattern does not
    /// compile.
    pub fn from_config(config: &Config) -> Result<Self, ToolError> {
        let policy = CommandPolicy::with_patterns(&config.safety.blocked_commands)
            .map_err(|e| ToolError::Other(format!("invalid blocked command pattern: {e}")))?;
        Ok(Self {
            strict_resolution: config.control.strict_resolution,
            allow_loopback: config.safety.allow_loopback,
            verify_timeout: Duration::from_secs(config.execution.verify_timeout_secs),
            command_timeout: Duration::from_secs(config.execution.command_timeout_secs),
            max_output_chars: config.execution.max_output_chars,
            http_timeout: Duration::from_secs(config.http.timeout_secs),
            max_body_bytes: config.http.max_body_bytes,
            protected_guests: config.control.protected_guests.clone(),
            policy,
        })
    }

    /// Apply `PULSE_STRICT_RESOLUTION` and `PULSE_AI_ALLOW_LOOPBACK` from
    /// the process environment.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(strict) = pulse_core::env::strict_resolution() {
            self.strict_resolution = Some(strict);
        }
        if pulse_core::env::allow_loopback() {
            self.allow_loopback = true;
        }
        self
    }

    /// Set the strict-resolution mode.
    #[must_use]
    pub fn with_strict_resolution(mut self, strict: bool) -> Self {
        self.strict_resolution = Some(strict);
        self
    }

    /// Permit loopback fetches.
    #[must_use]
    pub fn with_allow_loopback(mut self, allow: bool) -> Self {
        self.allow_loopback = allow;
        self
    }

    /// Set the protected guests.
    #[must_use]
    pub fn with_protected_guests(mut self, guests: Vec<String>) -> Self {
        self.protected_guests = guests;
        self
    }

    /// Set the output limit.
    #[must_use]
    pub fn with_max_output_chars(mut self, max: usize) -> Self {
        self.max_output_chars = max;
        self
    }

    /// Set the verification timeout.
    #[must_use]
    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    /// Set the command timeout.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Whether `guest` (vmid or name) is protected.
    #[must_use]
    pub fn is_protected(&self, vmid: u32, name: &str) -> bool {
        let vmid = vmid.to_string();
        self.protected_guests
            .iter()
            .map(|g| g.trim())
            .any(|g| g == vmid || g.eq_ignore_ascii_case(name))
    }
}

/// Everything a handler needs for one invocation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Effective control level.
    pub control_level: ControlLevel,
    /// Tenant that owns approvals created by this call.
    pub org_id: String,
    /// Configured providers.
    pub providers: Providers,
    /// Process-wide approval store.
    pub approvals: Arc<ApprovalStore>,
    /// Limits and policy.
    pub settings: Arc<ExecutorSettings>,
    /// Fires when the caller abandons the invocation.
    pub cancel: CancellationToken,
}

impl ToolContext {
    /// A context with no providers, a private approval store, and default
    /// settings.
    #[must_use]
    pub fn new(control_level: ControlLevel) -> Self {
        Self {
            control_level,
            org_id: "default".to_string(),
            providers: Providers::default(),
            approvals: Arc::new(ApprovalStore::new()),
            settings: Arc::new(ExecutorSettings::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the org.
    #[must_use]
    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = org_id.into();
        self
    }

    /// Set the providers.
    #[must_use]
    pub fn with_providers(mut self, providers: Providers) -> Self {
        self.providers = providers;
        self
    }

    /// Share an approval store.
    #[must_use]
    pub fn with_approvals(mut self, approvals: Arc<ApprovalStore>) -> Self {
        self.approvals = approvals;
        self
    }

    /// Set the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ExecutorSettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    /// Set the cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A fresh inventory snapshot, if a state provider is configured.
    #[must_use]
    pub fn snapshot(&self) -> Option<StateSnapshot> {
        self.providers.state.as_ref().map(|s| s.get_state())
    }

    /// A fresh inventory snapshot.
    pub(crate) fn require_state(&self) -> Result<StateSnapshot, ToolError> {
        self.snapshot()
            .ok_or_else(|| ToolError::Unavailable("state provider not available".to_string()))
    }

    /// The agent transport.
    pub(crate) fn require_transport(&self) -> Result<&Arc<dyn AgentTransport>, ToolError> {
        self.providers
            .transport
            .as_ref()
            .ok_or_else(|| ToolError::Unavailable("no agent transport available".to_string()))
    }

    /// Agents currently connected, or none without a transport.
    #[must_use]
    pub fn connected_agents(&self) -> Vec<ConnectedAgent> {
        self.providers
            .transport
            .as_ref()
            .map(|t| t.connected_agents())
            .unwrap_or_default()
    }

    /// Whether mutations on unresolved names are refused.
    #[must_use]
    pub fn strict_resolution(&self) -> bool {
        self.settings
            .strict_resolution
            .unwrap_or_else(|| self.control_level.can_execute())
    }
}
