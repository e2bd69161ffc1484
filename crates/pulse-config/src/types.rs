//! Configuration types for the Pulse AI tool core.
//!
//! These types have no dependencies on other internal crates. Control
//! levels stay strings here and are parsed at the boundary. Every struct
//! implements [`Default`] so a bare `[section]` header produces a working
//! configuration.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control level and target policy.
    pub control: ControlSection,
    /// Approval lifetime and capacity.
    pub approvals: ApprovalsSection,
    /// Loopback access and extra blocked commands.
    pub safety: SafetySection,
    /// Remote execution limits.
    pub execution: ExecutionSection,
    /// URL content fetching limits.
    pub http: HttpSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
    /// Tenant identity used to scope approvals.
    pub org: OrgSection,
}

// ---------------------------------------------------------------------------
// ControlSection
// ---------------------------------------------------------------------------

/// How much the assistant may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSection {
    /// `read_only`, `suggest`, `controlled`, or `autonomous`.
    pub level: String,
    /// Guests (vmid or name) that control tools refuse to touch.
    pub protected_guests: Vec<String>,
    /// Block mutations on unresolved names. Unset means hard for
    /// `controlled` / `autonomous` and soft otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_resolution: Option<bool>,
}

impl Default for ControlSection {
    fn default() -> Self {
        Self {
            level: "read_only".to_owned(),
            protected_guests: Vec::new(),
            strict_resolution: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ApprovalsSection
// ---------------------------------------------------------------------------

/// Approval store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalsSection {
    /// Seconds an approval stays valid.
    pub ttl_secs: u64,
    /// Pending approvals kept per org before the oldest is evicted.
    pub max_pending: usize,
}

impl Default for ApprovalsSection {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            max_pending: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// SafetySection
// ---------------------------------------------------------------------------

/// Safety gate settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetySection {
    /// Permit loopback and link-local fetches in the URL content tool.
    pub allow_loopback: bool,
    /// Extra regular expressions hard-blocked for `pulse_control`.
    pub blocked_commands: Vec<String>,
}

// ---------------------------------------------------------------------------
// ExecutionSection
// ---------------------------------------------------------------------------

/// Remote execution limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Timeout for post-write hash verification.
    pub verify_timeout_secs: u64,
    /// Timeout for any other remote command.
    pub command_timeout_secs: u64,
    /// Output longer than this is truncated before it reaches the model.
    pub max_output_chars: usize,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            verify_timeout_secs: 20,
            command_timeout_secs: 300,
            max_output_chars: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// HttpSection
// ---------------------------------------------------------------------------

/// URL content fetching limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Request timeout.
    pub timeout_secs: u64,
    /// Response bodies are cut at this many bytes.
    pub max_body_bytes: usize,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_body_bytes: 51_200,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["pulse_tools=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// OrgSection
// ---------------------------------------------------------------------------

/// Tenant identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgSection {
    /// Org id used to scope approvals.
    pub id: String,
}

impl Default for OrgSection {
    fn default() -> Self {
        Self {
            id: "default".to_owned(),
        }
    }
}
