//! Narrow interfaces to the external collaborators.
//!
//! The core never owns inventory or remote execution. It reads a
//! [`StateSnapshot`] from a [`StateProvider`], runs commands through an
//! [`AgentTransport`], reads firing alerts from an [`AlertProvider`], and
//! queues Docker image work through an [`UpdateProvider`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult, TransportError};
use crate::state::{ActiveAlert, StateSnapshot};

/// Maximum command payload size accepted by the transport.
pub const MAX_COMMAND_BYTES: usize = 65_536;

/// Maximum length of a guest target id.
const MAX_TARGET_ID_LEN: usize = 64;

/// Source of fleet inventory.
pub trait StateProvider: Send + Sync {
    /// Current snapshot. Freshness is best-effort.
    fn get_state(&self) -> StateSnapshot;
}

/// Remote-command RPC to connected agents.
#[async_trait::async_trait]
pub trait AgentTransport: Send + Sync {
    /// Agents currently connected.
    fn connected_agents(&self) -> Vec<ConnectedAgent>;

    /// Run a command through an agent.
    ///
    /// For `container` / `vm` targets the agent wraps the command with the
    /// host-mediated exec itself; the core only supplies the inner command.
    async fn execute_command(
        &self,
        agent_id: &str,
        request: CommandRequest,
    ) -> Result<CommandOutput, TransportError>;
}

/// Source of currently firing alerts.
pub trait AlertProvider: Send + Sync {
    /// Alerts firing now.
    fn active_alerts(&self) -> Vec<ActiveAlert>;
}

/// Queues Docker image checks and updates on agents.
///
/// The agent does the work asynchronously and reports results in a later
/// [`StateSnapshot`].
#[async_trait::async_trait]
pub trait UpdateProvider: Send + Sync {
    /// Whether server configuration allows container updates.
    fn update_actions_enabled(&self) -> bool;

    /// Ask the agent on `host_id` to check its images for updates.
    async fn trigger_update_check(&self, host_id: &str) -> Result<QueuedCommand, TransportError>;

    /// Ask the agent on `host_id` to pull the newest image and recreate the
    /// container.
    async fn update_container(
        &self,
        host_id: &str,
        container_id: &str,
        container_name: &str,
    ) -> Result<QueuedCommand, TransportError>;
}

/// A job accepted by an [`UpdateProvider`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedCommand {
    /// Job id.
    pub id: String,
    /// Job kind (`check_updates`, `update_container`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Queue status.
    pub status: String,
    /// Agent-facing message.
    pub message: String,
}

/// A connected agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedAgent {
    /// Agent identifier.
    pub agent_id: String,
    /// Hostname the agent reported.
    pub hostname: String,
}

impl ConnectedAgent {
    /// Create a connected agent.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            hostname: hostname.into(),
        }
    }
}

/// Where the agent should run the command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// On the agent's own host.
    #[default]
    Host,
    /// Inside a system container (`pct exec`).
    Container,
    /// Inside a VM (`qm guest exec`).
    Vm,
}

impl TargetType {
    /// Wire form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Container => "container",
            Self::Vm => "vm",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload sent to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Shell command to run.
    pub command: String,
    /// Execution context.
    pub target_type: TargetType,
    /// Guest vmid for `container` / `vm`; empty for `host`.
    pub target_id: String,
}

impl CommandRequest {
    /// A command for the agent's own host.
    #[must_use]
    pub fn host(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            target_type: TargetType::Host,
            target_id: String::new(),
        }
    }

    /// A command for an explicit target.
    #[must_use]
    pub fn new(
        command: impl Into<String>,
        target_type: TargetType,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            target_type,
            target_id: target_id.into(),
        }
    }

    /// Validate the payload and normalize the target.
    ///
    /// Host targets drop any `target_id`. Guest targets need an id made of
    /// `[A-Za-z0-9._:-]`, at most 64 characters.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRequest`] for an empty or oversized
    /// command, or a missing / malformed guest id.
    pub fn normalized(mut self) -> CoreResult<Self> {
        if self.command.trim().is_empty() {
            return Err(CoreError::InvalidRequest("command is empty".to_string()));
        }
        if self.command.len() > MAX_COMMAND_BYTES {
            return Err(CoreError::InvalidRequest(format!(
                "command exceeds {MAX_COMMAND_BYTES} bytes"
            )));
        }

        match self.target_type {
            TargetType::Host => self.target_id.clear(),
            TargetType::Container | TargetType::Vm => {
                let id = self.target_id.trim();
                if id.is_empty() {
                    return Err(CoreError::InvalidRequest(format!(
                        "target_id is required for {} targets",
                        self.target_type
                    )));
                }
                if id.len() > MAX_TARGET_ID_LEN
                    || !id
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-'))
                {
                    return Err(CoreError::InvalidRequest(format!(
                        "invalid target_id: {id}"
                    )));
                }
                self.target_id = id.to_string();
            },
        }
        Ok(self)
    }
}

/// Result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Process exit code.
    pub exit_code: i32,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// Failed output.
    #[must_use]
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Whether the command exited zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr, trimmed.
    #[must_use]
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_request_drops_target_id() {
        let req = CommandRequest::new("uptime", TargetType::Host, "141")
            .normalized()
            .unwrap();
        assert_eq!(req.target_id, "");
    }

    #[test]
    fn test_guest_request_requires_id() {
        let err = CommandRequest::new("uptime", TargetType::Container, "  ")
            .normalized()
            .unwrap_err();
        assert!(err.to_string().contains("target_id is required"));

        let req = CommandRequest::new("uptime", TargetType::Vm, " 200 ")
            .normalized()
            .unwrap();
        assert_eq!(req.target_id, "200");
    }

    #[test]
    fn test_guest_request_rejects_unsafe_id() {
        assert!(
            CommandRequest::new("uptime", TargetType::Container, "141; rm -rf /")
                .normalized()
                .is_err()
        );
        assert!(
            CommandRequest::new("uptime", TargetType::Container, "x".repeat(65))
                .normalized()
                .is_err()
        );
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(CommandRequest::host("   ").normalized().is_err());
    }

    #[test]
    fn test_combined_output() {
        let out = CommandOutput {
            stdout: "a\n".to_string(),
            stderr: "b\n".to_string(),
            exit_code: 1,
        };
        assert_eq!(out.combined(), "a\nb");
        assert!(!out.success());
        assert_eq!(CommandOutput::ok("x").combined(), "x");
    }
}
