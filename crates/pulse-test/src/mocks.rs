//! Mock providers for testing.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pulse_core::{
    ActiveAlert, AgentTransport, AlertProvider, CommandOutput, CommandRequest, ConnectedAgent,
    QueuedCommand, StateProvider, StateSnapshot, TransportError, UpdateProvider,
};

/// Mock implementation of [`StateProvider`].
///
/// Serves queued snapshots in order and keeps serving the last one, so a
/// test can make the inventory change between two reads.
#[derive(Debug, Clone, Default)]
pub struct MockStateProvider {
    snapshots: Arc<Mutex<VecDeque<StateSnapshot>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockStateProvider {
    /// A provider that always returns `snapshot`.
    #[must_use]
    pub fn new(snapshot: StateSnapshot) -> Self {
        Self::with_sequence(vec![snapshot])
    }

    /// A provider that returns `snapshots` in order, then repeats the last.
    #[must_use]
    pub fn with_sequence(snapshots: Vec<StateSnapshot>) -> Self {
        Self {
            snapshots: Arc::new(Mutex::new(snapshots.into())),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Replace the inventory served from now on.
    pub fn set(&self, snapshot: StateSnapshot) {
        if let Ok(mut guard) = self.snapshots.lock() {
            guard.clear();
            guard.push_back(snapshot);
        }
    }

    /// How many times the inventory was read.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.lock().map(|g| *g).unwrap_or_default()
    }
}

impl StateProvider for MockStateProvider {
    fn get_state(&self) -> StateSnapshot {
        if let Ok(mut calls) = self.calls.lock() {
            *calls = calls.saturating_add(1);
        }
        let Ok(mut guard) = self.snapshots.lock() else {
            return StateSnapshot::default();
        };
        if guard.len() > 1 {
            guard.pop_front().unwrap_or_default()
        } else {
            guard.front().cloned().unwrap_or_default()
        }
    }
}

/// A command the mock transport received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Agent the command was sent to.
    pub agent_id: String,
    /// The payload.
    pub request: CommandRequest,
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    response: Result<CommandOutput, TransportError>,
}

type FileKey = (String, String, String);

/// Mock implementation of [`AgentTransport`].
///
/// Responses come from substring rules, checked in the order they were
/// added. With [`MockTransport::with_file_system`] the transport also keeps
/// an in-memory file system per agent and target: it applies
/// `echo '<base64>' | base64 -d > path` writes (and `>>` appends) and
/// answers `cat`, `sha256sum`, and `tail -c N` from it. Anything else
/// succeeds with empty output.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    agents: Vec<ConnectedAgent>,
    rules: Arc<Mutex<Vec<Rule>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    files: Arc<Mutex<HashMap<FileKey, Vec<u8>>>>,
    simulate_files: bool,
    delay: Option<Duration>,
}

impl MockTransport {
    /// A transport with no agents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connected agents.
    #[must_use]
    pub fn with_agents(mut self, agents: Vec<ConnectedAgent>) -> Self {
        self.agents = agents;
        self
    }

    /// Answer commands containing `pattern` with `output`.
    #[must_use]
    pub fn on_command(self, pattern: impl Into<String>, output: CommandOutput) -> Self {
        self.push_rule(pattern.into(), Ok(output));
        self
    }

    /// Fail commands containing `pattern` with `error`.
    #[must_use]
    pub fn on_command_error(self, pattern: impl Into<String>, error: TransportError) -> Self {
        self.push_rule(pattern.into(), Err(error));
        self
    }

    /// Add a rule after construction.
    pub fn add_rule(&self, pattern: impl Into<String>, output: CommandOutput) {
        self.push_rule(pattern.into(), Ok(output));
    }

    fn push_rule(&self, pattern: String, response: Result<CommandOutput, TransportError>) {
        if let Ok(mut guard) = self.rules.lock() {
            guard.push(Rule { pattern, response });
        }
    }

    /// Keep an in-memory file system.
    #[must_use]
    pub fn with_file_system(mut self) -> Self {
        self.simulate_files = true;
        self
    }

    /// Sleep before answering each command.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Seed a file for `agent_id` on `target_id` (empty for the host).
    pub fn put_file(&self, agent_id: &str, target_id: &str, path: &str, content: &[u8]) {
        if let Ok(mut guard) = self.files.lock() {
            guard.insert(
                (agent_id.to_string(), target_id.to_string(), path.to_string()),
                content.to_vec(),
            );
        }
    }

    /// Contents of a simulated file.
    #[must_use]
    pub fn file(&self, agent_id: &str, target_id: &str, path: &str) -> Option<Vec<u8>> {
        self.files.lock().ok().and_then(|g| {
            g.get(&(agent_id.to_string(), target_id.to_string(), path.to_string()))
                .cloned()
        })
    }

    /// Every command received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Just the command strings received.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|c| c.request.command)
            .collect()
    }

    fn matching_rule(&self, command: &str) -> Option<Result<CommandOutput, TransportError>> {
        self.rules
            .lock()
            .ok()?
            .iter()
            .find(|r| command.contains(&r.pattern))
            .map(|r| r.response.clone())
    }

    fn simulate(&self, agent_id: &str, request: &CommandRequest) -> Option<CommandOutput> {
        // Shell quoting is irrelevant to the simulation; drop it.
        let cmd = request.command.replace(['\'', '"'], "");
        let key = |path: &str| {
            (
                agent_id.to_string(),
                request.target_id.clone(),
                path.to_string(),
            )
        };
        let mut files = self.files.lock().ok()?;

        for (op, append) in [("| base64 -d >> ", true), ("| base64 -d > ", false)] {
            if let Some((head, tail)) = cmd.split_once(op) {
                let payload = head.rsplit("echo ").next().map(str::trim)?;
                let path = first_word(tail)?;
                let Ok(bytes) = BASE64.decode(payload) else {
                    return Some(CommandOutput::failed(1, "base64: invalid input"));
                };
                let entry = files.entry(key(path)).or_default();
                if !append {
                    entry.clear();
                }
                entry.extend_from_slice(&bytes);
                return Some(CommandOutput::ok(""));
            }
        }

        if let Some((_, rest)) = cmd.split_once("tail -c ") {
            let mut words = rest.split_whitespace();
            let count: usize = words.next()?.parse().ok()?;
            let path = words.next()?;
            let content = files.get(&key(path))?;
            let start = content.len().saturating_sub(count);
            let digest = hex::encode(Sha256::digest(&content[start..]));
            return Some(CommandOutput::ok(format!("{digest}  -\n")));
        }

        if let Some((_, rest)) = cmd.split_once("sha256sum ") {
            let path = first_word(rest)?;
            return Some(match files.get(&key(path)) {
                Some(content) => {
                    let digest = hex::encode(Sha256::digest(content));
                    CommandOutput::ok(format!("{digest}  {path}\n"))
                },
                None => CommandOutput::failed(1, ""),
            });
        }

        if let Some((_, rest)) = cmd.split_once("cat ") {
            let path = first_word(rest)?;
            return Some(match files.get(&key(path)) {
                Some(content) => CommandOutput::ok(String::from_utf8_lossy(content).into_owned()),
                None => CommandOutput::failed(1, format!("cat: {path}: No such file or directory")),
            });
        }

        None
    }
}

fn first_word(s: &str) -> Option<&str> {
    s.split_whitespace().next()
}

#[async_trait]
impl AgentTransport for MockTransport {
    fn connected_agents(&self) -> Vec<ConnectedAgent> {
        self.agents.clone()
    }

    async fn execute_command(
        &self,
        agent_id: &str,
        request: CommandRequest,
    ) -> Result<CommandOutput, TransportError> {
        if let Ok(mut guard) = self.calls.lock() {
            guard.push(RecordedCall {
                agent_id: agent_id.to_string(),
                request: request.clone(),
            });
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.agents.is_empty() && !self.agents.iter().any(|a| a.agent_id == agent_id) {
            return Err(TransportError::AgentNotConnected(agent_id.to_string()));
        }
        if let Some(response) = self.matching_rule(&request.command) {
            return response;
        }
        if self.simulate_files
            && let Some(output) = self.simulate(agent_id, &request)
        {
            return Ok(output);
        }
        Ok(CommandOutput::ok(""))
    }
}

/// Mock implementation of [`AlertProvider`].
#[derive(Debug, Clone, Default)]
pub struct MockAlertProvider {
    alerts: Vec<ActiveAlert>,
}

impl MockAlertProvider {
    /// A provider serving `alerts`.
    #[must_use]
    pub fn new(alerts: Vec<ActiveAlert>) -> Self {
        Self { alerts }
    }
}

impl AlertProvider for MockAlertProvider {
    fn active_alerts(&self) -> Vec<ActiveAlert> {
        self.alerts.clone()
    }
}

/// A job the mock update provider accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCall {
    /// `trigger_update_check(host_id)`.
    Check {
        /// Docker host id.
        host_id: String,
    },
    /// `update_container(host_id, container_id, container_name)`.
    Update {
        /// Docker host id.
        host_id: String,
        /// Container id.
        container_id: String,
        /// Container name.
        container_name: String,
    },
}

/// Mock implementation of [`UpdateProvider`].
///
/// Queued errors are returned first, one per call, then every call succeeds
/// with a numbered job.
#[derive(Debug, Clone)]
pub struct MockUpdateProvider {
    enabled: bool,
    failures: Arc<Mutex<VecDeque<TransportError>>>,
    calls: Arc<Mutex<Vec<UpdateCall>>>,
}

impl Default for MockUpdateProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUpdateProvider {
    /// A provider with update actions enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            failures: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Report update actions as disabled by server configuration.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Fail the next call with `error`.
    #[must_use]
    pub fn failing_with(self, error: TransportError) -> Self {
        if let Ok(mut guard) = self.failures.lock() {
            guard.push_back(error);
        }
        self
    }

    /// Calls received so far, failed ones included.
    #[must_use]
    pub fn calls(&self) -> Vec<UpdateCall> {
        self.calls.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn accept(&self, call: UpdateCall, kind: &str) -> Result<QueuedCommand, TransportError> {
        let n = match self.calls.lock() {
            Ok(mut calls) => {
                calls.push(call);
                calls.len()
            },
            Err(_) => 0,
        };
        if let Some(err) = self.failures.lock().ok().and_then(|mut g| g.pop_front()) {
            return Err(err);
        }
        Ok(QueuedCommand {
            id: format!("cmd-{n}"),
            kind: kind.to_string(),
            status: "queued".to_string(),
            message: String::new(),
        })
    }
}

#[async_trait]
impl UpdateProvider for MockUpdateProvider {
    fn update_actions_enabled(&self) -> bool {
        self.enabled
    }

    async fn trigger_update_check(&self, host_id: &str) -> Result<QueuedCommand, TransportError> {
        self.accept(
            UpdateCall::Check {
                host_id: host_id.to_string(),
            },
            "check_updates",
        )
    }

    async fn update_container(
        &self,
        host_id: &str,
        container_id: &str,
        container_name: &str,
    ) -> Result<QueuedCommand, TransportError> {
        self.accept(
            UpdateCall::Update {
                host_id: host_id.to_string(),
                container_id: container_id.to_string(),
                container_name: container_name.to_string(),
            },
            "update_container",
        )
    }
}
