//! Map a resolved resource onto a connected agent and exec transport.

use std::fmt;

use pulse_core::{
    CommandRequest, ConnectedAgent, DockerHost, GuestKind, StateSnapshot, TargetType,
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::resolver::{self, DockerHostType, ResourceLocation, ResourceType};

/// How a command reaches its target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Runs on the agent's own host.
    #[default]
    Direct,
    /// Host-mediated exec into a system container.
    PctExec,
    /// Host-mediated exec into a VM through the guest agent.
    QmGuestExec,
}

impl Transport {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::PctExec => "pct_exec",
            Self::QmGuestExec => "qm_guest_exec",
        }
    }

    fn for_guest(kind: GuestKind) -> (Self, TargetType) {
        match kind {
            GuestKind::SystemContainer => (Self::PctExec, TargetType::Container),
            GuestKind::Vm => (Self::QmGuestExec, TargetType::Vm),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a command will execute.
///
/// An empty `agent_id` means nothing can run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Routing {
    /// Agent that will run the command.
    pub agent_id: String,
    /// That agent's hostname.
    pub agent_hostname: String,
    /// What the target resolved to, if anything.
    pub resolved_kind: Option<ResourceType>,
    /// Hypervisor node the command is mediated through.
    pub resolved_node: Option<String>,
    /// Transport payload target type.
    pub target_type: TargetType,
    /// Transport payload target id (vmid for guests).
    pub target_id: String,
    /// Exec path.
    pub transport: Transport,
}

impl Routing {
    fn direct(agent: &ConnectedAgent, kind: Option<ResourceType>) -> Self {
        Self {
            agent_id: agent.agent_id.clone(),
            agent_hostname: agent.hostname.clone(),
            resolved_kind: kind,
            ..Self::default()
        }
    }

    /// Whether an agent was found.
    #[must_use]
    pub fn has_agent(&self) -> bool {
        !self.agent_id.is_empty()
    }

    /// Whether the command runs inside a guest.
    #[must_use]
    pub fn is_guest_exec(&self) -> bool {
        self.transport != Transport::Direct
    }

    /// Transport payload for `command`.
    #[must_use]
    pub fn request(&self, command: impl Into<String>) -> CommandRequest {
        CommandRequest::new(command, self.target_type, self.target_id.clone())
    }

    /// The `execution` provenance block attached to mutating responses.
    #[must_use]
    pub fn provenance(&self, requested_target_host: &str) -> Value {
        json!({
            "requested_target_host": requested_target_host,
            "resolved_kind": self.resolved_kind.map_or("unresolved", ResourceType::as_str),
            "resolved_node": self.resolved_node,
            "agent_host": self.agent_hostname,
            "transport": if self.has_agent() { self.transport.as_str() } else { "none" },
            "target_type": self.target_type,
            "target_id": self.target_id,
        })
    }
}

/// A connected agent matching `name` by hostname or id.
#[must_use]
pub fn find_agent<'a>(agents: &'a [ConnectedAgent], name: &str) -> Option<&'a ConnectedAgent> {
    agents
        .iter()
        .find(|a| a.hostname.eq_ignore_ascii_case(name) || a.agent_id == name)
}

/// The agent running on hypervisor node `node`.
#[must_use]
pub fn agent_for_node<'a>(
    agents: &'a [ConnectedAgent],
    node: &str,
) -> Option<&'a ConnectedAgent> {
    agents
        .iter()
        .find(|a| a.hostname.eq_ignore_ascii_case(node))
        .or_else(|| agents.iter().find(|a| a.agent_id.eq_ignore_ascii_case(node)))
}

fn connected<'a>(
    agents: &'a [ConnectedAgent],
    agent_id: Option<&str>,
) -> Option<&'a ConnectedAgent> {
    let agent_id = agent_id.filter(|id| !id.is_empty())?;
    agents.iter().find(|a| a.agent_id == agent_id)
}

/// Route into a guest through its node's agent.
#[must_use]
pub fn route_guest(
    agents: &[ConnectedAgent],
    node: &str,
    vmid: u32,
    kind: GuestKind,
    resolved_kind: ResourceType,
) -> Routing {
    let (transport, target_type) = Transport::for_guest(kind);
    let mut routing = agent_for_node(agents, node)
        .map(|a| Routing::direct(a, None))
        .unwrap_or_default();
    routing.resolved_kind = Some(resolved_kind);
    routing.resolved_node = Some(node.to_string());
    routing.transport = transport;
    routing.target_type = target_type;
    routing.target_id = vmid.to_string();
    routing
}

/// Route to a Docker host: through its parent guest when it has one,
/// otherwise to its own agent.
#[must_use]
pub fn route_docker_host(
    state: &StateSnapshot,
    agents: &[ConnectedAgent],
    host: &DockerHost,
) -> Routing {
    if let Some(parent) = resolver::docker_host_parent(state, host) {
        return route_guest(
            agents,
            &parent.node,
            parent.vmid,
            parent.kind,
            ResourceType::DockerHost,
        );
    }
    connected(agents, Some(&host.agent_id))
        .or_else(|| find_agent(agents, &host.hostname))
        .map(|a| Routing::direct(a, Some(ResourceType::DockerHost)))
        .unwrap_or_default()
}

/// Route a resolved location.
#[must_use]
pub fn route_location(agents: &[ConnectedAgent], loc: &ResourceLocation) -> Routing {
    let Some(kind) = loc.resource_type else {
        return Routing::default();
    };
    match kind {
        ResourceType::Node => {
            let node = loc.node.as_deref().unwrap_or(&loc.target_host);
            let mut routing = agent_for_node(agents, node)
                .map(|a| Routing::direct(a, Some(kind)))
                .unwrap_or_default();
            routing.resolved_kind = Some(kind);
            routing.resolved_node = Some(node.to_string());
            routing
        },
        ResourceType::Vm | ResourceType::SystemContainer => {
            let guest_kind = if kind == ResourceType::Vm {
                GuestKind::Vm
            } else {
                GuestKind::SystemContainer
            };
            match (loc.node.as_deref(), loc.vmid) {
                (Some(node), Some(vmid)) => route_guest(agents, node, vmid, guest_kind, kind),
                _ => Routing::default(),
            }
        },
        ResourceType::Docker | ResourceType::DockerHost => match loc.docker_host_type {
            Some(host_type @ (DockerHostType::Lxc | DockerHostType::Vm)) => {
                let guest_kind = if host_type == DockerHostType::Vm {
                    GuestKind::Vm
                } else {
                    GuestKind::SystemContainer
                };
                match (loc.node.as_deref(), loc.vmid) {
                    (Some(node), Some(vmid)) => route_guest(agents, node, vmid, guest_kind, kind),
                    _ => Routing::default(),
                }
            },
            _ => connected(agents, loc.agent_id.as_deref())
                .or_else(|| {
                    loc.docker_host_name
                        .as_deref()
                        .and_then(|h| find_agent(agents, h))
                })
                .map(|a| Routing::direct(a, Some(kind)))
                .unwrap_or_default(),
        },
        ResourceType::Host
        | ResourceType::K8sCluster
        | ResourceType::K8sPod
        | ResourceType::K8sDeployment => connected(agents, loc.agent_id.as_deref())
            .or_else(|| find_agent(agents, &loc.target_host))
            .map(|a| Routing::direct(a, Some(kind)))
            .unwrap_or_default(),
    }
}

/// Route `target_host`.
///
/// Inventory wins over agent names. A name the inventory does not know
/// falls back to an agent matching by hostname or id. An empty target uses
/// the only connected agent when there is exactly one.
#[must_use]
pub fn route(
    state: Option<&StateSnapshot>,
    agents: &[ConnectedAgent],
    target_host: &str,
) -> Routing {
    if agents.is_empty() {
        return Routing::default();
    }
    let target_host = target_host.trim();
    if target_host.is_empty() {
        return match agents {
            [only] => Routing::direct(only, Some(ResourceType::Host)),
            _ => Routing::default(),
        };
    }

    if let Some(state) = state {
        let loc = resolver::resolve(state, target_host);
        if loc.found {
            let routing = route_location(agents, &loc);
            if routing.has_agent() || loc.is_guest() {
                return routing;
            }
        }
    }

    find_agent(agents, target_host)
        .map(|a| Routing::direct(a, Some(ResourceType::Host)))
        .unwrap_or_default()
}

/// Comma-separated agent hostnames for error messages.
#[must_use]
pub fn agent_list(agents: &[ConnectedAgent]) -> String {
    if agents.is_empty() {
        return "none".to_string();
    }
    agents
        .iter()
        .map(|a| a.hostname.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
