//! Fleet inventory model.
//!
//! A [`StateSnapshot`] is served by the external state provider. The core
//! treats it as read-only and assumes every `get_state()` call may return a
//! newer snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the fleet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSnapshot {
    /// Hypervisor nodes.
    pub nodes: Vec<Node>,
    /// Virtual machines.
    pub vms: Vec<Guest>,
    /// System containers.
    pub containers: Vec<Guest>,
    /// Docker hosts with their containers.
    pub docker_hosts: Vec<DockerHost>,
    /// Physical or standalone hosts running an agent.
    pub hosts: Vec<Host>,
    /// Managed Kubernetes clusters.
    pub kubernetes_clusters: Vec<KubernetesCluster>,
    /// Recently resolved alerts.
    pub resolved_alerts: Vec<ResolvedAlert>,
    /// Image update status reported by Docker agents.
    pub updates: Vec<ContainerUpdate>,
}

impl StateSnapshot {
    /// Every guest, system containers first, then VMs, in snapshot order.
    pub fn guests(&self) -> impl Iterator<Item = &Guest> {
        self.containers.iter().chain(self.vms.iter())
    }

    /// Non-template guests hosted on `node`, system containers first.
    #[must_use]
    pub fn guests_on_node(&self, node: &str) -> Vec<&Guest> {
        self.guests()
            .filter(|g| !g.template && g.node.eq_ignore_ascii_case(node))
            .collect()
    }

    /// Look up a guest by vmid.
    #[must_use]
    pub fn guest_by_vmid(&self, vmid: u32) -> Option<&Guest> {
        self.guests().find(|g| g.vmid == vmid)
    }
}

/// A hypervisor node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    /// Stable identifier (e.g. `cluster-delly`).
    pub id: String,
    /// Display name, also the node's hostname.
    pub name: String,
    /// `online` / `offline`.
    pub status: String,
}

impl Node {
    /// Create an online node.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: "online".to_string(),
        }
    }
}

/// Kind of guest hosted on a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuestKind {
    /// Full virtual machine (`qm`).
    #[default]
    Vm,
    /// System container (`pct`).
    SystemContainer,
}

impl GuestKind {
    /// Resource-type string reported by the resolver.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vm => "vm",
            Self::SystemContainer => "system-container",
        }
    }

    /// Lifecycle CLI on the hypervisor.
    #[must_use]
    pub fn cli(self) -> &'static str {
        match self {
            Self::Vm => "qm",
            Self::SystemContainer => "pct",
        }
    }

    /// Short type used in approval bindings and tool arguments.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Vm => "vm",
            Self::SystemContainer => "container",
        }
    }
}

/// A VM or system container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guest {
    /// Stable identifier (e.g. `delly-141`).
    pub id: String,
    /// Numeric guest id on the hypervisor.
    pub vmid: u32,
    /// Guest name.
    pub name: String,
    /// Name of the hosting node.
    pub node: String,
    /// VM or system container.
    pub kind: GuestKind,
    /// `running` / `stopped` / `paused`.
    pub status: String,
    /// Templates are never execution targets.
    pub template: bool,
}

impl Guest {
    /// Create a running system container.
    #[must_use]
    pub fn container(vmid: u32, name: impl Into<String>, node: impl Into<String>) -> Self {
        Self::new(GuestKind::SystemContainer, vmid, name, node)
    }

    /// Create a running VM.
    #[must_use]
    pub fn vm(vmid: u32, name: impl Into<String>, node: impl Into<String>) -> Self {
        Self::new(GuestKind::Vm, vmid, name, node)
    }

    fn new(kind: GuestKind, vmid: u32, name: impl Into<String>, node: impl Into<String>) -> Self {
        let node = node.into();
        Self {
            id: format!("{node}-{vmid}"),
            vmid,
            name: name.into(),
            node,
            kind,
            status: "running".to_string(),
            template: false,
        }
    }

    /// Set the guest status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Mark the guest as a template.
    #[must_use]
    pub fn as_template(mut self) -> Self {
        self.template = true;
        self
    }
}

/// A machine running a Docker daemon with an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerHost {
    /// Stable identifier.
    pub id: String,
    /// Agent reporting this host.
    pub agent_id: String,
    /// Hostname reported by the agent.
    pub hostname: String,
    /// Optional friendly name.
    pub display_name: String,
    /// Containers on this host.
    pub containers: Vec<DockerContainer>,
}

impl DockerHost {
    /// Create a Docker host.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        hostname: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            hostname: hostname.into(),
            display_name: String::new(),
            containers: Vec::new(),
        }
    }

    /// Add a container.
    #[must_use]
    pub fn with_container(mut self, container: DockerContainer) -> Self {
        self.containers.push(container);
        self
    }
}

/// An application container on a Docker host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerContainer {
    /// Container id.
    pub id: String,
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// `running` / `exited` / `paused`.
    pub state: String,
    /// Human-readable status (`Up 3 hours`).
    pub status: String,
}

impl DockerContainer {
    /// Create a running container.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: image.into(),
            state: "running".to_string(),
            status: "Up".to_string(),
        }
    }
}

/// A physical or standalone host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Host {
    /// Stable identifier.
    pub id: String,
    /// Hostname.
    pub hostname: String,
    /// Optional friendly name.
    pub display_name: String,
    /// Agent running on the host, if any.
    pub agent_id: Option<String>,
    /// Operating system / platform string.
    pub platform: String,
    /// `online` / `offline`.
    pub status: String,
}

impl Host {
    /// Create an online host.
    #[must_use]
    pub fn new(id: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            display_name: String::new(),
            agent_id: None,
            platform: "linux".to_string(),
            status: "online".to_string(),
        }
    }

    /// Set the agent id.
    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }
}

/// A managed Kubernetes cluster reported by an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesCluster {
    /// Stable identifier.
    pub id: String,
    /// Cluster name.
    pub name: String,
    /// Agent with `kubectl` access.
    pub agent_id: String,
    /// Pods.
    pub pods: Vec<KubernetesPod>,
    /// Deployments.
    pub deployments: Vec<KubernetesDeployment>,
}

/// A Kubernetes pod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesPod {
    /// Pod name.
    pub name: String,
    /// Namespace.
    pub namespace: String,
    /// Pod phase.
    pub phase: String,
    /// Node the pod is scheduled on.
    pub node_name: String,
    /// Total container restarts.
    pub restarts: u32,
}

/// A Kubernetes deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesDeployment {
    /// Deployment name.
    pub name: String,
    /// Namespace.
    pub namespace: String,
    /// Desired replica count.
    pub desired_replicas: u32,
    /// Ready replica count.
    pub ready_replicas: u32,
}

/// An alert that has been resolved recently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAlert {
    /// Alert id.
    pub id: String,
    /// Affected resource id.
    pub resource_id: String,
    /// Affected resource name.
    pub resource_name: String,
    /// Alert type (`cpu`, `memory`, `disk`, ...).
    pub kind: String,
    /// `warning` / `critical`.
    pub level: String,
    /// Alert message.
    pub message: String,
    /// When the alert fired.
    pub started_at: DateTime<Utc>,
    /// When the alert cleared.
    pub resolved_at: DateTime<Utc>,
}

/// Image update status of one Docker container, as last reported by its
/// agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerUpdate {
    /// Docker host id.
    pub host_id: String,
    /// Docker host name.
    pub host_name: String,
    /// Container id.
    pub container_id: String,
    /// Container name.
    pub container_name: String,
    /// Image reference the container runs.
    pub image: String,
    /// Digest of the running image.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub current_digest: String,
    /// Digest of the newest image in the registry.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub latest_digest: String,
    /// Whether a newer image exists.
    pub update_available: bool,
    /// When the agent last checked.
    pub last_checked: Option<DateTime<Utc>>,
    /// Registry or agent error from the last check.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ContainerUpdate {
    /// A pending update for `container_name` on `host_id`.
    #[must_use]
    pub fn available(
        host_id: impl Into<String>,
        container_id: impl Into<String>,
        container_name: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            host_id: host_id.into(),
            container_id: container_id.into(),
            container_name: container_name.into(),
            image: image.into(),
            update_available: true,
            ..Self::default()
        }
    }
}

/// A currently firing alert served by the alert provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveAlert {
    /// Alert id.
    pub id: String,
    /// Affected resource id.
    pub resource_id: String,
    /// Affected resource name.
    pub resource_name: String,
    /// Alert type.
    pub kind: String,
    /// `warning` / `critical`.
    pub level: String,
    /// Alert message.
    pub message: String,
    /// Current metric value.
    pub value: f64,
    /// Threshold that was crossed.
    pub threshold: f64,
    /// When the alert fired.
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guests_on_node_orders_containers_first() {
        let state = StateSnapshot {
            vms: vec![Guest::vm(200, "db-vm", "delly")],
            containers: vec![
                Guest::container(141, "homepage-docker", "delly"),
                Guest::container(900, "tmpl", "delly").as_template(),
                Guest::container(150, "other", "minipc"),
            ],
            ..StateSnapshot::default()
        };

        let names: Vec<_> = state
            .guests_on_node("Delly")
            .iter()
            .map(|g| g.name.as_str())
            .collect();
        assert_eq!(names, vec!["homepage-docker", "db-vm"]);
    }

    #[test]
    fn test_guest_kind_strings() {
        assert_eq!(GuestKind::SystemContainer.as_str(), "system-container");
        assert_eq!(GuestKind::SystemContainer.cli(), "pct");
        assert_eq!(GuestKind::Vm.cli(), "qm");
        assert_eq!(GuestKind::Vm.short_name(), "vm");
    }

    #[test]
    fn test_snapshot_deserializes_with_missing_sections() {
        let state: StateSnapshot =
            serde_json::from_str(r#"{"nodes":[{"id":"n1","name":"delly"}]}"#).unwrap();
        assert_eq!(state.nodes.len(), 1);
        assert!(state.vms.is_empty());
        assert_eq!(state.guest_by_vmid(1), None);
    }
}
