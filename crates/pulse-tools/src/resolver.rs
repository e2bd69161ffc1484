//! Ordered name resolution over the fleet inventory.
//!
//! Nodes, guests, Docker hosts, Docker containers, standalone hosts, and
//! Kubernetes objects share one name space. A label such as
//! `homepage-docker` can be a system container and a Docker host at the
//! same time, so lookup walks a fixed order and stops at the first match:
//!
//! 1. node
//! 2. VM
//! 3. system container
//! 4. Docker host
//! 5. Docker container
//! 6. standalone host
//! 7. Kubernetes cluster, pod, deployment
//!
//! IDs match exactly; names and hostnames match case-insensitively; guests
//! also match by decimal vmid.

use std::fmt;

use pulse_core::{DockerHost, Guest, GuestKind, StateSnapshot};
use serde::Serialize;

/// Shortest Docker id prefix accepted as a container reference.
const MIN_ID_PREFIX: usize = 12;

/// Kind of resource a name resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceType {
    /// Standalone host running an agent.
    #[serde(rename = "host")]
    Host,
    /// Hypervisor node.
    #[serde(rename = "node")]
    Node,
    /// Virtual machine.
    #[serde(rename = "vm")]
    Vm,
    /// System container.
    #[serde(rename = "system-container")]
    SystemContainer,
    /// Docker host.
    #[serde(rename = "dockerhost")]
    DockerHost,
    /// Docker container.
    #[serde(rename = "docker")]
    Docker,
    /// Kubernetes cluster.
    #[serde(rename = "k8s_cluster")]
    K8sCluster,
    /// Kubernetes pod.
    #[serde(rename = "k8s_pod")]
    K8sPod,
    /// Kubernetes deployment.
    #[serde(rename = "k8s_deployment")]
    K8sDeployment,
}

impl ResourceType {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Node => "node",
            Self::Vm => "vm",
            Self::SystemContainer => "system-container",
            Self::DockerHost => "dockerhost",
            Self::Docker => "docker",
            Self::K8sCluster => "k8s_cluster",
            Self::K8sPod => "k8s_pod",
            Self::K8sDeployment => "k8s_deployment",
        }
    }

    /// Whether commands for this resource run inside a guest.
    #[must_use]
    pub fn is_guest(self) -> bool {
        matches!(self, Self::Vm | Self::SystemContainer)
    }
}

impl From<GuestKind> for ResourceType {
    fn from(kind: GuestKind) -> Self {
        match kind {
            GuestKind::Vm => Self::Vm,
            GuestKind::SystemContainer => Self::SystemContainer,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a Docker host itself runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DockerHostType {
    /// Inside a system container.
    Lxc,
    /// Inside a VM.
    Vm,
    /// On bare metal or an unmanaged machine.
    Standalone,
}

/// Resolver output for one name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceLocation {
    /// Whether anything matched.
    pub found: bool,
    /// The name as requested.
    pub name: String,
    /// What matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,
    /// Hypervisor node that hosts the resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Guest vmid: the guest itself, or the guest hosting a Docker host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vmid: Option<u32>,
    /// Docker host for Docker hosts and containers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_host_name: Option<String>,
    /// What the Docker host runs on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_host_type: Option<DockerHostType>,
    /// Docker container name, for Docker containers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Kubernetes cluster, for Kubernetes objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    /// Kubernetes namespace, for pods and deployments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Agent bound to the resource by inventory, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Canonical name to pass as `target_host`.
    pub target_host: String,
}

impl ResourceLocation {
    fn unresolved(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn matched(name: &str, resource_type: ResourceType, target_host: &str) -> Self {
        Self {
            found: true,
            name: name.to_string(),
            resource_type: Some(resource_type),
            target_host: target_host.to_string(),
            ..Self::default()
        }
    }

    /// Whether the resource is a VM or system container.
    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.resource_type.is_some_and(ResourceType::is_guest)
    }
}

/// Whether `name` names `guest` by name, id, or vmid.
#[must_use]
pub fn guest_matches(guest: &Guest, name: &str) -> bool {
    guest.name.eq_ignore_ascii_case(name)
        || guest.id == name
        || name.parse::<u32>().is_ok_and(|vmid| vmid == guest.vmid)
}

/// The guest a Docker host runs inside, if any.
#[must_use]
pub fn docker_host_parent<'a>(state: &'a StateSnapshot, host: &DockerHost) -> Option<&'a Guest> {
    state.guests().find(|g| {
        g.name.eq_ignore_ascii_case(&host.hostname)
            || (!host.display_name.is_empty() && g.name.eq_ignore_ascii_case(&host.display_name))
            || g.id == host.id
    })
}

pub(crate) fn docker_host_matches(host: &DockerHost, name: &str) -> bool {
    host.hostname.eq_ignore_ascii_case(name)
        || (!host.display_name.is_empty() && host.display_name.eq_ignore_ascii_case(name))
        || host.id == name
}

fn with_docker_parent(
    mut loc: ResourceLocation,
    state: &StateSnapshot,
    host: &DockerHost,
) -> ResourceLocation {
    loc.docker_host_name = Some(host.hostname.clone());
    if !host.agent_id.is_empty() {
        loc.agent_id = Some(host.agent_id.clone());
    }
    match docker_host_parent(state, host) {
        Some(parent) => {
            loc.docker_host_type = Some(match parent.kind {
                GuestKind::SystemContainer => DockerHostType::Lxc,
                GuestKind::Vm => DockerHostType::Vm,
            });
            loc.node = Some(parent.node.clone());
            loc.vmid = Some(parent.vmid);
        },
        None => loc.docker_host_type = Some(DockerHostType::Standalone),
    }
    loc
}

fn guest_location(name: &str, guest: &Guest) -> ResourceLocation {
    let mut loc = ResourceLocation::matched(name, guest.kind.into(), &guest.name);
    loc.node = Some(guest.node.clone());
    loc.vmid = Some(guest.vmid);
    loc
}

/// Resolve `name` against `state`.
#[must_use]
pub fn resolve(state: &StateSnapshot, name: &str) -> ResourceLocation {
    let name = name.trim();
    if name.is_empty() {
        return ResourceLocation::unresolved(name);
    }

    if let Some(node) = state
        .nodes
        .iter()
        .find(|n| n.name.eq_ignore_ascii_case(name) || n.id == name)
    {
        let mut loc = ResourceLocation::matched(name, ResourceType::Node, &node.name);
        loc.node = Some(node.name.clone());
        return loc;
    }

    if let Some(vm) = state.vms.iter().find(|g| guest_matches(g, name)) {
        return guest_location(name, vm);
    }

    if let Some(ct) = state.containers.iter().find(|g| guest_matches(g, name)) {
        return guest_location(name, ct);
    }

    if let Some(host) = state.docker_hosts.iter().find(|h| docker_host_matches(h, name)) {
        let loc = ResourceLocation::matched(name, ResourceType::DockerHost, &host.hostname);
        return with_docker_parent(loc, state, host);
    }

    for host in &state.docker_hosts {
        if let Some(c) = host.containers.iter().find(|c| {
            c.name.eq_ignore_ascii_case(name)
                || c.id == name
                || (name.len() >= MIN_ID_PREFIX && c.id.starts_with(name))
        }) {
            let mut loc = ResourceLocation::matched(name, ResourceType::Docker, &c.name);
            loc.container_name = Some(c.name.clone());
            return with_docker_parent(loc, state, host);
        }
    }

    if let Some(host) = state.hosts.iter().find(|h| {
        h.hostname.eq_ignore_ascii_case(name)
            || (!h.display_name.is_empty() && h.display_name.eq_ignore_ascii_case(name))
            || h.id == name
    }) {
        let mut loc = ResourceLocation::matched(name, ResourceType::Host, &host.hostname);
        loc.agent_id.clone_from(&host.agent_id);
        return loc;
    }

    for cluster in &state.kubernetes_clusters {
        let agent = (!cluster.agent_id.is_empty()).then(|| cluster.agent_id.clone());
        if cluster.name.eq_ignore_ascii_case(name) || cluster.id == name {
            let mut loc = ResourceLocation::matched(name, ResourceType::K8sCluster, &cluster.name);
            loc.cluster = Some(cluster.name.clone());
            loc.agent_id = agent;
            return loc;
        }
        let object = cluster
            .pods
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| (ResourceType::K8sPod, &p.name, &p.namespace))
            .or_else(|| {
                cluster
                    .deployments
                    .iter()
                    .find(|d| d.name.eq_ignore_ascii_case(name))
                    .map(|d| (ResourceType::K8sDeployment, &d.name, &d.namespace))
            });
        if let Some((kind, object_name, namespace)) = object {
            let mut loc = ResourceLocation::matched(name, kind, object_name);
            loc.cluster = Some(cluster.name.clone());
            loc.namespace = Some(namespace.clone());
            loc.agent_id = agent;
            return loc;
        }
    }

    ResourceLocation::unresolved(name)
}

/// Every name the resolver knows, for "did you mean" hints.
#[must_use]
pub fn known_names(state: &StateSnapshot) -> Vec<String> {
    state
        .nodes
        .iter()
        .map(|n| n.name.clone())
        .chain(state.guests().filter(|g| !g.template).map(|g| g.name.clone()))
        .chain(state.docker_hosts.iter().map(|h| h.hostname.clone()))
        .chain(state.hosts.iter().map(|h| h.hostname.clone()))
        .chain(state.kubernetes_clusters.iter().map(|c| c.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::{DockerContainer, Host, KubernetesCluster, KubernetesPod, Node};

    fn fleet() -> StateSnapshot {
        StateSnapshot {
            nodes: vec![
                Node::new("cluster-delly", "delly"),
                Node::new("cluster-minipc", "minipc"),
            ],
            containers: vec![
                Guest::container(141, "homepage-docker", "delly"),
                Guest::container(150, "pihole", "minipc"),
            ],
            vms: vec![Guest::vm(200, "db-vm", "delly"), Guest::vm(300, "win11", "minipc")],
            docker_hosts: vec![
                DockerHost::new("dh-1", "homepage-docker", "delly-agent").with_container(
                    DockerContainer::new("3f2a9c1b0d4e5f6a", "homepage", "gethomepage/homepage"),
                ),
                DockerHost::new("dh-2", "nas", "nas-agent").with_container(
                    DockerContainer::new("9b8c7d6e5f4a3b2c", "plex", "plexinc/pms-docker"),
                ),
            ],
            hosts: vec![Host::new("host-1", "backup-server").with_agent("backup-agent")],
            kubernetes_clusters: vec![KubernetesCluster {
                id: "k8s-1".to_string(),
                name: "c1".to_string(),
                agent_id: "k8s-agent".to_string(),
                pods: vec![KubernetesPod {
                    name: "nginx-abc".to_string(),
                    namespace: "default".to_string(),
                    ..KubernetesPod::default()
                }],
                deployments: Vec::new(),
            }],
            ..StateSnapshot::default()
        }
    }

    #[test]
    fn test_node_by_name_and_id() {
        let state = fleet();
        let loc = resolve(&state, "Delly");
        assert!(loc.found);
        assert_eq!(loc.resource_type, Some(ResourceType::Node));
        assert_eq!(loc.node.as_deref(), Some("delly"));
        assert_eq!(loc.target_host, "delly");

        assert_eq!(
            resolve(&state, "cluster-minipc").resource_type,
            Some(ResourceType::Node)
        );
    }

    #[test]
    fn test_guest_by_name_id_and_vmid() {
        let state = fleet();
        for name in ["db-vm", "DB-VM", "delly-200", "200"] {
            let loc = resolve(&state, name);
            assert_eq!(loc.resource_type, Some(ResourceType::Vm), "{name}");
            assert_eq!(loc.vmid, Some(200));
            assert_eq!(loc.node.as_deref(), Some("delly"));
        }
        let loc = resolve(&state, "141");
        assert_eq!(loc.resource_type, Some(ResourceType::SystemContainer));
        assert_eq!(loc.target_host, "homepage-docker");
    }

    #[test]
    fn test_system_container_beats_docker_host_of_same_name() {
        let loc = resolve(&fleet(), "homepage-docker");
        assert_eq!(loc.resource_type, Some(ResourceType::SystemContainer));
        assert_eq!(loc.vmid, Some(141));
        assert!(loc.docker_host_type.is_none());
    }

    #[test]
    fn test_docker_host_by_id_reports_parent() {
        let loc = resolve(&fleet(), "dh-1");
        assert_eq!(loc.resource_type, Some(ResourceType::DockerHost));
        assert_eq!(loc.docker_host_type, Some(DockerHostType::Lxc));
        assert_eq!(loc.node.as_deref(), Some("delly"));
        assert_eq!(loc.vmid, Some(141));

        let loc = resolve(&fleet(), "nas");
        assert_eq!(loc.docker_host_type, Some(DockerHostType::Standalone));
        assert_eq!(loc.agent_id.as_deref(), Some("nas-agent"));
        assert!(loc.node.is_none());
    }

    #[test]
    fn test_docker_container_by_name_and_id_prefix() {
        let state = fleet();
        let loc = resolve(&state, "homepage");
        assert_eq!(loc.resource_type, Some(ResourceType::Docker));
        assert_eq!(loc.container_name.as_deref(), Some("homepage"));
        assert_eq!(loc.docker_host_name.as_deref(), Some("homepage-docker"));
        assert_eq!(loc.docker_host_type, Some(DockerHostType::Lxc));
        assert_eq!(loc.vmid, Some(141));

        let loc = resolve(&state, "9b8c7d6e5f4a");
        assert_eq!(loc.container_name.as_deref(), Some("plex"));
        assert_eq!(loc.docker_host_type, Some(DockerHostType::Standalone));

        assert!(!resolve(&state, "9b8c").found);
    }

    #[test]
    fn test_standalone_host() {
        let loc = resolve(&fleet(), "BACKUP-SERVER");
        assert_eq!(loc.resource_type, Some(ResourceType::Host));
        assert_eq!(loc.agent_id.as_deref(), Some("backup-agent"));
    }

    #[test]
    fn test_kubernetes_objects_carry_cluster_agent() {
        let state = fleet();
        let loc = resolve(&state, "c1");
        assert_eq!(loc.resource_type, Some(ResourceType::K8sCluster));
        assert_eq!(loc.agent_id.as_deref(), Some("k8s-agent"));

        let loc = resolve(&state, "nginx-abc");
        assert_eq!(loc.resource_type, Some(ResourceType::K8sPod));
        assert_eq!(loc.cluster.as_deref(), Some("c1"));
        assert_eq!(loc.namespace.as_deref(), Some("default"));
        assert_eq!(loc.agent_id.as_deref(), Some("k8s-agent"));
    }

    #[test]
    fn test_unresolved() {
        let loc = resolve(&fleet(), "nope");
        assert!(!loc.found);
        assert!(loc.resource_type.is_none());
        assert_eq!(loc.name, "nope");
        assert!(!resolve(&fleet(), "  ").found);
    }

    #[test]
    fn test_every_guest_round_trips() {
        let state = fleet();
        for guest in state.guests() {
            let loc = resolve(&state, &guest.name);
            assert!(loc.is_guest(), "{}", guest.name);
            assert_eq!(loc.node.as_deref(), Some(guest.node.as_str()));
        }
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(resolve(&fleet(), "homepage")).unwrap();
        assert_eq!(value["resource_type"], "docker");
        assert_eq!(value["docker_host_type"], "lxc");
        assert!(value.get("cluster").is_none());

        let value = serde_json::to_value(resolve(&fleet(), "pihole")).unwrap();
        assert_eq!(value["resource_type"], "system-container");
    }

    #[test]
    fn test_known_names() {
        let names = known_names(&fleet());
        assert!(names.contains(&"delly".to_string()));
        assert!(names.contains(&"db-vm".to_string()));
        assert!(names.contains(&"backup-server".to_string()));
        assert!(names.contains(&"c1".to_string()));
    }
}
