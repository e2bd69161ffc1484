//! Test fixtures: a small mixed fleet and its agents.
//!
//! ```text
//! delly   (node, agent delly-agent)
//!   ├── homepage-docker  system container 141, Docker host running `homepage`
//!   └── db-vm            VM 200
//! node1   (node, agent node1-agent, no guests)
//! minipc  (node, no agent)
//!   └── pihole           system container 120
//! nas            standalone Docker host (agent nas-agent) running `plex`
//! backup-server  standalone host (agent backup-agent)
//! c1             Kubernetes cluster (agent k8s-agent)
//! ```
//!
//! `plex` has a newer image available; `homepage` is up to date.

use chrono::{Duration, Utc};
use pulse_core::{
    ActiveAlert, ConnectedAgent, ContainerUpdate, DockerContainer, DockerHost, Guest, Host,
    KubernetesCluster, KubernetesDeployment, KubernetesPod, Node, ResolvedAlert, StateSnapshot,
};

/// Id prefix of the `homepage` container.
pub const HOMEPAGE_CONTAINER_ID: &str = "3f2a9c1b0d4e5f6a7b8c";

/// The mixed fleet described in the module docs.
#[must_use]
pub fn delly_fleet() -> StateSnapshot {
    StateSnapshot {
        nodes: vec![
            Node::new("cluster/delly", "delly"),
            Node::new("cluster/node1", "node1"),
            Node::new("cluster/minipc", "minipc"),
        ],
        containers: vec![
            Guest::container(141, "homepage-docker", "delly"),
            Guest::container(120, "pihole", "minipc"),
            Guest::container(9000, "debian-template", "delly").as_template(),
        ],
        vms: vec![Guest::vm(200, "db-vm", "delly")],
        docker_hosts: vec![
            DockerHost::new("docker-homepage", "homepage-docker", "").with_container(
                DockerContainer::new(
                    HOMEPAGE_CONTAINER_ID,
                    "homepage",
                    "ghcr.io/gethomepage/homepage",
                ),
            ),
            DockerHost::new("docker-nas", "nas", "nas-agent").with_container(
                DockerContainer::new("9b8c7d6e5f4a3b2c1d0e", "plex", "plexinc/pms"),
            ),
        ],
        hosts: vec![Host::new("host-backup", "backup-server").with_agent("backup-agent")],
        kubernetes_clusters: vec![KubernetesCluster {
            id: "k8s-c1".to_string(),
            name: "c1".to_string(),
            agent_id: "k8s-agent".to_string(),
            pods: vec![KubernetesPod {
                name: "nginx-abc".to_string(),
                namespace: "default".to_string(),
                phase: "Running".to_string(),
                node_name: "worker-1".to_string(),
                restarts: 2,
            }],
            deployments: vec![KubernetesDeployment {
                name: "nginx".to_string(),
                namespace: "default".to_string(),
                desired_replicas: 2,
                ready_replicas: 2,
            }],
        }],
        resolved_alerts: vec![test_resolved_alert()],
        updates: vec![
            ContainerUpdate {
                host_name: "nas".to_string(),
                current_digest: "sha256:1111".to_string(),
                latest_digest: "sha256:2222".to_string(),
                ..ContainerUpdate::available(
                    "docker-nas",
                    "9b8c7d6e5f4a3b2c1d0e",
                    "plex",
                    "plexinc/pms",
                )
            },
            ContainerUpdate {
                host_name: "homepage-docker".to_string(),
                update_available: false,
                ..ContainerUpdate::available(
                    "docker-homepage",
                    HOMEPAGE_CONTAINER_ID,
                    "homepage",
                    "ghcr.io/gethomepage/homepage",
                )
            },
        ],
    }
}

/// Agents connected to [`delly_fleet`].
#[must_use]
pub fn fleet_agents() -> Vec<ConnectedAgent> {
    vec![
        ConnectedAgent::new("delly-agent", "delly"),
        ConnectedAgent::new("node1-agent", "node1"),
        ConnectedAgent::new("nas-agent", "nas"),
        ConnectedAgent::new("backup-agent", "backup-server"),
        ConnectedAgent::new("k8s-agent", "k8s-master"),
    ]
}

/// A firing CPU alert on `db-vm`.
#[must_use]
pub fn test_active_alert() -> ActiveAlert {
    ActiveAlert {
        id: "alert-cpu-200".to_string(),
        resource_id: "delly-200".to_string(),
        resource_name: "db-vm".to_string(),
        kind: "cpu".to_string(),
        level: "warning".to_string(),
        message: "CPU usage above 90%".to_string(),
        value: 97.5,
        threshold: 90.0,
        started_at: Utc::now()
            .checked_sub_signed(Duration::minutes(5))
            .unwrap_or_else(Utc::now),
    }
}

/// A memory alert on `homepage-docker` that cleared.
#[must_use]
pub fn test_resolved_alert() -> ResolvedAlert {
    let resolved_at = Utc::now()
        .checked_sub_signed(Duration::minutes(10))
        .unwrap_or_else(Utc::now);
    ResolvedAlert {
        id: "alert-mem-141".to_string(),
        resource_id: "delly-141".to_string(),
        resource_name: "homepage-docker".to_string(),
        kind: "memory".to_string(),
        level: "critical".to_string(),
        message: "Memory usage above 95%".to_string(),
        started_at: resolved_at
            .checked_sub_signed(Duration::hours(1))
            .unwrap_or(resolved_at),
        resolved_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fleet_shape() {
        let fleet = delly_fleet();
        assert_eq!(fleet.guests_on_node("delly").len(), 2);
        assert!(fleet.guests_on_node("node1").is_empty());
        assert_eq!(fleet.guest_by_vmid(120).unwrap().name, "pihole");
        assert_eq!(fleet_agents().len(), 5);
    }
}
