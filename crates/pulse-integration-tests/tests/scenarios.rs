//! End-to-end tool calls through the dispatcher against the `delly` fleet.

mod common;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use common::{FleetHarness, blocked_code};
use pulse_approval::parse_approval_required;
use pulse_core::{CommandOutput, ControlLevel, TargetType};
use pulse_test::{MockTransport, delly_fleet, fleet_agents};
use pulse_tools::{ResourceType, resolve};
use serde_json::json;
use sha2::{Digest, Sha256};

#[tokio::test]
async fn read_tool_refuses_write_command_at_every_level() {
    for level in [
        ControlLevel::ReadOnly,
        ControlLevel::Suggest,
        ControlLevel::Controlled,
        ControlLevel::Autonomous,
    ] {
        let fleet = FleetHarness::new(level);
        let result = fleet
            .call(
                "pulse_read",
                json!({"action": "exec", "command": "rm -rf /", "target_host": "node1"}),
            )
            .await;
        assert_eq!(blocked_code(&result), "READ_ONLY_VIOLATION", "{level}");
        let wire = result.to_wire();
        assert_eq!(wire["details"]["command"], "rm -rf /...");
        assert_eq!(wire["is_error"], true);
        assert!(fleet.transport_untouched());
    }
}

#[tokio::test]
async fn file_write_into_system_container_uses_guest_exec() {
    let fleet = FleetHarness::new(ControlLevel::Autonomous);
    let result = fleet
        .call(
            "pulse_file_edit",
            json!({
                "action": "write",
                "path": "/opt/x.yaml",
                "content": "hello",
                "target_host": "homepage-docker",
            }),
        )
        .await;

    let body = result.as_json().unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["bytes_written"], 5);
    assert_eq!(body["verification"]["ok"], true);
    assert_eq!(body["execution"]["transport"], "pct_exec");

    let calls = fleet.transport.calls();
    let write = &calls[0];
    assert_eq!(write.agent_id, "delly-agent");
    assert_eq!(write.request.target_type, TargetType::Container);
    assert_eq!(write.request.target_id, "141");
    assert!(write.request.command.contains(&BASE64.encode("hello")));
    assert!(!write.request.command.contains("pct exec"));
    assert_eq!(
        fleet.transport.file("delly-agent", "141", "/opt/x.yaml").unwrap(),
        b"hello"
    );
}

#[tokio::test]
async fn controlled_scale_approval_is_single_use() {
    let fleet = FleetHarness::new(ControlLevel::Controlled);
    let args = json!({"type": "scale", "cluster": "c1", "deployment": "nginx", "replicas": 3});

    let first = fleet.call("pulse_kubernetes", args.clone()).await;
    let text = first.as_text().unwrap();
    assert!(text.starts_with("APPROVAL_REQUIRED: {"));
    let payload = parse_approval_required(text).unwrap();
    assert!(payload.do_not_retry);
    assert!(fleet.transport_untouched());

    let mut approved = args;
    approved["pre_approved_id"] = json!(payload.approval_id);
    let second = fleet.call("pulse_kubernetes", approved.clone()).await;
    assert!(!second.is_error());
    assert_eq!(
        fleet.transport.commands(),
        vec!["kubectl -n default scale deployment nginx --replicas=3"]
    );

    let third = fleet.call("pulse_kubernetes", approved).await;
    let fresh = parse_approval_required(third.as_text().unwrap()).unwrap();
    assert_ne!(fresh.approval_id, payload.approval_id);
    assert_eq!(fleet.transport.calls().len(), 1);
}

#[tokio::test]
async fn node_name_is_ambiguous_for_writes() {
    let fleet = FleetHarness::new(ControlLevel::Autonomous);
    let result = fleet
        .call(
            "pulse_file_edit",
            json!({"action": "write", "path": "/tmp/x", "content": "y", "target_host": "delly"}),
        )
        .await;
    assert_eq!(blocked_code(&result), "AMBIGUOUS_HOST_TARGET");
    let wire = result.to_wire();
    assert_eq!(wire["details"]["candidates"], json!(["homepage-docker", "db-vm"]));
    assert!(fleet.transport_untouched());

    // Reads on the node itself are fine.
    let read = fleet
        .call(
            "pulse_read",
            json!({"action": "exec", "command": "uptime", "target_host": "delly"}),
        )
        .await;
    assert!(!read.is_error());
}

#[tokio::test]
async fn verification_mismatch_is_a_warning() {
    let bogus = "0".repeat(64);
    let fleet = FleetHarness::builder(ControlLevel::Autonomous)
        .transport(
            MockTransport::new()
                .with_agents(fleet_agents())
                .on_command("sha256sum", CommandOutput::ok(format!("{bogus}  /etc/motd"))),
        )
        .build();
    let result = fleet
        .call(
            "pulse_file_edit",
            json!({
                "action": "write",
                "path": "/etc/motd",
                "content": "welcome",
                "target_host": "backup-server",
            }),
        )
        .await;

    let body = result.as_json().unwrap();
    assert_eq!(body["success"], true);
    let verification = &body["verification"];
    assert_eq!(verification["ok"], false);
    assert_eq!(verification["method"], "sha256");
    assert_eq!(verification["expected"], hex::encode(Sha256::digest(b"welcome")));
    assert_eq!(verification["actual"], bogus);
}

#[test]
fn every_guest_resolves_to_its_node() {
    let state = delly_fleet();
    for guest in state.guests() {
        let loc = resolve(&state, &guest.name);
        assert!(
            matches!(
                loc.resource_type,
                Some(ResourceType::Vm | ResourceType::SystemContainer)
            ),
            "{} resolved to {:?}",
            guest.name,
            loc.resource_type
        );
        assert_eq!(loc.node.as_deref(), Some(guest.node.as_str()), "{}", guest.name);
    }
}

#[tokio::test]
async fn docker_restart_confirms_through_inspect() {
    let fleet = FleetHarness::builder(ControlLevel::Autonomous)
        .transport(
            MockTransport::new()
                .with_agents(fleet_agents())
                .on_command("docker inspect", CommandOutput::ok("running true\n")),
        )
        .build();
    let result = fleet
        .call(
            "pulse_docker",
            json!({"action": "control", "container": "plex", "operation": "restart"}),
        )
        .await;
    let body = result.as_json().unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["verification"]["confirmed"], true);
    let calls = fleet.transport.calls();
    assert_eq!(calls[0].agent_id, "nas-agent");
    assert_eq!(calls[0].request.command, "docker restart 'plex'");
}

#[tokio::test]
async fn suggest_mode_describes_without_running() {
    let fleet = FleetHarness::new(ControlLevel::Suggest);
    let result = fleet
        .call(
            "pulse_control",
            json!({"type": "guest", "guest_id": "db-vm", "action": "stop"}),
        )
        .await;
    let text = result.as_text().unwrap();
    assert!(text.starts_with("SUGGESTION: "));
    assert!(text.contains("qm stop 200"));
    assert!(fleet.transport_untouched());
    assert_eq!(fleet.executor.approvals().count(), 0);
}
