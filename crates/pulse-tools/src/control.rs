//! Control tool: guest lifecycle and arbitrary commands on fleet targets.
//!
//! Guest lifecycle (`pct`/`qm`) runs on the hypervisor node itself. Commands
//! run wherever the target routes to, which for a guest means inside it.

use pulse_core::{
    CommandOutput, CommandRequest, Guest, StateSnapshot, TargetType, ToolResult, args,
    validate_container_name, wrap_docker_exec,
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::PulseTool;
use crate::context::{Provider, ToolContext};
use crate::error::ToolError;
use crate::file_ops;
use crate::gate::{self, ApprovalBinding, Authorization};
use crate::guard;
use crate::output::render_output;
use crate::remote;
use crate::resolver::{self, ResourceType};
use crate::routing::{self, Routing};

const TYPES: &[&str] = &["guest", "command"];
const GUEST_ACTIONS: &[&str] = &["start", "stop", "shutdown", "restart", "delete"];

/// Built-in tool for changing the state of the fleet.
pub struct ControlTool;

#[async_trait::async_trait]
impl PulseTool for ControlTool {
    fn name(&self) -> &'static str {
        "pulse_control"
    }

    fn description(&self) -> &'static str {
        "Changes infrastructure. type=guest starts, stops, shuts down, restarts, or deletes a \
         VM or system container by name or VMID. type=command runs a shell command on a node, \
         guest, Docker host, or host. Needs approval in controlled mode. Prefer pulse_read for \
         anything that only looks."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": TYPES,
                    "description": "guest for lifecycle actions, command for a shell command"
                },
                "guest_id": {
                    "type": "string",
                    "description": "For guest: VMID or name"
                },
                "action": {
                    "type": "string",
                    "enum": GUEST_ACTIONS,
                    "description": "For guest: lifecycle action"
                },
                "force": {
                    "type": "boolean",
                    "description": "For guest stop: skip the lock check"
                },
                "command": {
                    "type": "string",
                    "description": "For command: the shell command"
                },
                "target_host": {
                    "type": "string",
                    "description": "For command: where to run it. Optional with a single agent"
                },
                "docker_container": {
                    "type": "string",
                    "description": "For command: run inside this Docker container on the target. \
                                    Implied when target_host names a Docker container"
                },
                "rationale": {
                    "type": "string",
                    "description": "Why the change is needed, shown to the approver"
                },
                "pre_approved_id": {
                    "type": "string",
                    "description": "Approval id returned by an earlier APPROVAL_REQUIRED response"
                }
            },
            "required": ["type"]
        })
    }

    fn require_control(&self) -> bool {
        true
    }

    fn required_providers(&self) -> &'static [Provider] {
        &[Provider::Transport, Provider::State]
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        control(&args, ctx).await.unwrap_or_else(Into::into)
    }
}

async fn control(call_args: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
    match args::require_enum(call_args, "type", TYPES)?.as_str() {
        "guest" => control_guest(ctx, call_args).await,
        _ => run_command(ctx, call_args).await,
    }
}

fn with_rationale(binding: ApprovalBinding, call_args: &Value) -> ApprovalBinding {
    match args::opt_str(call_args, "rationale") {
        Some(r) => binding.with_rationale(r),
        None => binding,
    }
}

// ---- type=command ----

/// Approval binding for a command: host targets bind to the agent, guest
/// targets to their vmid.
fn command_binding(command: &str, target_host: &str, routing: &Routing) -> ApprovalBinding {
    let target_id = if routing.target_type == TargetType::Host {
        routing.agent_id.clone()
    } else {
        routing.target_id.clone()
    };
    let label = if target_host.is_empty() {
        routing.agent_hostname.clone()
    } else {
        target_host.to_string()
    };
    let risk_target = if routing.resolved_kind == Some(ResourceType::Node) {
        "node"
    } else {
        routing.target_type.as_str()
    };
    ApprovalBinding::new(command, routing.target_type.as_str(), target_id)
        .with_label(label)
        .with_risk_target(risk_target)
}

async fn run_command(ctx: &ToolContext, call_args: &Value) -> Result<ToolResult, ToolError> {
    let command = args::require_str(call_args, "command")?;
    let target_host = args::opt_str(call_args, "target_host").unwrap_or_default();
    let explicit_container = args::opt_str(call_args, "docker_container");
    if let Some(name) = explicit_container {
        validate_container_name("docker_container", name)?;
    }

    guard::check_command_allowed(ctx, command)?;

    let state = ctx.snapshot();
    let agents = ctx.connected_agents();
    if target_host.is_empty() {
        if agents.len() > 1 {
            return Ok(ToolResult::text(format!(
                "target_host is required: {} agents are connected ({}). Specify which host to \
                 run on.",
                agents.len(),
                routing::agent_list(&agents)
            )));
        }
    } else {
        if let Some(state) = &state {
            guard::check_ambiguous_node(state, &agents, target_host)?;
        }
        guard::check_strict_resolution(ctx, state.as_ref(), &agents, target_host, "command")?;
    }

    let routing = routing::route(state.as_ref(), &agents, target_host);
    guard::check_write_context(ctx, target_host, &routing)?;
    if !routing.has_agent() {
        return Err(file_ops::no_agent(target_host, ctx));
    }

    let container = file_ops::effective_container(ctx, target_host, explicit_container);
    let wire_command = match &container {
        Some(c) => wrap_docker_exec(c, command),
        None => command.to_string(),
    };

    let binding = with_rationale(command_binding(&wire_command, target_host, &routing), call_args);
    if let Authorization::Respond(result) =
        gate::authorize(ctx, call_args, &binding, "run command", &wire_command)
    {
        return Ok(result);
    }

    info!(
        target_host,
        agent_id = %routing.agent_id,
        transport = %routing.transport,
        target_id = %routing.target_id,
        docker_container = ?container,
        "Running control command"
    );
    let output = remote::run(
        ctx,
        &routing.agent_id,
        routing.request(wire_command.as_str()),
        ctx.settings.command_timeout,
    )
    .await?;

    let success = output.success();
    let shown_host = if target_host.is_empty() {
        routing.agent_hostname.as_str()
    } else {
        target_host
    };
    let mut body = json!({
        "success": success,
        "type": "command",
        "command": command,
        "target_host": shown_host,
        "exit_code": output.exit_code,
        "output": render_output(&output.combined(), ctx.settings.max_output_chars),
        "verification": {"ok": success, "method": "exit_code", "exit_code": output.exit_code},
        "execution": routing.provenance(target_host),
    });
    if let Some(c) = &container {
        body["docker_container"] = json!(c);
    }
    if !success {
        return Ok(ToolResult::error_with_details(
            format!("Command failed with exit code {}", output.exit_code),
            body,
        ));
    }
    Ok(ToolResult::Json(body))
}

// ---- type=guest ----

fn find_guest<'a>(state: &'a StateSnapshot, guest_id: &str) -> Option<&'a Guest> {
    state
        .guests()
        .find(|g| resolver::guest_matches(g, guest_id))
}

fn lifecycle_command(guest: &Guest, action: &str, force: bool) -> String {
    let tool = guest.kind.cli();
    let vmid = guest.vmid;
    match action {
        "start" => format!("{tool} start {vmid}"),
        "stop" if force => format!("{tool} stop {vmid} --skiplock"),
        "stop" => format!("{tool} stop {vmid}"),
        "shutdown" => format!("{tool} shutdown {vmid}"),
        "restart" => format!("{tool} reboot {vmid}"),
        _ => format!("{tool} destroy {vmid} --purge"),
    }
}

fn expected_state(action: &str) -> &'static str {
    match action {
        "start" | "restart" => "running",
        "stop" | "shutdown" => "stopped",
        _ => "deleted",
    }
}

/// Whether the failure just means the guest is already where we want it.
fn already_done(action: &str, output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    match action {
        "stop" | "shutdown" => lower.contains("not running"),
        "start" => lower.contains("already running"),
        _ => false,
    }
}

async fn control_guest(ctx: &ToolContext, call_args: &Value) -> Result<ToolResult, ToolError> {
    let guest_id = args::require_str(call_args, "guest_id")?;
    let action = args::require_enum(call_args, "action", GUEST_ACTIONS)?;
    let force = args::flag(call_args, "force");

    let state = ctx.require_state()?;
    let agents = ctx.connected_agents();
    guard::check_strict_resolution(ctx, Some(&state), &agents, guest_id, &action)?;
    let Some(guest) = find_guest(&state, guest_id) else {
        return Ok(ToolResult::error(format!(
            "Could not find guest '{guest_id}'. Use pulse_query action=search to find it."
        )));
    };

    if ctx.settings.is_protected(guest.vmid, &guest.name) {
        return Ok(ToolResult::error(format!(
            "Guest {} (VMID {}) is protected and cannot be controlled by Pulse Assistant.",
            guest.name, guest.vmid
        )));
    }
    if action == "delete" && guest.status != "stopped" {
        return Ok(ToolResult::error(format!(
            "Cannot delete {} (VMID {}) - it is currently {}. Stop it first, then try deleting \
             again.",
            guest.name, guest.vmid, guest.status
        )));
    }

    let command = lifecycle_command(guest, &action, force);
    let Some(agent) = routing::agent_for_node(&agents, &guest.node) else {
        return Ok(ToolResult::error(format!(
            "No agent available on node '{}'. Install the Pulse agent on the node to enable \
             control.",
            guest.node
        )));
    };
    let routing = Routing {
        agent_id: agent.agent_id.clone(),
        agent_hostname: agent.hostname.clone(),
        resolved_kind: Some(ResourceType::Node),
        resolved_node: Some(guest.node.clone()),
        ..Routing::default()
    };

    let binding = ApprovalBinding::new(
        command.clone(),
        guest.kind.short_name(),
        format!("{}:{}", guest.node, guest.vmid),
    )
    .with_label(guest.node.clone())
    .with_risk_target("node")
    .with_rationale(
        args::opt_str(call_args, "rationale")
            .map_or_else(|| format!("{action} guest {}", guest.name), str::to_string),
    );
    let verb = format!("{action} guest {} (VMID {})", guest.name, guest.vmid);
    if let Authorization::Respond(result) =
        gate::authorize(ctx, call_args, &binding, &verb, &command)
    {
        return Ok(result);
    }

    info!(
        guest = %guest.name,
        vmid = guest.vmid,
        node = %guest.node,
        action = %action,
        agent_id = %routing.agent_id,
        "Running guest lifecycle command"
    );
    let mut output = remote::run(
        ctx,
        &routing.agent_id,
        CommandRequest::host(command.clone()),
        ctx.settings.command_timeout,
    )
    .await?;

    let mut text = output.combined();
    if !output.success() && already_done(&action, &text) {
        output.exit_code = 0;
        text.push_str("\n(idempotent: desired state already set)");
    }
    let success = output.success();
    let mut verification = verify_guest(ctx, &routing.agent_id, guest, &action).await;
    verification["ok"] = json!(success);

    let body = json!({
        "success": success,
        "type": "guest",
        "guest": guest.name,
        "guest_id": guest.vmid.to_string(),
        "guest_type": guest.kind.short_name(),
        "node": guest.node,
        "action": action,
        "command": command,
        "exit_code": output.exit_code,
        "output": render_output(&text, ctx.settings.max_output_chars),
        "verification": verification,
        "execution": routing.provenance(&guest.name),
    });
    if !success {
        return Ok(ToolResult::error_with_details(
            format!("{} failed with exit code {}", command, output.exit_code),
            body,
        ));
    }
    Ok(ToolResult::Json(body))
}

/// Ask the hypervisor for the guest's status after a lifecycle action.
async fn verify_guest(ctx: &ToolContext, agent_id: &str, guest: &Guest, action: &str) -> Value {
    let command = format!("{} status {}", guest.kind.cli(), guest.vmid);
    let expected = expected_state(action);
    let output: CommandOutput = match remote::run(
        ctx,
        agent_id,
        CommandRequest::host(command.clone()),
        ctx.settings.verify_timeout,
    )
    .await
    {
        Ok(output) => output,
        Err(e) => {
            warn!(vmid = guest.vmid, error = %e, "Guest status check failed");
            return json!({
                "confirmed": false,
                "method": "status",
                "command": command,
                "expected": expected,
                "note": e.to_string(),
            });
        },
    };
    let raw = output.combined();
    let lower = raw.to_ascii_lowercase();

    let (confirmed, observed) = if action == "delete" {
        let gone = !output.success()
            && ["does not exist", "no such", "not found"]
                .iter()
                .any(|m| lower.contains(m));
        (gone, if gone { "deleted" } else { "present" })
    } else {
        let observed = if lower.contains("status: running") {
            "running"
        } else if lower.contains("status: stopped") {
            "stopped"
        } else {
            ""
        };
        (output.success() && observed == expected, observed)
    };
    if !confirmed {
        warn!(vmid = guest.vmid, expected, observed, "Guest state not confirmed");
    }
    json!({
        "confirmed": confirmed,
        "method": "status",
        "command": command,
        "expected": expected,
        "observed": observed,
    })
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
