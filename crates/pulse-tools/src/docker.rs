//! Docker tool: list containers, start, stop, or restart them, and manage
//! image updates.
//!
//! Update status comes from the inventory snapshot. Checks and updates are
//! queued through the update provider; the agent reports the outcome in a
//! later snapshot.

use std::future::Future;
use std::time::Duration;

use pulse_core::{
    CommandOutput, ContainerUpdate, ControlLevel, DockerContainer, DockerHost, QueuedCommand,
    StateSnapshot, ToolResult, TransportError, args, shell_escape, validate_container_name,
};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::PulseTool;
use crate::context::{Provider, ToolContext};
use crate::error::ToolError;
use crate::gate::{self, ApprovalBinding, Authorization};
use crate::output::{render_output, truncate_at_char_boundary};
use crate::remote;
use crate::resolver;
use crate::routing::{self, Routing};

const ACTIONS: &[&str] = &["list", "control", "updates", "check_updates", "update"];
const OPERATIONS: &[&str] = &["start", "stop", "restart"];
const INSPECT_ATTEMPTS: usize = 3;
const INSPECT_SETTLE: Duration = Duration::from_millis(500);
const QUEUE_ATTEMPTS: u32 = 3;
const QUEUE_RETRY_BASE: Duration = Duration::from_millis(25);
const QUEUE_RETRY_MAX: Duration = Duration::from_millis(250);

/// Built-in tool for Docker containers.
pub struct DockerTool;

#[async_trait::async_trait]
impl PulseTool for DockerTool {
    fn name(&self) -> &'static str {
        "pulse_docker"
    }

    fn description(&self) -> &'static str {
        "Docker containers across all Docker hosts. action=list shows containers with their \
         image and state; action=control starts, stops, or restarts one container and checks \
         the result with docker inspect. action=updates lists containers with a newer image, \
         action=check_updates asks a host's agent to re-check its images, and action=update \
         pulls the newest image and recreates one container. Control and update need approval \
         in controlled mode."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ACTIONS,
                    "description": "Docker action"
                },
                "container": {
                    "type": "string",
                    "description": "For control and update: container name or id"
                },
                "host": {
                    "type": "string",
                    "description": "Docker host name or id. Narrows list and updates, \
                                    disambiguates control, required for check_updates and update"
                },
                "operation": {
                    "type": "string",
                    "enum": OPERATIONS,
                    "description": "For control: what to do"
                },
                "state": {
                    "type": "string",
                    "description": "For list: only containers in this state (running, exited)"
                },
                "pre_approved_id": {
                    "type": "string",
                    "description": "Approval id returned by an earlier APPROVAL_REQUIRED response"
                }
            },
            "required": ["action"]
        })
    }

    fn required_providers(&self) -> &'static [Provider] {
        &[Provider::State]
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        docker(&args, ctx).await.unwrap_or_else(Into::into)
    }
}

async fn docker(call_args: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
    match args::require_enum(call_args, "action", ACTIONS)?.as_str() {
        "list" => list(ctx, call_args),
        "updates" => list_updates(ctx, call_args),
        "check_updates" => check_updates(ctx, call_args).await,
        "update" => update(ctx, call_args).await,
        _ => control(ctx, call_args).await,
    }
}

fn host_filter<'a>(
    state: &'a StateSnapshot,
    host: Option<&'a str>,
) -> impl Iterator<Item = &'a DockerHost> {
    state
        .docker_hosts
        .iter()
        .filter(move |h| host.is_none_or(|name| resolver::docker_host_matches(h, name)))
}

fn list(ctx: &ToolContext, call_args: &Value) -> Result<ToolResult, ToolError> {
    let state = ctx.require_state()?;
    let host = args::opt_str(call_args, "host");
    let wanted_state = args::opt_str(call_args, "state").map(str::to_ascii_lowercase);

    let mut total: usize = 0;
    let hosts: Vec<Value> = host_filter(&state, host)
        .filter_map(|h| {
            let containers: Vec<Value> = h
                .containers
                .iter()
                .filter(|c| {
                    wanted_state
                        .as_deref()
                        .is_none_or(|s| c.state.eq_ignore_ascii_case(s))
                })
                .map(|c| {
                    json!({
                        "id": truncate_at_char_boundary(&c.id, 12),
                        "name": c.name,
                        "image": c.image,
                        "state": c.state,
                        "status": c.status,
                    })
                })
                .collect();
            if containers.is_empty() {
                return None;
            }
            total = total.saturating_add(containers.len());
            Some(json!({
                "host": h.hostname,
                "host_id": h.id,
                "containers": containers,
            }))
        })
        .collect();

    if hosts.is_empty() {
        return Ok(ToolResult::text(match host {
            Some(h) => format!("No Docker containers found on host '{h}'."),
            None => "No Docker containers found.".to_string(),
        }));
    }
    Ok(ToolResult::Json(json!({"hosts": hosts, "total": total})))
}

fn find_container<'a>(
    state: &'a StateSnapshot,
    host: Option<&'a str>,
    name: &str,
) -> Option<(&'a DockerHost, &'a DockerContainer)> {
    host_filter(state, host).find_map(|h| {
        h.containers
            .iter()
            .find(|c| {
                c.name.eq_ignore_ascii_case(name)
                    || c.id == name
                    || (name.len() >= 12 && c.id.starts_with(name))
            })
            .map(|c| (h, c))
    })
}

async fn control(ctx: &ToolContext, call_args: &Value) -> Result<ToolResult, ToolError> {
    let name = args::require_str(call_args, "container")?;
    validate_container_name("container", name)?;
    let operation = args::require_enum(call_args, "operation", OPERATIONS)?;
    let host = args::opt_str(call_args, "host");

    if ctx.control_level == ControlLevel::ReadOnly {
        return Ok(ToolResult::text(
            "Docker control actions are not available in read-only mode.",
        ));
    }

    let state = ctx.require_state()?;
    let Some((docker_host, container)) = find_container(&state, host, name) else {
        return Ok(ToolResult::text(format!(
            "Could not find Docker container '{name}'{}. Use pulse_docker action=list to see \
             containers.",
            host.map(|h| format!(" on host '{h}'")).unwrap_or_default()
        )));
    };

    let command = format!("docker {operation} {}", shell_escape(&container.name));
    let binding = ApprovalBinding::new(
        command.clone(),
        "docker",
        format!("{}:{}", docker_host.id, container.name),
    )
    .with_label(docker_host.hostname.clone())
    .with_rationale(format!("{operation} Docker container {}", container.name));
    let verb = format!("{operation} Docker container {}", container.name);
    if let Authorization::Respond(result) =
        gate::authorize(ctx, call_args, &binding, &verb, &command)
    {
        return Ok(result);
    }

    ctx.require_transport()?;
    let agents = ctx.connected_agents();
    let routing = routing::route_docker_host(&state, &agents, docker_host);
    if !routing.has_agent() {
        return Ok(ToolResult::text(if routing.is_guest_exec() {
            format!(
                "Docker host '{}' is a {} but no agent is available on its node. Install the \
                 Pulse agent on the node.",
                docker_host.hostname,
                routing.target_type.as_str()
            )
        } else {
            format!(
                "No agent available on Docker host '{}'. Install the Pulse agent on the host to \
                 enable control.",
                docker_host.hostname
            )
        }));
    }

    info!(
        container = %container.name,
        host = %docker_host.hostname,
        operation = %operation,
        agent_id = %routing.agent_id,
        transport = %routing.transport,
        target_id = %routing.target_id,
        "Running Docker control command"
    );
    let output = remote::run(
        ctx,
        &routing.agent_id,
        routing.request(command.clone()),
        ctx.settings.command_timeout,
    )
    .await?;

    let success = output.success();
    let mut verification = verify_state(ctx, &routing, &container.id, &operation).await;
    verification["ok"] = json!(success);
    let body = json!({
        "success": success,
        "action": "control",
        "operation": operation,
        "container": container.name,
        "container_id": container.id,
        "host": docker_host.hostname,
        "command": command,
        "exit_code": output.exit_code,
        "output": render_output(&output.combined(), ctx.settings.max_output_chars),
        "verification": verification,
        "execution": routing.provenance(&docker_host.hostname),
    });
    if !success {
        return Ok(ToolResult::error_with_details(
            format!("{command} failed with exit code {}", output.exit_code),
            body,
        ));
    }
    Ok(ToolResult::Json(body))
}

// ---- image updates ----

fn list_updates(ctx: &ToolContext, call_args: &Value) -> Result<ToolResult, ToolError> {
    let state = ctx.require_state()?;
    let host = args::opt_str(call_args, "host");
    let host_ids: Vec<&str> = host_filter(&state, host).map(|h| h.id.as_str()).collect();
    if let Some(h) = host
        && host_ids.is_empty()
    {
        return Ok(ToolResult::text(format!("Docker host '{h}' not found.")));
    }

    let updates: Vec<&ContainerUpdate> = state
        .updates
        .iter()
        .filter(|u| u.update_available)
        .filter(|u| host.is_none() || host_ids.contains(&u.host_id.as_str()))
        .collect();
    let mut body = json!({"updates": updates, "total": updates.len()});
    if host.is_some()
        && let [id] = host_ids.as_slice()
    {
        body["host_id"] = json!(id);
    }
    Ok(ToolResult::Json(body))
}

async fn check_updates(ctx: &ToolContext, call_args: &Value) -> Result<ToolResult, ToolError> {
    let host_arg = args::require_str(call_args, "host")?;
    let Some(updates) = ctx.providers.updates.as_ref() else {
        return Ok(ToolResult::text(
            "Docker update checking is not available: the update provider is not configured.",
        ));
    };
    let state = ctx.require_state()?;
    let Some(host) = host_filter(&state, Some(host_arg)).next() else {
        return Ok(ToolResult::text(format!("Docker host '{host_arg}' not found.")));
    };

    info!(host = %host.hostname, host_id = %host.id, "Queueing Docker update check");
    let queued = queue_with_retry(ctx, "trigger update check", move || {
        updates.trigger_update_check(&host.id)
    })
    .await
    .map_err(|e| ToolError::transport("Failed to trigger update check", e))?;

    Ok(ToolResult::Json(json!({
        "success": true,
        "host_id": host.id,
        "host_name": host.hostname,
        "command_id": queued.id,
        "message": "Update check queued. Results appear after the next agent report (about 30 \
                    seconds); read them with action=updates.",
        "command": queued,
    })))
}

async fn update(ctx: &ToolContext, call_args: &Value) -> Result<ToolResult, ToolError> {
    let name = args::require_str(call_args, "container")?;
    validate_container_name("container", name)?;
    let host_arg = args::require_str(call_args, "host")?;

    if ctx.control_level == ControlLevel::ReadOnly {
        return Ok(ToolResult::text(
            "Docker update actions are not available in read-only mode.",
        ));
    }
    let Some(updates) = ctx.providers.updates.as_ref() else {
        return Ok(ToolResult::text(
            "Docker container updates are not available: the update provider is not configured.",
        ));
    };
    if !updates.update_actions_enabled() {
        return Ok(ToolResult::text(
            "Docker container updates are disabled by server configuration.",
        ));
    }

    let state = ctx.require_state()?;
    let Some((docker_host, container)) = find_container(&state, Some(host_arg), name) else {
        return Ok(ToolResult::text(format!(
            "Could not find Docker container '{name}' on host '{host_arg}'. Use pulse_docker \
             action=list to see containers."
        )));
    };
    let pending = state
        .updates
        .iter()
        .find(|u| u.host_id == docker_host.id && u.container_id == container.id);

    let command = format!("docker pull {} && recreate {}", container.image, container.name);
    let binding = ApprovalBinding::new(
        command.clone(),
        "docker",
        format!("{}:{}", docker_host.id, container.name),
    )
    .with_label(docker_host.hostname.clone())
    .with_rationale(format!(
        "Update Docker container {} to the latest {}",
        container.name, container.image
    ));
    let verb = format!("update Docker container {}", container.name);
    if let Authorization::Respond(result) =
        gate::authorize(ctx, call_args, &binding, &verb, &command)
    {
        return Ok(result);
    }

    info!(
        container = %container.name,
        host = %docker_host.hostname,
        image = %container.image,
        "Queueing Docker container update"
    );
    let queued = queue_with_retry(ctx, "queue container update", move || {
        updates.update_container(&docker_host.id, &container.id, &container.name)
    })
    .await
    .map_err(|e| ToolError::transport("Failed to queue update command", e))?;

    Ok(ToolResult::Json(json!({
        "success": true,
        "action": "update",
        "host_id": docker_host.id,
        "host": docker_host.hostname,
        "container_id": container.id,
        "container_name": container.name,
        "image": container.image,
        "update_available": pending.map(|u| u.update_available),
        "command_id": queued.id,
        "message": format!(
            "Update queued for container '{}'. The agent will pull the latest image and \
             recreate the container.",
            container.name
        ),
        "command": queued,
    })))
}

/// Run `queue` until it succeeds, fails for good, or runs out of attempts.
/// Only transient errors are retried, with a capped exponential backoff.
async fn queue_with_retry<F, Fut>(
    ctx: &ToolContext,
    operation: &str,
    mut queue: F,
) -> Result<QueuedCommand, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<QueuedCommand, TransportError>>,
{
    let mut attempt: u32 = 1;
    loop {
        let err = match queue().await {
            Ok(queued) => return Ok(queued),
            Err(e) => e,
        };
        if !err.is_transient() || attempt >= QUEUE_ATTEMPTS {
            return Err(err);
        }
        let backoff = retry_delay(attempt);
        warn!(
            operation,
            attempt,
            retry_in = ?backoff,
            error = %err,
            "Transient update queue failure, retrying"
        );
        tokio::select! {
            () = ctx.cancel.cancelled() => return Err(TransportError::Cancelled),
            () = tokio::time::sleep(backoff) => {}
        }
        attempt = attempt.saturating_add(1);
    }
}

fn retry_delay(attempt: u32) -> Duration {
    QUEUE_RETRY_BASE
        .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
        .min(QUEUE_RETRY_MAX)
}

/// `(status, running)` from `docker inspect -f '{{.State.Status}} {{.State.Running}}'`.
fn parse_inspect(output: &CommandOutput) -> Option<(String, bool)> {
    let text = output.combined().to_ascii_lowercase();
    let mut fields = text.split_whitespace();
    let status = fields.next()?.to_string();
    let running = fields.next() == Some("true");
    Some((status, running))
}

/// Poll `docker inspect` until the container reaches the expected state.
async fn verify_state(
    ctx: &ToolContext,
    routing: &Routing,
    container_id: &str,
    operation: &str,
) -> Value {
    let expect_running = operation != "stop";
    let command = format!(
        "docker inspect -f '{{{{.State.Status}}}} {{{{.State.Running}}}}' {}",
        shell_escape(container_id)
    );

    let mut last: Option<(String, bool)> = None;
    for attempt in 1..=INSPECT_ATTEMPTS {
        let output = match remote::run(
            ctx,
            &routing.agent_id,
            routing.request(command.clone()),
            ctx.settings.verify_timeout,
        )
        .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!(container_id, error = %e, "docker inspect failed");
                return json!({
                    "confirmed": false,
                    "method": "docker_inspect",
                    "command": command,
                    "note": e.to_string(),
                });
            },
        };
        let observed = if output.success() {
            parse_inspect(&output)
        } else {
            None
        };
        if let Some((status, running)) = &observed
            && *running == expect_running
        {
            debug!(container_id, attempt, status = %status, "Docker state confirmed");
            return json!({
                "confirmed": true,
                "method": "docker_inspect",
                "command": command,
                "expected": {"running": expect_running},
                "observed": {"status": status, "running": running},
            });
        }
        last = observed;
        if attempt < INSPECT_ATTEMPTS {
            tokio::select! {
                () = ctx.cancel.cancelled() => break,
                () = tokio::time::sleep(INSPECT_SETTLE) => {}
            }
        }
    }

    warn!(container_id, expect_running, "Docker state not confirmed");
    json!({
        "confirmed": false,
        "method": "docker_inspect",
        "command": command,
        "expected": {"running": expect_running},
        "observed": last.map(|(status, running)| json!({"status": status, "running": running})),
    })
}
