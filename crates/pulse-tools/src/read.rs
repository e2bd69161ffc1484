//! Read tool: read-only commands, files, and logs on fleet targets.
//!
//! Every command, including the ones built by the `find`, `tail`, and
//! `logs` helpers, passes the sensitive-command gate and the read-only
//! classifier before anything reaches an agent.

use pulse_core::{
    Blocked, BlockedCode, ToolResult, args, shell_escape, validate_container_name,
    wrap_docker_exec,
};
use pulse_safety::{BlockCategory, Classification, CommandIntent, check_command, check_path};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::PulseTool;
use crate::context::{Provider, ToolContext};
use crate::error::ToolError;
use crate::file_ops;
use crate::guard;
use crate::output::{render_output, truncate_at_char_boundary};
use crate::remote;
use crate::routing;

const ACTIONS: &[&str] = &["exec", "file", "find", "tail", "logs"];

/// Built-in tool for read-only access to fleet targets.
pub struct ReadTool;

#[async_trait::async_trait]
impl PulseTool for ReadTool {
    fn name(&self) -> &'static str {
        "pulse_read"
    }

    fn description(&self) -> &'static str {
        "Runs read-only operations on infrastructure: exec (a read-only shell command), file \
         (read a file), find (locate files by pattern), tail (last lines of a file), logs \
         (docker or journal). Write commands are rejected. target_host routes to a node, \
         system container, VM, Docker container, or host by name."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ACTIONS,
                    "description": "Read action"
                },
                "target_host": {
                    "type": "string",
                    "description": "Where to read: node, guest, Docker container, or host name"
                },
                "command": {
                    "type": "string",
                    "description": "For exec: the read-only shell command to run"
                },
                "path": {
                    "type": "string",
                    "description": "For file/tail: absolute file path. For find: directory or glob"
                },
                "pattern": {
                    "type": "string",
                    "description": "For find: file name glob"
                },
                "lines": {
                    "type": "integer",
                    "description": "For tail/logs: number of lines (default 100, max 1000)"
                },
                "source": {
                    "type": "string",
                    "enum": ["docker", "journal"],
                    "description": "For logs: where logs come from"
                },
                "container": {
                    "type": "string",
                    "description": "For logs with source=docker: container name"
                },
                "unit": {
                    "type": "string",
                    "description": "For logs with source=journal: systemd unit"
                },
                "since": {
                    "type": "string",
                    "description": "For logs: time filter (e.g. '1h', '2024-01-01')"
                },
                "grep": {
                    "type": "string",
                    "description": "For logs/tail: only lines matching this text"
                },
                "docker_container": {
                    "type": "string",
                    "description": "Run inside this Docker container on target_host"
                }
            },
            "required": ["action", "target_host"]
        })
    }

    fn required_providers(&self) -> &'static [Provider] {
        &[Provider::Transport]
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        read(&args, ctx).await.unwrap_or_else(Into::into)
    }
}

async fn read(call_args: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
    let action = args::require_enum(call_args, "action", ACTIONS)?;
    match action.as_str() {
        "exec" => {
            let command = args::require_str(call_args, "command")?;
            exec(ctx, call_args, command).await
        },
        "file" => file_ops::read_file(ctx, call_args).await,
        "find" => find(ctx, call_args).await,
        "tail" => tail(ctx, call_args).await,
        _ => logs(ctx, call_args).await,
    }
}

fn lines(call_args: &Value) -> Result<u32, ToolError> {
    Ok(args::clamp_count(args::opt_int(call_args, "lines")?, 100, 1, 1000))
}

fn grep_suffix(call_args: &Value, merge_stderr: bool) -> String {
    match args::opt_str(call_args, "grep") {
        Some(p) if merge_stderr => format!(" 2>&1 | grep -i {}", shell_escape(p)),
        Some(p) => format!(" | grep -i {}", shell_escape(p)),
        None => String::new(),
    }
}

async fn find(ctx: &ToolContext, call_args: &Value) -> Result<ToolResult, ToolError> {
    let search = args::opt_str(call_args, "pattern")
        .or_else(|| args::opt_str(call_args, "path"))
        .ok_or_else(|| {
            ToolError::InvalidArguments("pattern or path is required for find".to_string())
        })?;
    let (dir, name) = match search.rfind('/') {
        Some(0) => ("/", &search[1..]),
        Some(i) => (&search[..i], &search[i.saturating_add(1)..]),
        None => ("/", search),
    };
    let name = if name.is_empty() { "*" } else { name };
    let command = format!(
        "find {} -maxdepth 3 -name {} -type f 2>/dev/null | head -50",
        shell_escape(dir),
        shell_escape(name)
    );
    exec(ctx, call_args, &command).await
}

async fn tail(ctx: &ToolContext, call_args: &Value) -> Result<ToolResult, ToolError> {
    let path = args::require_str(call_args, "path")?;
    if !path.starts_with('/') {
        return Err(ToolError::InvalidArguments(format!(
            "path must be absolute, got '{path}'"
        )));
    }
    if let Some(found) = check_path(path) {
        return Err(guard::sensitive_block(found));
    }
    let command = format!(
        "tail -n {} {}{}",
        lines(call_args)?,
        shell_escape(path),
        grep_suffix(call_args, false)
    );
    exec(ctx, call_args, &command).await
}

async fn logs(ctx: &ToolContext, call_args: &Value) -> Result<ToolResult, ToolError> {
    let lines = lines(call_args)?;
    let container = args::opt_str(call_args, "container");
    let since = args::opt_str(call_args, "since").map(shell_escape);
    let source = args::opt_str(call_args, "source")
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| if container.is_some() { "docker" } else { "journal" }.to_string());

    let command = match (source.as_str(), container) {
        ("docker", None) => {
            // No container named: list what is running instead.
            format!(
                "docker ps --format '{{{{.Names}}}}\t{{{{.Status}}}}' | head -20{}",
                grep_suffix(call_args, false)
            )
        },
        ("docker", Some(container)) => {
            validate_container_name("container", container)?;
            let since = since.map(|s| format!("--since {s} ")).unwrap_or_default();
            format!(
                "docker logs {since}--tail {lines} {}{}",
                shell_escape(container),
                grep_suffix(call_args, true)
            )
        },
        (other, _) => {
            if other != "journal" {
                warn!(source = other, "Unknown log source, reading the journal");
            }
            let unit = args::opt_str(call_args, "unit")
                .map(|u| format!("-u {} ", shell_escape(u)))
                .unwrap_or_default();
            let since = since.map(|s| format!("--since {s} ")).unwrap_or_default();
            format!(
                "journalctl {unit}{since}-n {lines} --no-pager{}",
                grep_suffix(call_args, true)
            )
        },
    };
    exec(ctx, call_args, &command).await
}

fn excerpt(command: &str, max: usize) -> String {
    truncate_at_char_boundary(command, max)
}

fn violation_hint(c: &Classification) -> &'static str {
    match c.category {
        Some(BlockCategory::TtyFlag) => "Tools have no terminal. Drop the -i/-t flags.",
        Some(BlockCategory::Pager) => "Pagers wait for input. Use cat, head, or tail instead.",
        Some(BlockCategory::UnboundedStream) => {
            "Following output never ends. Bound it with -n, --tail, or --no-stream."
        },
        Some(BlockCategory::InteractiveRepl) => {
            "Interactive shells wait for input. Pass the query inline (-c, -e, or a script)."
        },
        Some(BlockCategory::Redirect) => {
            "Read-only commands cannot write files. Drop the redirect."
        },
        Some(BlockCategory::Substitution) => {
            "Command substitution cannot be checked. Run each command on its own."
        },
        Some(BlockCategory::Privilege) => "Read-only commands do not need sudo or su.",
        Some(BlockCategory::WriteVerb | BlockCategory::UnknownBinary) | None => {
            "This command may change the system or is not known to be read-only."
        },
    }
}

fn read_only_violation(command: &str, c: Classification) -> ToolError {
    let hint = violation_hint(&c);
    let mut blocked = Blocked::new(
        BlockedCode::ReadOnlyViolation,
        format!(
            "Command '{}' is not read-only. Use pulse_control for write operations.",
            excerpt(command, 50)
        ),
    )
    .with_detail("command", format!("{}...", excerpt(command, 100)))
    .with_detail("reason", c.reason)
    .with_detail("hint", hint)
    .with_detail("alternative", "Use pulse_control type=command for write operations");
    if let Some(category) = c.category {
        blocked = blocked.with_detail("category", category.as_str());
    }
    if let Some(rewrite) = c.suggested_rewrite {
        blocked = if c.auto_recoverable {
            blocked.recoverable(format!("Retry with: {rewrite}"))
        } else {
            blocked.with_hint(format!("Retry with: {rewrite}"))
        };
        blocked = blocked.with_rewrite(rewrite);
    }
    blocked.into()
}

/// Gate, route, and run one read-only command.
async fn exec(
    ctx: &ToolContext,
    call_args: &Value,
    command: &str,
) -> Result<ToolResult, ToolError> {
    let target_host = args::require_str(call_args, "target_host")?;
    let explicit_container = args::opt_str(call_args, "docker_container");
    if let Some(name) = explicit_container {
        validate_container_name("docker_container", name)?;
    }

    if let Some(found) = check_command(command, ctx.settings.allow_loopback) {
        return Err(guard::sensitive_block(found));
    }
    let classification = pulse_safety::classify(command);
    let (run_command, note) = match classification.intent {
        CommandIntent::WriteOrUnknown => {
            info!(
                target_host,
                reason = %classification.reason,
                "Refusing non-read-only command"
            );
            return Err(read_only_violation(command, classification));
        },
        CommandIntent::ReadOnlyConditional => match classification.suggested_rewrite {
            Some(rewrite) => {
                let note = format!("[ran bounded form: {rewrite}]");
                (rewrite, Some(note))
            },
            None => (command.to_string(), None),
        },
        CommandIntent::ReadOnlyCertain => (command.to_string(), None),
    };

    let state = ctx.snapshot();
    let agents = ctx.connected_agents();
    let routing = routing::route(state.as_ref(), &agents, target_host);
    if !routing.has_agent() {
        if routing.is_guest_exec() {
            return Err(ToolError::Unavailable(format!(
                "'{target_host}' is a {} but no agent is available on its node{}",
                routing.target_type.as_str(),
                routing
                    .resolved_node
                    .as_deref()
                    .map(|n| format!(" '{n}'"))
                    .unwrap_or_default()
            )));
        }
        return Err(file_ops::no_agent(target_host, ctx));
    }

    let container = file_ops::effective_container(ctx, target_host, explicit_container);
    let wire_command = match &container {
        Some(c) => wrap_docker_exec(c, &run_command),
        None => run_command,
    };
    debug!(
        target_host,
        agent_id = %routing.agent_id,
        agent_host = %routing.agent_hostname,
        transport = %routing.transport,
        target_id = %routing.target_id,
        docker_container = ?container,
        "Running read-only command"
    );

    let output = remote::run(
        ctx,
        &routing.agent_id,
        routing.request(wire_command),
        ctx.settings.command_timeout,
    )
    .await?;

    let combined = output.combined();
    let mut text = if combined.trim().is_empty() {
        String::new()
    } else {
        render_output(&combined, ctx.settings.max_output_chars)
    };
    if let Some(note) = note {
        text = if text.is_empty() { note } else { format!("{note}\n{text}") };
    }
    if !output.success() {
        return Ok(ToolResult::text(format!(
            "Command exited with code {}:\n{text}",
            output.exit_code
        )));
    }
    if text.is_empty() {
        return Ok(ToolResult::text("Command completed successfully (no output)"));
    }
    Ok(ToolResult::text(text))
}

#[cfg(test)]
#[path = "read_tests.rs"]
mod tests;
