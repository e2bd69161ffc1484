//! Remote file read, write, and append.
//!
//! Content travels base64-encoded (`echo '<b64>' | base64 -d > path`) so no
//! byte of it is ever interpreted by a shell. Every write and append goes
//! through the same path: guards, routing, the approval gate, execution,
//! then a sha256 read-back.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use pulse_core::{
    CommandOutput, ToolResult, TransportError, args, shell_escape, validate_container_name,
    wrap_docker_exec,
};
use pulse_safety::{check_path, redact};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::gate::{self, ApprovalBinding, Authorization};
use crate::guard;
use crate::output::truncate_output;
use crate::remote;
use crate::resolver::{self, ResourceType};
use crate::routing::{self, Routing};

/// How content lands in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    /// Replace the file.
    Write,
    /// Add to the end of the file.
    Append,
}

impl WriteMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Append => "append",
        }
    }

    fn redirect(self) -> &'static str {
        match self {
            Self::Write => ">",
            Self::Append => ">>",
        }
    }

    fn action(self, path: &str) -> String {
        match self {
            Self::Write => format!("Write file: {path}"),
            Self::Append => format!("Append to file: {path}"),
        }
    }
}

/// Validated arguments shared by every file operation.
struct FileArgs<'a> {
    path: &'a str,
    target_host: &'a str,
    docker_container: Option<&'a str>,
}

impl<'a> FileArgs<'a> {
    fn parse(call_args: &'a Value) -> Result<Self, ToolError> {
        let path = args::require_str(call_args, "path")?;
        if !path.starts_with('/') {
            return Err(ToolError::InvalidArguments(format!(
                "path must be absolute, got '{path}'"
            )));
        }
        let target_host = args::require_str(call_args, "target_host")?;
        let docker_container = args::opt_str(call_args, "docker_container");
        if let Some(name) = docker_container {
            validate_container_name("docker_container", name)?;
        }
        if let Some(found) = check_path(path) {
            return Err(guard::sensitive_block(found));
        }
        Ok(Self {
            path,
            target_host,
            docker_container,
        })
    }
}

/// The Docker container to run inside: the explicit argument, or the
/// target itself when it resolves to a Docker container.
pub(crate) fn effective_container(
    ctx: &ToolContext,
    target_host: &str,
    explicit: Option<&str>,
) -> Option<String> {
    if let Some(name) = explicit {
        return Some(name.to_string());
    }
    let state = ctx.snapshot()?;
    let loc = resolver::resolve(&state, target_host);
    if loc.resource_type == Some(ResourceType::Docker) {
        debug!(
            target_host,
            container = ?loc.container_name,
            "Target resolved to a Docker container"
        );
        return loc.container_name;
    }
    None
}

pub(crate) fn no_agent(target_host: &str, ctx: &ToolContext) -> ToolError {
    ToolError::Unavailable(format!(
        "no agent available for target '{target_host}'. Available targets: {}",
        routing::agent_list(&ctx.connected_agents())
    ))
}

fn in_container(container: Option<&str>, inner: &str) -> String {
    match container {
        Some(c) => wrap_docker_exec(c, inner),
        None => inner.to_string(),
    }
}

/// Read a remote file.
pub(crate) async fn read_file(
    ctx: &ToolContext,
    call_args: &Value,
) -> Result<ToolResult, ToolError> {
    let file = FileArgs::parse(call_args)?;
    let state = ctx.snapshot();
    let agents = ctx.connected_agents();
    let routing = routing::route(state.as_ref(), &agents, file.target_host);
    if !routing.has_agent() {
        return Err(no_agent(file.target_host, ctx));
    }

    let container = effective_container(ctx, file.target_host, file.docker_container);
    let command = match &container {
        Some(c) => format!("docker exec {} cat {}", shell_escape(c), shell_escape(file.path)),
        None => format!("cat {}", shell_escape(file.path)),
    };

    let output = remote::run(
        ctx,
        &routing.agent_id,
        routing.request(command),
        ctx.settings.command_timeout,
    )
    .await?;
    if !output.success() {
        let limit = ctx.settings.max_output_chars;
        return Ok(ToolResult::error_with_details(
            format!(
                "Failed to read file (exit code {}): {}",
                output.exit_code,
                redact(output.stderr.trim()).text
            ),
            json!({
                "path": file.path,
                "host": file.target_host,
                "exit_code": output.exit_code,
                "stdout": truncate_output(redact(&output.stdout).text, limit),
                "stderr": truncate_output(redact(&output.stderr).text, limit),
            }),
        ));
    }

    let size = output.stdout.len();
    let redacted = redact(&output.stdout);
    let mut body = json!({
        "success": true,
        "path": file.path,
        "content": truncate_output(redacted.text, ctx.settings.max_output_chars),
        "host": file.target_host,
        "size": size,
        "redacted": redacted.count > 0,
        "redactions": redacted.count,
        "execution": routing.provenance(file.target_host),
    });
    if let Some(c) = container {
        body["docker_container"] = json!(c);
    }
    Ok(ToolResult::Json(body))
}

/// Write or append to a remote file, then verify the result.
pub(crate) async fn write_file(
    ctx: &ToolContext,
    call_args: &Value,
    mode: WriteMode,
) -> Result<ToolResult, ToolError> {
    let file = FileArgs::parse(call_args)?;
    let content = args::raw_str(call_args, "content")
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ToolError::InvalidArguments("content is required".to_string()))?;
    let target_host = file.target_host;

    let state = ctx.snapshot();
    let agents = ctx.connected_agents();
    if let Some(state) = &state {
        guard::check_ambiguous_node(state, &agents, target_host)?;
    }
    guard::check_strict_resolution(ctx, state.as_ref(), &agents, target_host, mode.as_str())?;
    let routing = routing::route(state.as_ref(), &agents, target_host);
    guard::check_write_context(ctx, target_host, &routing)?;
    if !routing.has_agent() {
        return Err(no_agent(target_host, ctx));
    }

    let container = effective_container(ctx, target_host, file.docker_container);
    let inner = format!(
        "echo '{}' | base64 -d {} {}",
        BASE64.encode(content),
        mode.redirect(),
        shell_escape(file.path)
    );
    let command = in_container(container.as_deref(), &inner);

    let label = match &container {
        Some(c) => format!("{target_host} (container: {c})"),
        None => target_host.to_string(),
    };
    let action = mode.action(file.path);
    let binding = ApprovalBinding::new(
        action.clone(),
        "file",
        format!(
            "host={target_host}|container={}|path={}|sha256={}",
            container.as_deref().unwrap_or_default(),
            file.path,
            hex::encode(Sha256::digest(content.as_bytes()))
        ),
    )
    .with_label(label.clone())
    .with_rationale(format!("Write {} bytes to {}", content.len(), file.path));
    let summary = format!(
        "{} {} bytes to {} on {label}",
        mode.as_str(),
        content.len(),
        file.path
    );
    if let Authorization::Respond(result) =
        gate::authorize(ctx, call_args, &binding, &action, &summary)
    {
        return Ok(result);
    }

    info!(
        target_host,
        path = file.path,
        mode = mode.as_str(),
        bytes = content.len(),
        agent_id = %routing.agent_id,
        transport = %routing.transport,
        "Writing remote file"
    );
    let output = remote::run(
        ctx,
        &routing.agent_id,
        routing.request(command),
        ctx.settings.command_timeout,
    )
    .await?;

    if !output.success() {
        let mut details = json!({
            "success": false,
            "action": mode.as_str(),
            "path": file.path,
            "host": target_host,
            "exit_code": output.exit_code,
            "stdout": output.stdout,
            "stderr": output.stderr,
        });
        if let Some(c) = &container {
            details["docker_container"] = json!(c);
        }
        return Ok(ToolResult::error_with_details(
            format!("Failed to {} file (exit code {})", mode.as_str(), output.exit_code),
            details,
        ));
    }

    let verification = verify(ctx, &routing, container.as_deref(), file.path, content, mode).await;
    let mut body = json!({
        "success": true,
        "action": mode.as_str(),
        "path": file.path,
        "host": target_host,
        "bytes_written": content.len(),
        "verification": verification,
        "execution": routing.provenance(target_host),
    });
    if let Some(c) = container {
        body["docker_container"] = json!(c);
    }
    Ok(ToolResult::Json(body))
}

fn exit_code_only(note: impl Into<String>) -> Value {
    json!({"ok": true, "method": "exit_code", "note": note.into()})
}

/// Read the file back and compare hashes.
///
/// A verification that cannot run degrades to trusting the exit code; only
/// a hash that was read and differs reports `ok: false`.
async fn verify(
    ctx: &ToolContext,
    routing: &Routing,
    container: Option<&str>,
    path: &str,
    content: &str,
    mode: WriteMode,
) -> Value {
    let escaped = shell_escape(path);
    let (inner, method) = match mode {
        WriteMode::Write => (
            format!(
                "sha256sum {escaped} 2>/dev/null || shasum -a 256 {escaped} 2>/dev/null \
                 || openssl dgst -sha256 {escaped} 2>/dev/null"
            ),
            "sha256",
        ),
        WriteMode::Append => (
            format!(
                "tail -c {} {escaped} 2>/dev/null \
                 | (sha256sum 2>/dev/null || shasum -a 256 2>/dev/null)",
                content.len()
            ),
            "tail_sha256",
        ),
    };
    let command = in_container(container, &inner);
    let expected = hex::encode(Sha256::digest(content.as_bytes()));

    let output: CommandOutput = match remote::run(
        ctx,
        &routing.agent_id,
        routing.request(command),
        ctx.settings.verify_timeout,
    )
    .await
    {
        Ok(output) => output,
        Err(ToolError::Transport {
            source: TransportError::Timeout(_),
            ..
        }) => {
            warn!(path, "Write verification timed out");
            return exit_code_only("verification timed out");
        },
        Err(e) => {
            warn!(path, error = %e, "Write verification failed to run");
            return exit_code_only(format!("verification unavailable: {e}"));
        },
    };
    if !output.success() {
        return exit_code_only(format!(
            "verification command exited with code {}",
            output.exit_code
        ));
    }
    let Some(actual) = parse_digest(&output.stdout) else {
        return exit_code_only("no hash tool available on target");
    };

    let ok = actual == expected;
    if !ok {
        warn!(path, %expected, %actual, "Written content does not match");
    }
    json!({
        "ok": ok,
        "method": method,
        "expected": expected,
        "actual": actual,
    })
}

/// First 64-hex-digit token in hash tool output.
fn parse_digest(stdout: &str) -> Option<String> {
    stdout
        .split(|c: char| c.is_whitespace() || c == '=')
        .find(|t| t.len() == 64 && t.chars().all(|c| c.is_ascii_hexdigit()))
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ExecutorSettings, Providers};
    use pulse_core::{BlockedCode, ControlLevel};
    use pulse_test::{MockStateProvider, MockTransport, delly_fleet, fleet_agents};
    use std::sync::Arc;
    use std::time::Duration;

    fn ctx(level: ControlLevel, transport: &Arc<MockTransport>) -> ToolContext {
        ToolContext::new(level).with_providers(
            Providers::default()
                .with_state(Arc::new(MockStateProvider::new(delly_fleet())))
                .with_transport(transport.clone()),
        )
    }

    fn fs_transport() -> Arc<MockTransport> {
        Arc::new(
            MockTransport::new()
                .with_agents(fleet_agents())
                .with_file_system(),
        )
    }

    #[test]
    fn test_parse_digest_formats() {
        let hex = "a".repeat(64);
        assert_eq!(parse_digest(&format!("{hex}  /etc/x\n")), Some(hex.clone()));
        assert_eq!(parse_digest(&format!("SHA2-256(/etc/x)= {hex}")), Some(hex));
        assert_eq!(parse_digest("sha256sum: not found"), None);
    }

    #[tokio::test]
    async fn test_write_verifies_hash() {
        let transport = fs_transport();
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        let args = json!({
            "path": "/etc/app.conf",
            "content": "port = 8080\n",
            "target_host": "homepage-docker",
        });
        let result = write_file(&ctx, &args, WriteMode::Write).await.unwrap();
        let body = result.as_json().unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["bytes_written"], 12);
        assert_eq!(body["verification"]["ok"], true);
        assert_eq!(body["verification"]["method"], "sha256");
        assert_eq!(body["execution"]["transport"], "pct_exec");
        assert_eq!(
            transport.file("delly-agent", "141", "/etc/app.conf").unwrap(),
            b"port = 8080\n"
        );
    }

    #[tokio::test]
    async fn test_append_verifies_tail() {
        let transport = fs_transport();
        transport.put_file("backup-agent", "", "/var/log/notes", b"first\n");
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        let args = json!({
            "path": "/var/log/notes",
            "content": "second\n",
            "target_host": "backup-server",
        });
        let result = write_file(&ctx, &args, WriteMode::Append).await.unwrap();
        let body = result.as_json().unwrap();
        assert_eq!(body["verification"]["method"], "tail_sha256");
        assert_eq!(body["verification"]["ok"], true);
        assert_eq!(
            transport.file("backup-agent", "", "/var/log/notes").unwrap(),
            b"first\nsecond\n"
        );
        assert!(transport.commands()[0].contains(">> '/var/log/notes'"));
    }

    #[tokio::test]
    async fn test_hash_mismatch_reports_not_ok() {
        let transport = Arc::new(
            MockTransport::new()
                .with_agents(fleet_agents())
                .on_command("sha256sum", CommandOutput::ok(format!("{}  /x", "0".repeat(64)))),
        );
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        let args = json!({"path": "/x", "content": "data", "target_host": "backup-server"});
        let result = write_file(&ctx, &args, WriteMode::Write).await.unwrap();
        let body = result.as_json().unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["verification"]["ok"], false);
    }

    #[tokio::test]
    async fn test_verification_timeout_degrades() {
        let transport = Arc::new(
            MockTransport::new()
                .with_agents(fleet_agents())
                .on_command_error("sha256sum", TransportError::Timeout(20)),
        );
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        let args = json!({"path": "/x", "content": "data", "target_host": "backup-server"});
        let result = write_file(&ctx, &args, WriteMode::Write).await.unwrap();
        let verification = &result.as_json().unwrap()["verification"];
        assert_eq!(verification["ok"], true);
        assert_eq!(verification["method"], "exit_code");
        assert_eq!(verification["note"], "verification timed out");
    }

    #[tokio::test]
    async fn test_failed_write_returns_details() {
        let transport = Arc::new(
            MockTransport::new()
                .with_agents(fleet_agents())
                .on_command("base64 -d", CommandOutput::failed(1, "Permission denied")),
        );
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        let args = json!({"path": "/root/x", "content": "data", "target_host": "backup-server"});
        let result = write_file(&ctx, &args, WriteMode::Write).await.unwrap();
        match result {
            ToolResult::Error { message, details } => {
                assert!(message.contains("exit code 1"));
                let details = details.unwrap();
                assert_eq!(details["success"], false);
                assert_eq!(details["stderr"], "Permission denied");
            },
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_payload_is_never_shell_interpreted() {
        let transport = fs_transport();
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        let nasty = "$(rm -rf /); `id` 'quoted' \"double\"\n";
        let args = json!({"path": "/tmp/n", "content": nasty, "target_host": "backup-server"});
        write_file(&ctx, &args, WriteMode::Write).await.unwrap();
        let cmd = &transport.commands()[0];
        assert!(!cmd.contains("rm -rf"));
        assert!(cmd.starts_with("echo '"));
        assert_eq!(
            transport.file("backup-agent", "", "/tmp/n").unwrap(),
            nasty.as_bytes()
        );
    }

    #[tokio::test]
    async fn test_docker_container_wraps_whole_pipeline() {
        let transport = fs_transport();
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        let args = json!({
            "path": "/app/config.yml",
            "content": "a: 1\n",
            "target_host": "homepage",
        });
        let result = write_file(&ctx, &args, WriteMode::Write).await.unwrap();
        let body = result.as_json().unwrap();
        assert_eq!(body["docker_container"], "homepage");
        let cmd = &transport.commands()[0];
        assert!(cmd.starts_with("docker exec 'homepage' sh -c 'echo "));
        assert_eq!(transport.calls()[0].request.target_id, "141");
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let transport = fs_transport();
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        let args = json!({"path": "/tmp/x", "content": "", "target_host": "backup-server"});
        let err = write_file(&ctx, &args, WriteMode::Append).await.unwrap_err();
        assert_eq!(err.to_string(), "content is required");
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sensitive_path_blocked() {
        let transport = fs_transport();
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        let args = json!({"path": "/etc/shadow", "content": "x", "target_host": "backup-server"});
        let err = write_file(&ctx, &args, WriteMode::Write).await.unwrap_err();
        assert!(matches!(&err, ToolError::Blocked(b) if b.code == BlockedCode::SensitivePath));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_relative_path_and_bad_container_rejected() {
        let transport = fs_transport();
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        let args = json!({"path": "etc/x", "content": "x", "target_host": "backup-server"});
        assert!(matches!(
            write_file(&ctx, &args, WriteMode::Write).await,
            Err(ToolError::InvalidArguments(_))
        ));
        let args = json!({
            "path": "/x",
            "content": "x",
            "target_host": "backup-server",
            "docker_container": "web; rm -rf /",
        });
        assert!(matches!(
            write_file(&ctx, &args, WriteMode::Write).await,
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn test_controlled_write_approval_is_bound_to_path() {
        let transport = fs_transport();
        let ctx = ctx(ControlLevel::Controlled, &transport);
        let args = json!({"path": "/tmp/a", "content": "one", "target_host": "backup-server"});
        let result = write_file(&ctx, &args, WriteMode::Write).await.unwrap();
        let payload = pulse_approval::parse_approval_required(result.as_text().unwrap()).unwrap();
        assert_eq!(payload.action, "Write file: /tmp/a");
        assert_eq!(payload.command, "Write file: /tmp/a");
        assert!(transport.calls().is_empty());

        // Another path under the same approval is refused.
        let other = json!({
            "path": "/tmp/b",
            "content": "one",
            "target_host": "backup-server",
            "pre_approved_id": payload.approval_id,
        });
        let result = write_file(&ctx, &other, WriteMode::Write).await.unwrap();
        assert!(pulse_approval::parse_approval_required(result.as_text().unwrap()).is_some());
        assert!(transport.calls().is_empty());

        let approved = json!({
            "path": "/tmp/a",
            "content": "one",
            "target_host": "backup-server",
            "pre_approved_id": payload.approval_id,
        });
        let result = write_file(&ctx, &approved, WriteMode::Write).await.unwrap();
        assert_eq!(result.as_json().unwrap()["success"], true);
    }

    #[tokio::test]
    async fn test_controlled_write_approval_is_bound_to_content() {
        let transport = fs_transport();
        let ctx = ctx(ControlLevel::Controlled, &transport);
        let args = json!({"path": "/tmp/a", "content": "one", "target_host": "backup-server"});
        let result = write_file(&ctx, &args, WriteMode::Write).await.unwrap();
        let payload = pulse_approval::parse_approval_required(result.as_text().unwrap()).unwrap();
        let record = ctx.approvals.get(&ctx.org_id, &payload.approval_id).unwrap();
        assert!(record.target_id.ends_with(&hex::encode(Sha256::digest(b"one"))));

        let swapped = json!({
            "path": "/tmp/a",
            "content": "rm -rf /",
            "target_host": "backup-server",
            "pre_approved_id": payload.approval_id,
        });
        let result = write_file(&ctx, &swapped, WriteMode::Write).await.unwrap();
        let fresh = pulse_approval::parse_approval_required(result.as_text().unwrap()).unwrap();
        assert_ne!(fresh.approval_id, payload.approval_id);

        let swapped = json!({
            "path": "/tmp/a",
            "content": "two",
            "target_host": "backup-server",
            "pre_approved_id": payload.approval_id,
        });
        let result = write_file(&ctx, &swapped, WriteMode::Write).await.unwrap();
        assert!(pulse_approval::parse_approval_required(result.as_text().unwrap()).is_some());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_suggest_mode_never_writes() {
        let transport = fs_transport();
        let ctx = ctx(ControlLevel::Suggest, &transport);
        let args = json!({"path": "/tmp/a", "content": "one", "target_host": "backup-server"});
        let result = write_file(&ctx, &args, WriteMode::Write).await.unwrap();
        let payload = pulse_approval::parse_suggestion(result.as_text().unwrap()).unwrap();
        assert_eq!(payload.command, "write 3 bytes to /tmp/a on backup-server");
        assert!(transport.calls().is_empty());
        assert_eq!(ctx.approvals.count(), 0);
    }

    #[tokio::test]
    async fn test_read_redacts_content() {
        let transport = fs_transport();
        transport.put_file("nas-agent", "", "/srv/app.env", b"PORT=80\nPASSWORD=hunter2hunter2\n");
        let ctx = ctx(ControlLevel::ReadOnly, &transport);
        let args = json!({"path": "/srv/app.env", "target_host": "nas"});
        let result = read_file(&ctx, &args).await.unwrap();
        let body = result.as_json().unwrap();
        assert_eq!(body["redacted"], true);
        assert!(!body["content"].as_str().unwrap().contains("hunter2"));
        assert!(body["content"].as_str().unwrap().contains("PORT=80"));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let transport = fs_transport();
        let ctx = ctx(ControlLevel::ReadOnly, &transport)
            .with_settings(
                ExecutorSettings::default().with_command_timeout(Duration::from_secs(5)),
            );
        let args = json!({"path": "/nope", "target_host": "nas"});
        let result = read_file(&ctx, &args).await.unwrap();
        assert!(result.is_error());
        let ToolResult::Error { message, details } = result else {
            panic!("expected an error result");
        };
        assert!(message.starts_with("Failed to read file (exit code 1)"));
        let details = details.unwrap();
        assert_eq!(details["exit_code"], 1);
        assert_eq!(details["stdout"], "");
        assert_eq!(details["stderr"], "cat: /nope: No such file or directory");
        assert_eq!(details["path"], "/nope");
    }

    #[tokio::test]
    async fn test_read_without_agent() {
        let transport = fs_transport();
        let ctx = ctx(ControlLevel::ReadOnly, &transport);
        let args = json!({"path": "/etc/hosts", "target_host": "pihole"});
        let err = read_file(&ctx, &args).await.unwrap_err();
        assert!(err.to_string().contains("no agent available for target 'pihole'"));
    }
}
