//! Kubernetes tool: inventory reads plus `kubectl` actions on a cluster's
//! agent.

use pulse_core::{
    CommandRequest, ControlLevel, KubernetesCluster, StateSnapshot, ToolResult, args,
    shell_escape, validate_dns_name,
};
use serde_json::{Value, json};
use tracing::info;

use crate::PulseTool;
use crate::context::{Provider, ToolContext};
use crate::error::ToolError;
use crate::gate::{self, ApprovalBinding, Authorization};
use crate::guard;
use crate::output::render_output;
use crate::remote;

const TYPES: &[&str] = &[
    "clusters",
    "pods",
    "deployments",
    "logs",
    "scale",
    "restart",
    "delete_pod",
    "exec",
];

/// Built-in tool for Kubernetes clusters.
pub struct KubernetesTool;

#[async_trait::async_trait]
impl PulseTool for KubernetesTool {
    fn name(&self) -> &'static str {
        "pulse_kubernetes"
    }

    fn description(&self) -> &'static str {
        "Queries and operates Kubernetes clusters. Reads: clusters, pods, deployments, logs. \
         Changes: scale, restart (rollout restart), delete_pod, exec. Changes run kubectl on \
         the cluster's agent and need approval in controlled mode."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": TYPES,
                    "description": "Operation"
                },
                "cluster": {
                    "type": "string",
                    "description": "Cluster name or id"
                },
                "namespace": {
                    "type": "string",
                    "description": "Namespace (default 'default')"
                },
                "deployment": {
                    "type": "string",
                    "description": "For scale/restart: deployment name"
                },
                "pod": {
                    "type": "string",
                    "description": "For delete_pod/exec/logs: pod name"
                },
                "container": {
                    "type": "string",
                    "description": "For exec/logs: container name (first container if omitted)"
                },
                "command": {
                    "type": "string",
                    "description": "For exec: command to run inside the pod"
                },
                "replicas": {
                    "type": "integer",
                    "description": "For scale: desired replica count"
                },
                "lines": {
                    "type": "integer",
                    "description": "For logs: number of lines (default 100, max 1000)"
                },
                "status": {
                    "type": "string",
                    "description": "For pods: only pods in this phase (Running, Pending, Failed)"
                },
                "limit": {
                    "type": "integer",
                    "description": "For pods/deployments: maximum results (default 100)"
                },
                "offset": {
                    "type": "integer",
                    "description": "For pods/deployments: results to skip"
                },
                "pre_approved_id": {
                    "type": "string",
                    "description": "Approval id returned by an earlier APPROVAL_REQUIRED response"
                }
            },
            "required": ["type"]
        })
    }

    fn required_providers(&self) -> &'static [Provider] {
        &[Provider::State]
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        kubernetes(&args, ctx).await.unwrap_or_else(Into::into)
    }
}

async fn kubernetes(call_args: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
    let kind = args::require_enum(call_args, "type", TYPES)?;
    let state = ctx.require_state()?;
    match kind.as_str() {
        "clusters" => Ok(clusters(&state)),
        "pods" => pods(&state, call_args),
        "deployments" => deployments(&state, call_args),
        "logs" => logs(ctx, &state, call_args).await,
        _ => mutate(ctx, &state, call_args, &kind).await,
    }
}

fn find_cluster<'a>(state: &'a StateSnapshot, name: &str) -> Option<&'a KubernetesCluster> {
    state
        .kubernetes_clusters
        .iter()
        .find(|c| c.id == name || c.name.eq_ignore_ascii_case(name))
}

fn not_found(name: &str) -> ToolResult {
    ToolResult::text(format!("Kubernetes cluster '{name}' not found."))
}

fn namespace(call_args: &Value) -> Result<String, ToolError> {
    let ns = args::opt_str(call_args, "namespace").unwrap_or("default");
    validate_dns_name("namespace", ns)?;
    Ok(ns.to_string())
}

/// Name argument that must be a valid Kubernetes object name.
fn object_name<'a>(call_args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    let name = args::require_str(call_args, key)?;
    validate_dns_name(key, name)?;
    Ok(name)
}

fn container(call_args: &Value) -> Result<Option<&str>, ToolError> {
    let container = args::opt_str(call_args, "container");
    if let Some(c) = container {
        validate_dns_name("container", c)?;
    }
    Ok(container)
}

fn page(call_args: &Value) -> Result<(usize, usize), ToolError> {
    let limit = args::clamp_count(args::opt_int(call_args, "limit")?, 100, 1, 500) as usize;
    let offset = args::clamp_count(args::opt_int(call_args, "offset")?, 0, 0, u32::MAX) as usize;
    Ok((limit, offset))
}

// ---- reads ----

fn clusters(state: &StateSnapshot) -> ToolResult {
    if state.kubernetes_clusters.is_empty() {
        return ToolResult::text(
            "No Kubernetes clusters found. Kubernetes monitoring may not be configured.",
        );
    }
    let clusters: Vec<Value> = state
        .kubernetes_clusters
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "agent_id": c.agent_id,
                "pods": c.pods.len(),
                "deployments": c.deployments.len(),
                "controllable": !c.agent_id.is_empty(),
            })
        })
        .collect();
    ToolResult::Json(json!({"clusters": clusters, "total": state.kubernetes_clusters.len()}))
}

fn pods(state: &StateSnapshot, call_args: &Value) -> Result<ToolResult, ToolError> {
    let name = args::require_str(call_args, "cluster")?;
    let ns = args::opt_str(call_args, "namespace");
    let phase = args::opt_str(call_args, "status");
    let (limit, offset) = page(call_args)?;
    let Some(cluster) = find_cluster(state, name) else {
        return Ok(not_found(name));
    };

    let matching: Vec<_> = cluster
        .pods
        .iter()
        .filter(|p| ns.is_none_or(|n| p.namespace == n))
        .filter(|p| phase.is_none_or(|s| p.phase.eq_ignore_ascii_case(s)))
        .collect();
    let filtered = matching.len();
    let pods: Vec<_> = matching.into_iter().skip(offset).take(limit).collect();
    Ok(ToolResult::Json(json!({
        "cluster": cluster.name,
        "pods": pods,
        "total": cluster.pods.len(),
        "filtered": filtered,
    })))
}

fn deployments(state: &StateSnapshot, call_args: &Value) -> Result<ToolResult, ToolError> {
    let name = args::require_str(call_args, "cluster")?;
    let ns = args::opt_str(call_args, "namespace");
    let (limit, offset) = page(call_args)?;
    let Some(cluster) = find_cluster(state, name) else {
        return Ok(not_found(name));
    };

    let matching: Vec<_> = cluster
        .deployments
        .iter()
        .filter(|d| ns.is_none_or(|n| d.namespace == n))
        .collect();
    let filtered = matching.len();
    let deployments: Vec<_> = matching.into_iter().skip(offset).take(limit).collect();
    Ok(ToolResult::Json(json!({
        "cluster": cluster.name,
        "deployments": deployments,
        "total": cluster.deployments.len(),
        "filtered": filtered,
    })))
}

/// Agent with `kubectl` access to `cluster`, or a message for the model.
fn cluster_agent<'a>(
    state: &'a StateSnapshot,
    name: &str,
) -> Result<(&'a KubernetesCluster, &'a str), ToolResult> {
    let cluster = find_cluster(state, name).ok_or_else(|| not_found(name))?;
    if cluster.agent_id.is_empty() {
        return Err(ToolResult::text(format!(
            "Cluster '{name}' has no agent configured - kubectl commands cannot be executed."
        )));
    }
    Ok((cluster, cluster.agent_id.as_str()))
}

async fn logs(
    ctx: &ToolContext,
    state: &StateSnapshot,
    call_args: &Value,
) -> Result<ToolResult, ToolError> {
    let name = args::require_str(call_args, "cluster")?;
    let pod = object_name(call_args, "pod")?;
    let ns = namespace(call_args)?;
    let container = container(call_args)?;
    let lines = args::clamp_count(args::opt_int(call_args, "lines")?, 100, 1, 1000);
    let agent_id = match cluster_agent(state, name) {
        Ok((_, agent_id)) => agent_id,
        Err(result) => return Ok(result),
    };

    let command = match container {
        Some(c) => format!("kubectl -n {ns} logs {pod} -c {c} --tail={lines}"),
        None => format!("kubectl -n {ns} logs {pod} --tail={lines}"),
    };
    let output = remote::run(
        ctx,
        agent_id,
        CommandRequest::host(command),
        ctx.settings.command_timeout,
    )
    .await?;

    if !output.success() {
        return Ok(ToolResult::text(format!(
            "kubectl logs failed (exit code {}):\n{}",
            output.exit_code,
            render_output(&output.combined(), ctx.settings.max_output_chars)
        )));
    }
    if output.stdout.trim().is_empty() {
        return Ok(ToolResult::text(format!(
            "No logs found for pod '{pod}' in namespace '{ns}'"
        )));
    }
    Ok(ToolResult::text(format!(
        "Logs from pod '{pod}' (last {lines} lines):\n{}",
        render_output(&output.stdout, ctx.settings.max_output_chars)
    )))
}

// ---- changes ----

/// One validated `kubectl` change.
struct Change {
    command: String,
    object_kind: &'static str,
    object: String,
    rationale: String,
    done: String,
}

fn plan(call_args: &Value, kind: &str, ns: &str) -> Result<Change, ToolError> {
    match kind {
        "scale" => {
            let deployment = object_name(call_args, "deployment")?;
            let replicas = args::require_int(call_args, "replicas")?;
            let replicas = u32::try_from(replicas).map_err(|_| {
                ToolError::InvalidArguments("replicas must be >= 0".to_string())
            })?;
            Ok(Change {
                command: format!(
                    "kubectl -n {ns} scale deployment {deployment} --replicas={replicas}"
                ),
                object_kind: "deployment",
                object: deployment.to_string(),
                rationale: format!("Scale deployment {deployment} to {replicas} replicas"),
                done: format!(
                    "Scaled deployment '{deployment}' to {replicas} replicas in namespace '{ns}'."
                ),
            })
        },
        "restart" => {
            let deployment = object_name(call_args, "deployment")?;
            Ok(Change {
                command: format!("kubectl -n {ns} rollout restart deployment/{deployment}"),
                object_kind: "deployment",
                object: deployment.to_string(),
                rationale: format!("Restart deployment {deployment}"),
                done: format!(
                    "Started a rollout restart of deployment '{deployment}' in namespace '{ns}'. \
                     Pods will restart gradually."
                ),
            })
        },
        "delete_pod" => {
            let pod = object_name(call_args, "pod")?;
            Ok(Change {
                command: format!("kubectl -n {ns} delete pod {pod}"),
                object_kind: "pod",
                object: pod.to_string(),
                rationale: format!("Delete pod {pod}"),
                done: format!(
                    "Deleted pod '{pod}' in namespace '{ns}'. A controller, if any, will \
                     replace it."
                ),
            })
        },
        _ => {
            let pod = object_name(call_args, "pod")?;
            let container = container(call_args)?;
            let inner = args::require_str(call_args, "command")?;
            let mut command =
                format!("kubectl -n {} exec {}", shell_escape(ns), shell_escape(pod));
            if let Some(c) = container {
                command.push_str(&format!(" -c {}", shell_escape(c)));
            }
            command.push_str(&format!(" -- sh -c {}", shell_escape(inner)));
            Ok(Change {
                command,
                object_kind: "pod",
                object: pod.to_string(),
                rationale: format!("Execute command in pod {pod}"),
                done: format!("Command executed in pod '{pod}'."),
            })
        },
    }
}

async fn mutate(
    ctx: &ToolContext,
    state: &StateSnapshot,
    call_args: &Value,
    kind: &str,
) -> Result<ToolResult, ToolError> {
    let name = args::require_str(call_args, "cluster")?;
    let ns = namespace(call_args)?;
    let change = plan(call_args, kind, &ns)?;
    if kind == "exec" {
        guard::check_command_allowed(ctx, args::require_str(call_args, "command")?)?;
    }

    if ctx.control_level == ControlLevel::ReadOnly {
        return Ok(ToolResult::text(
            "Kubernetes control operations are not available in read-only mode.",
        ));
    }
    let (cluster, agent_id) = match cluster_agent(state, name) {
        Ok(found) => found,
        Err(result) => return Ok(result),
    };

    let binding = ApprovalBinding::new(
        change.command.clone(),
        "kubernetes",
        format!("{}:{ns}:{}:{}", cluster.id, change.object_kind, change.object),
    )
    .with_label(cluster.name.clone())
    .with_rationale(change.rationale.clone());
    if let Authorization::Respond(result) =
        gate::authorize(ctx, call_args, &binding, kind, &change.command)
    {
        return Ok(result);
    }

    info!(
        cluster = %cluster.name,
        namespace = %ns,
        object = %change.object,
        operation = kind,
        agent_id,
        "Running kubectl change"
    );
    let output = remote::run(
        ctx,
        agent_id,
        CommandRequest::host(change.command.clone()),
        ctx.settings.command_timeout,
    )
    .await?;

    let combined = output.combined();
    let shown = if combined.trim().is_empty() {
        "(no output)".to_string()
    } else {
        render_output(&combined, ctx.settings.max_output_chars)
    };
    if !output.success() {
        return Ok(ToolResult::text(format!(
            "kubectl command failed (exit code {}):\n{shown}",
            output.exit_code
        )));
    }
    Ok(ToolResult::text(format!("{}\n\nOutput:\n{shown}", change.done)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Providers;
    use pulse_approval::parse_approval_required;
    use pulse_core::{BlockedCode, CommandOutput, TargetType};
    use pulse_test::{MockStateProvider, MockTransport, delly_fleet, fleet_agents};
    use std::sync::Arc;

    fn ctx(level: ControlLevel, transport: &Arc<MockTransport>) -> ToolContext {
        ToolContext::new(level).with_providers(
            Providers::default()
                .with_state(Arc::new(MockStateProvider::new(delly_fleet())))
                .with_transport(transport.clone()),
        )
    }

    fn transport() -> Arc<MockTransport> {
        Arc::new(MockTransport::new().with_agents(fleet_agents()))
    }

    fn scale_args() -> Value {
        json!({"type": "scale", "cluster": "c1", "deployment": "nginx", "replicas": 3})
    }

    #[tokio::test]
    async fn test_scale_approval_is_single_use() {
        let transport = transport();
        let ctx = ctx(ControlLevel::Controlled, &transport);

        let first = KubernetesTool.execute(scale_args(), &ctx).await;
        let text = first.as_text().unwrap();
        assert!(text.starts_with("APPROVAL_REQUIRED: {"));
        let payload = parse_approval_required(text).unwrap();
        assert!(payload.do_not_retry);
        assert!(transport.calls().is_empty());

        let mut args = scale_args();
        args["pre_approved_id"] = json!(payload.approval_id);
        let second = KubernetesTool.execute(args.clone(), &ctx).await;
        assert!(second.as_text().unwrap().starts_with("Scaled deployment 'nginx'"));
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].agent_id, "k8s-agent");
        assert_eq!(calls[0].request.target_type, TargetType::Host);
        assert_eq!(
            calls[0].request.command,
            "kubectl -n default scale deployment nginx --replicas=3"
        );

        let third = KubernetesTool.execute(args, &ctx).await;
        let again = parse_approval_required(third.as_text().unwrap()).unwrap();
        assert_ne!(again.approval_id, payload.approval_id);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_binding_names_cluster_namespace_and_object() {
        let transport = transport();
        let ctx = ctx(ControlLevel::Controlled, &transport);
        let result = KubernetesTool
            .execute(
                json!({"type": "delete_pod", "cluster": "c1", "pod": "nginx-abc"}),
                &ctx,
            )
            .await;
        let payload = parse_approval_required(result.as_text().unwrap()).unwrap();
        let record = ctx.approvals.get(&ctx.org_id, &payload.approval_id).unwrap();
        assert_eq!(record.action_type, "kubernetes");
        assert_eq!(record.target_id, "k8s-c1:default:pod:nginx-abc");
        assert_eq!(record.command, "kubectl -n default delete pod nginx-abc");
    }

    #[tokio::test]
    async fn test_changes_refused_at_read_only() {
        let transport = transport();
        let ctx = ctx(ControlLevel::ReadOnly, &transport);
        let result = KubernetesTool.execute(scale_args(), &ctx).await;
        assert!(result.as_text().unwrap().contains("not available in read-only mode"));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_names_validated() {
        let transport = transport();
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        for args in [
            json!({"type": "scale", "cluster": "c1", "deployment": "Nginx", "replicas": 1}),
            json!({"type": "scale", "cluster": "c1", "deployment": "nginx;id", "replicas": 1}),
            json!({"type": "scale", "cluster": "c1", "deployment": "nginx", "replicas": -1}),
            json!({"type": "restart", "cluster": "c1", "deployment": "a", "namespace": "Prod"}),
        ] {
            assert!(KubernetesTool.execute(args.clone(), &ctx).await.is_error(), "{args}");
        }
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_exec_escapes_command() {
        let transport = transport();
        transport.add_rule("kubectl", CommandOutput::ok("ok\n"));
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        let result = KubernetesTool
            .execute(
                json!({
                    "type": "exec",
                    "cluster": "c1",
                    "pod": "nginx-abc",
                    "container": "web",
                    "command": "echo 'hi'; ls",
                }),
                &ctx,
            )
            .await;
        assert!(result.as_text().unwrap().contains("Command executed in pod 'nginx-abc'"));
        assert_eq!(
            transport.commands()[0],
            "kubectl -n 'default' exec 'nginx-abc' -c 'web' -- sh -c 'echo '\"'\"'hi'\"'\"'; ls'"
        );
    }

    #[tokio::test]
    async fn test_exec_sensitive_command_blocked() {
        let transport = transport();
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        let result = KubernetesTool
            .execute(
                json!({
                    "type": "exec",
                    "cluster": "c1",
                    "pod": "nginx-abc",
                    "command": "cat /etc/shadow",
                }),
                &ctx,
            )
            .await;
        assert!(matches!(
            result.blocked_code(),
            Some(BlockedCode::SensitivePath | BlockedCode::SensitiveCommand)
        ));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_restart_failure_reports_exit_code() {
        let transport = transport();
        transport.add_rule(
            "rollout restart",
            CommandOutput::failed(1, "deployments.apps \"nginx\" not found"),
        );
        let ctx = ctx(ControlLevel::Autonomous, &transport);
        let result = KubernetesTool
            .execute(json!({"type": "restart", "cluster": "c1", "deployment": "nginx"}), &ctx)
            .await;
        let text = result.as_text().unwrap();
        assert!(text.starts_with("kubectl command failed (exit code 1):"));
        assert!(text.contains("not found"));
        assert_eq!(
            transport.commands(),
            vec!["kubectl -n default rollout restart deployment/nginx"]
        );
    }

    #[tokio::test]
    async fn test_logs() {
        let transport = transport();
        transport.add_rule("logs", CommandOutput::ok("GET / 200\n"));
        let ctx = ctx(ControlLevel::ReadOnly, &transport);
        let result = KubernetesTool
            .execute(
                json!({"type": "logs", "cluster": "c1", "pod": "nginx-abc", "lines": 20}),
                &ctx,
            )
            .await;
        assert!(result.as_text().unwrap().starts_with("Logs from pod 'nginx-abc' (last 20 lines)"));
        assert_eq!(transport.commands(), vec!["kubectl -n default logs nginx-abc --tail=20"]);
    }

    #[tokio::test]
    async fn test_reads_from_inventory() {
        let transport = transport();
        let ctx = ctx(ControlLevel::ReadOnly, &transport);

        let result = KubernetesTool.execute(json!({"type": "clusters"}), &ctx).await;
        let body = result.as_json().unwrap();
        assert_eq!(body["clusters"][0]["name"], "c1");
        assert_eq!(body["clusters"][0]["controllable"], true);

        let result = KubernetesTool
            .execute(json!({"type": "pods", "cluster": "C1", "status": "running"}), &ctx)
            .await;
        let body = result.as_json().unwrap();
        assert_eq!(body["filtered"], 1);
        assert_eq!(body["pods"][0]["name"], "nginx-abc");

        let result = KubernetesTool
            .execute(json!({"type": "deployments", "cluster": "k8s-c1"}), &ctx)
            .await;
        assert_eq!(result.as_json().unwrap()["deployments"][0]["ready_replicas"], 2);

        let result = KubernetesTool
            .execute(json!({"type": "pods", "cluster": "nope"}), &ctx)
            .await;
        assert_eq!(result.as_text(), Some("Kubernetes cluster 'nope' not found."));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cluster_without_agent() {
        let mut state = delly_fleet();
        state.kubernetes_clusters[0].agent_id.clear();
        let transport = transport();
        let ctx = ToolContext::new(ControlLevel::Autonomous).with_providers(
            Providers::default()
                .with_state(Arc::new(MockStateProvider::new(state)))
                .with_transport(transport.clone()),
        );
        let result = KubernetesTool.execute(scale_args(), &ctx).await;
        assert!(result.as_text().unwrap().contains("has no agent configured"));
        assert!(transport.calls().is_empty());
    }
}
