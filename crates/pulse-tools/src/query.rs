//! Inventory query tool: list, search, and resolve fleet resources.

use pulse_core::{Blocked, BlockedCode, StateSnapshot, ToolResult, args};
use serde::Serialize;
use serde_json::{Value, json};

use crate::PulseTool;
use crate::context::{Provider, ToolContext};
use crate::error::ToolError;
use crate::resolver;
use crate::routing;

const ACTIONS: &[&str] = &["list", "search", "get"];
const TYPES: &[&str] = &["nodes", "vms", "containers", "docker", "hosts", "k8s"];
const MAX_SUGGESTIONS: usize = 10;

/// One inventory row.
#[derive(Debug, Clone, Serialize)]
struct Entry {
    #[serde(rename = "type")]
    kind: &'static str,
    name: String,
    id: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vmid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
}

impl Entry {
    fn new(kind: &'static str, name: &str, id: &str, status: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            id: id.to_string(),
            status: status.to_string(),
            node: None,
            vmid: None,
            host: None,
            image: None,
            namespace: None,
        }
    }

    fn matches(&self, needle: &str) -> bool {
        [
            Some(&self.name),
            Some(&self.id),
            self.image.as_ref(),
            self.host.as_ref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_ascii_lowercase().contains(needle))
    }
}

/// Flatten the inventory, optionally restricted to one `list` type.
fn entries(state: &StateSnapshot, only: Option<&str>) -> Vec<Entry> {
    let wants = |t: &str| only.is_none_or(|o| o == t);
    let mut out = Vec::new();

    if wants("nodes") {
        out.extend(
            state
                .nodes
                .iter()
                .map(|n| Entry::new("node", &n.name, &n.id, &n.status)),
        );
    }
    for (list, kind) in [("vms", &state.vms), ("containers", &state.containers)] {
        if !wants(list) {
            continue;
        }
        for g in kind.iter().filter(|g| !g.template) {
            let mut e = Entry::new(g.kind.as_str(), &g.name, &g.id, &g.status);
            e.node = Some(g.node.clone());
            e.vmid = Some(g.vmid);
            out.push(e);
        }
    }
    if wants("docker") {
        for host in &state.docker_hosts {
            let mut e = Entry::new("dockerhost", &host.hostname, &host.id, "online");
            e.host = Some(host.hostname.clone());
            out.push(e);
            for c in &host.containers {
                let mut e = Entry::new("docker", &c.name, &c.id, &c.state);
                e.host = Some(host.hostname.clone());
                e.image = Some(c.image.clone());
                out.push(e);
            }
        }
    }
    if wants("hosts") {
        out.extend(
            state
                .hosts
                .iter()
                .map(|h| Entry::new("host", &h.hostname, &h.id, &h.status)),
        );
    }
    if wants("k8s") {
        for cluster in &state.kubernetes_clusters {
            out.push(Entry::new("k8s_cluster", &cluster.name, &cluster.id, "online"));
            for pod in &cluster.pods {
                let mut e = Entry::new("k8s_pod", &pod.name, &pod.name, &pod.phase);
                e.host = Some(cluster.name.clone());
                e.namespace = Some(pod.namespace.clone());
                out.push(e);
            }
            for d in &cluster.deployments {
                let status = format!("{}/{} ready", d.ready_replicas, d.desired_replicas);
                let mut e = Entry::new("k8s_deployment", &d.name, &d.name, &status);
                e.host = Some(cluster.name.clone());
                e.namespace = Some(d.namespace.clone());
                out.push(e);
            }
        }
    }
    out
}

/// Built-in tool for browsing the fleet inventory.
pub struct QueryTool;

#[async_trait::async_trait]
impl PulseTool for QueryTool {
    fn name(&self) -> &'static str {
        "pulse_query"
    }

    fn description(&self) -> &'static str {
        "Queries the fleet inventory. action=list enumerates nodes, VMs, system containers, \
         Docker hosts and containers, standalone hosts, and Kubernetes objects. action=search \
         finds resources by name, id, or image. action=get resolves one name to its exact \
         location and shows which agent and transport a command for it would use."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ACTIONS,
                    "description": "What to do"
                },
                "type": {
                    "type": "string",
                    "enum": TYPES,
                    "description": "Restrict list to one resource type"
                },
                "status": {
                    "type": "string",
                    "description": "Only list resources with this status (e.g. running, stopped)"
                },
                "query": {
                    "type": "string",
                    "description": "Search text (action=search)"
                },
                "name": {
                    "type": "string",
                    "description": "Resource name, id, or vmid (action=get)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum rows to return (default 50, max 500)"
                },
                "offset": {
                    "type": "integer",
                    "description": "Rows to skip (default 0)"
                }
            },
            "required": ["action"]
        })
    }

    fn required_providers(&self) -> &'static [Provider] {
        &[Provider::State]
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        query(&args, ctx).unwrap_or_else(Into::into)
    }
}

fn query(call_args: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
    let action = args::require_enum(call_args, "action", ACTIONS)?;
    let state = ctx.require_state()?;
    match action.as_str() {
        "list" => list(&state, call_args),
        "search" => search(&state, call_args),
        _ => get(&state, call_args, ctx),
    }
}

fn list(state: &StateSnapshot, call_args: &Value) -> Result<ToolResult, ToolError> {
    let only = args::opt_enum(call_args, "type", TYPES)?;
    let status = args::opt_str(call_args, "status");
    let limit = args::clamp_count(args::opt_int(call_args, "limit")?, 50, 1, 500);
    let offset = args::clamp_count(args::opt_int(call_args, "offset")?, 0, 0, u32::MAX);

    let rows: Vec<Entry> = entries(state, only.as_deref())
        .into_iter()
        .filter(|e| status.is_none_or(|s| e.status.eq_ignore_ascii_case(s)))
        .collect();
    let total = rows.len();
    let page: Vec<Entry> = rows
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    Ok(ToolResult::Json(json!({
        "total": total,
        "returned": page.len(),
        "offset": offset,
        "limit": limit,
        "resources": page,
    })))
}

fn search(state: &StateSnapshot, call_args: &Value) -> Result<ToolResult, ToolError> {
    let needle = args::require_str(call_args, "query")?;
    let limit = args::clamp_count(args::opt_int(call_args, "limit")?, 50, 1, 500);
    let lowered = needle.to_ascii_lowercase();
    let matches: Vec<Entry> = entries(state, None)
        .into_iter()
        .filter(|e| e.matches(&lowered))
        .collect();
    let total = matches.len();
    let page: Vec<Entry> = matches.into_iter().take(limit as usize).collect();

    Ok(ToolResult::Json(json!({
        "query": needle,
        "total": total,
        "matches": page,
    })))
}

fn get(
    state: &StateSnapshot,
    call_args: &Value,
    ctx: &ToolContext,
) -> Result<ToolResult, ToolError> {
    let name = args::require_str(call_args, "name")?;
    let loc = resolver::resolve(state, name);
    if !loc.found {
        let lowered = name.to_ascii_lowercase();
        let mut suggestions: Vec<String> = Vec::new();
        for known in resolver::known_names(state) {
            let n = known.to_ascii_lowercase();
            if (n.contains(&lowered) || lowered.contains(&n)) && !suggestions.contains(&known) {
                suggestions.push(known);
            }
        }
        suggestions.truncate(MAX_SUGGESTIONS);
        return Err(Blocked::new(
            BlockedCode::UnknownResource,
            format!("No resource named '{name}' in the inventory"),
        )
        .with_hint("Use pulse_query action=search to find the exact name.")
        .with_detail("name", name)
        .with_detail("suggestions", suggestions)
        .into());
    }

    let agents = ctx.connected_agents();
    let routing = routing::route(Some(state), &agents, name);
    Ok(ToolResult::Json(json!({
        "location": loc,
        "routing": {
            "agent_id": routing.agent_id,
            "agent_host": routing.agent_hostname,
            "transport": if routing.has_agent() { routing.transport.as_str() } else { "none" },
            "target_type": routing.target_type,
            "target_id": routing.target_id,
            "executable": routing.has_agent(),
        },
    })))
}
