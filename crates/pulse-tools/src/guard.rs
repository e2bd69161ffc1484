//! Pre-execution guards shared by the mutating tools.
//!
//! Each guard either passes or returns a [`Blocked`] error that the handler
//! propagates with `?`. None of them touch the transport.

use pulse_core::{Blocked, BlockedCode, ConnectedAgent, StateSnapshot, TargetType};
use pulse_safety::{SensitiveMatch, check_command};
use tracing::warn;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::resolver::{self, DockerHostType};
use crate::routing::{self, Routing, Transport};

/// Most names listed in an "unknown target" hint.
const MAX_CANDIDATES: usize = 20;

/// Turn a sensitive path or command match into a non-recoverable block.
pub(crate) fn sensitive_block(found: SensitiveMatch) -> ToolError {
    warn!(code = %found.code, matched = %found.matched, "Refusing sensitive target");
    Blocked::new(found.code, found.reason)
        .with_hint("This target is never accessible through tools. Do not retry with a variation.")
        .with_detail("matched", found.matched)
        .into()
}

/// Refuse a command that matches the hard-block policy or harvests secrets.
pub(crate) fn check_command_allowed(ctx: &ToolContext, command: &str) -> Result<(), ToolError> {
    if let Some(violation) = ctx.settings.policy.check(command) {
        warn!(pattern = %violation.pattern, "Command refused by policy");
        return Err(Blocked::new(
            BlockedCode::PolicyBlocked,
            format!("Command blocked by security policy: {}", violation.reason),
        )
        .with_hint("This command is never run by tools. Do not retry with a variation.")
        .with_detail("command", command)
        .with_detail("pattern", violation.pattern)
        .into());
    }
    match check_command(command, ctx.settings.allow_loopback) {
        Some(found) => Err(sensitive_block(found)),
        None => Ok(()),
    }
}

/// Refuse a mutation that names a hypervisor node which hosts guests.
///
/// The model usually means one of the guests. Candidates are listed
/// system containers first, then VMs.
pub(crate) fn check_ambiguous_node(
    state: &StateSnapshot,
    agents: &[ConnectedAgent],
    target_host: &str,
) -> Result<(), ToolError> {
    let loc = resolver::resolve(state, target_host);
    if loc.resource_type != Some(resolver::ResourceType::Node) {
        return Ok(());
    }
    let node = loc.node.unwrap_or(loc.target_host);
    let candidates: Vec<String> = state
        .guests_on_node(&node)
        .into_iter()
        .map(|g| g.name.clone())
        .collect();
    if candidates.is_empty() {
        return Ok(());
    }

    let mut hint = format!(
        "Set target_host to the guest you mean: {}.",
        candidates.join(", ")
    );
    if let Some(agent) = routing::agent_for_node(agents, &node)
        && !agent.agent_id.eq_ignore_ascii_case(target_host)
    {
        hint.push_str(&format!(
            " To act on the node itself, use its agent id '{}' as target_host.",
            agent.agent_id
        ));
    }

    Err(Blocked::new(
        BlockedCode::AmbiguousHostTarget,
        format!(
            "'{target_host}' is a hypervisor node hosting {} guest(s); the target is ambiguous",
            candidates.len()
        ),
    )
    .with_hint(hint)
    .with_detail("target_host", target_host)
    .with_detail("node", node)
    .with_detail("candidates", candidates)
    .into())
}

/// Refuse or warn about a mutation on a name nobody knows.
///
/// A name counts as resolved when the inventory has it or a connected agent
/// matches it by hostname or id.
pub(crate) fn check_strict_resolution(
    ctx: &ToolContext,
    state: Option<&StateSnapshot>,
    agents: &[ConnectedAgent],
    target_host: &str,
    action: &str,
) -> Result<(), ToolError> {
    let in_inventory = state.is_some_and(|s| resolver::resolve(s, target_host).found);
    if in_inventory || routing::find_agent(agents, target_host).is_some() {
        return Ok(());
    }

    if !ctx.strict_resolution() {
        warn!(
            target_host,
            action, "Mutation targets an unresolved name; continuing in soft mode"
        );
        return Ok(());
    }

    let mut candidates: Vec<String> = state.map(resolver::known_names).unwrap_or_default();
    for agent in agents {
        if !candidates.iter().any(|c| c.eq_ignore_ascii_case(&agent.hostname)) {
            candidates.push(agent.hostname.clone());
        }
    }
    candidates.truncate(MAX_CANDIDATES);

    Err(Blocked::new(
        BlockedCode::UnknownResource,
        format!(
            "Unknown target '{target_host}': it is not in the inventory and no connected agent \
             matches it"
        ),
    )
    .with_hint("Use pulse_query action=search to find the exact name, then retry.")
    .with_detail("target_host", target_host)
    .with_detail("action", action)
    .with_detail("candidates", candidates)
    .into())
}

/// Refuse to run a guest-bound command anywhere but inside the guest.
///
/// Reads a fresh snapshot. If the target is a guest, or a Docker host
/// living in one, the routing must use a guest exec transport and have an
/// agent; otherwise the command would land on the hypervisor's filesystem.
pub(crate) fn check_write_context(
    ctx: &ToolContext,
    target_host: &str,
    routing: &Routing,
) -> Result<(), ToolError> {
    let Some(state) = ctx.snapshot() else {
        return Ok(());
    };
    let loc = resolver::resolve(&state, target_host);
    let inside_guest = loc.is_guest()
        || matches!(
            loc.docker_host_type,
            Some(DockerHostType::Lxc | DockerHostType::Vm)
        );
    if !inside_guest {
        return Ok(());
    }

    let direct_on_host =
        routing.transport == Transport::Direct && routing.target_type == TargetType::Host;
    if routing.has_agent() && !direct_on_host {
        return Ok(());
    }

    let kind = loc.resource_type.map_or("guest", resolver::ResourceType::as_str);
    let node = loc.node.unwrap_or_default();
    let transport = if routing.has_agent() {
        routing.transport.as_str()
    } else {
        "none"
    };
    let hint = if routing.has_agent() {
        format!(
            "The command would run on '{}' instead of inside '{target_host}'. Install the \
             Pulse agent on node '{node}' so commands can be routed into the guest.",
            routing.agent_hostname
        )
    } else {
        format!(
            "No agent is connected on node '{node}'. Install the Pulse agent on node \
             '{node}' so commands can be routed into the guest."
        )
    };

    warn!(
        target_host,
        resolved_kind = kind,
        resolved_node = %node,
        transport,
        agent_host = %routing.agent_hostname,
        "Refusing guest command without a guest exec path"
    );

    Err(Blocked::new(
        BlockedCode::ExecutionContextUnavailable,
        format!("'{target_host}' is a {kind} on node '{node}' but no guest exec path is available"),
    )
    .with_hint(hint)
    .with_detail("target_host", target_host)
    .with_detail("resolved_kind", kind)
    .with_detail("resolved_node", node)
    .with_detail("transport", transport)
    .with_detail("agent_host", routing.agent_hostname.clone())
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutorSettings;
    use crate::context::Providers;
    use pulse_core::{ControlLevel, Guest, Node};
    use pulse_test::MockStateProvider;
    use std::sync::Arc;

    fn state() -> StateSnapshot {
        StateSnapshot {
            nodes: vec![Node::new("cluster-delly", "delly"), Node::new("cluster-bare", "bare")],
            containers: vec![
                Guest::container(141, "homepage-docker", "delly"),
                Guest::container(999, "tmpl", "delly").as_template(),
            ],
            vms: vec![Guest::vm(200, "db-vm", "delly")],
            ..StateSnapshot::default()
        }
    }

    fn agents() -> Vec<ConnectedAgent> {
        vec![ConnectedAgent::new("delly-agent", "delly")]
    }

    fn ctx(level: ControlLevel, state: StateSnapshot) -> ToolContext {
        ToolContext::new(level).with_providers(
            Providers::default().with_state(Arc::new(MockStateProvider::new(state))),
        )
    }

    fn blocked(result: Result<(), ToolError>) -> Blocked {
        match result {
            Err(ToolError::Blocked(b)) => *b,
            other => panic!("expected a block, got {other:?}"),
        }
    }

    #[test]
    fn test_node_with_guests_is_ambiguous() {
        let b = blocked(check_ambiguous_node(&state(), &agents(), "delly"));
        assert_eq!(b.code, BlockedCode::AmbiguousHostTarget);
        assert_eq!(
            b.details.extra["candidates"],
            serde_json::json!(["homepage-docker", "db-vm"])
        );
        assert!(!b.details.auto_recoverable);
        assert!(
            b.details
                .recovery_hint
                .as_deref()
                .unwrap()
                .contains("delly-agent")
        );
    }

    #[test]
    fn test_guest_and_empty_node_are_not_ambiguous() {
        assert!(check_ambiguous_node(&state(), &agents(), "homepage-docker").is_ok());
        assert!(check_ambiguous_node(&state(), &agents(), "bare").is_ok());
        assert!(check_ambiguous_node(&state(), &agents(), "delly-agent").is_ok());
    }

    #[test]
    fn test_strict_resolution_blocks_unknown() {
        let ctx = ctx(ControlLevel::Controlled, state());
        let s = state();
        let b = blocked(check_strict_resolution(
            &ctx,
            Some(&s),
            &agents(),
            "ghost",
            "write",
        ));
        assert_eq!(b.code, BlockedCode::UnknownResource);
        let candidates = b.details.extra["candidates"].as_array().unwrap();
        assert!(candidates.iter().any(|c| c == "db-vm"));
    }

    #[test]
    fn test_soft_mode_allows_unknown() {
        let ctx = ctx(ControlLevel::Suggest, state());
        let s = state();
        assert!(check_strict_resolution(&ctx, Some(&s), &agents(), "ghost", "write").is_ok());

        let ctx = ToolContext::new(ControlLevel::Autonomous)
            .with_settings(ExecutorSettings::default().with_strict_resolution(false));
        assert!(check_strict_resolution(&ctx, Some(&s), &agents(), "ghost", "write").is_ok());
    }

    #[test]
    fn test_agent_name_counts_as_resolved() {
        let ctx = ctx(ControlLevel::Autonomous, state());
        assert!(check_strict_resolution(&ctx, None, &agents(), "delly-agent", "run").is_ok());
        assert!(check_strict_resolution(&ctx, None, &agents(), "DELLY", "run").is_ok());
    }

    #[test]
    fn test_guest_routed_direct_is_refused() {
        let ctx = ctx(ControlLevel::Autonomous, state());
        let routing = Routing {
            agent_id: "homepage-agent".to_string(),
            agent_hostname: "homepage-docker".to_string(),
            ..Routing::default()
        };
        let b = blocked(check_write_context(&ctx, "homepage-docker", &routing));
        assert_eq!(b.code, BlockedCode::ExecutionContextUnavailable);
        assert_eq!(b.details.extra["resolved_kind"], "system-container");
        assert_eq!(b.details.extra["resolved_node"], "delly");
        assert_eq!(b.details.extra["transport"], "direct");
        assert_eq!(b.details.extra["agent_host"], "homepage-docker");
        assert!(!b.details.auto_recoverable);
    }

    #[test]
    fn test_guest_without_agent_is_refused() {
        let ctx = ctx(ControlLevel::Autonomous, state());
        let routing = routing::route(Some(&state()), &[], "db-vm");
        let b = blocked(check_write_context(&ctx, "db-vm", &routing));
        assert_eq!(b.details.extra["transport"], "none");
    }

    #[test]
    fn test_guest_exec_passes() {
        let ctx = ctx(ControlLevel::Autonomous, state());
        let routing = routing::route(Some(&state()), &agents(), "homepage-docker");
        assert!(check_write_context(&ctx, "homepage-docker", &routing).is_ok());
        let routing = routing::route(Some(&state()), &agents(), "delly-agent");
        assert!(check_write_context(&ctx, "delly-agent", &routing).is_ok());
    }
}
