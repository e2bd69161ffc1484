//! Capabilities tool: what the assistant may do right now.

use pulse_core::ToolResult;
use serde_json::{Value, json};

use crate::PulseTool;
use crate::context::{Provider, ToolContext};

/// Built-in tool reporting control level, agents, and configured providers.
pub struct CapabilitiesTool;

#[async_trait::async_trait]
impl PulseTool for CapabilitiesTool {
    fn name(&self) -> &'static str {
        "pulse_get_capabilities"
    }

    fn description(&self) -> &'static str {
        "Reports the current control level, which agents are connected, which data sources \
         are configured, and which guests are protected. Call this first when unsure whether \
         an action is possible."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> ToolResult {
        let agents = ctx.connected_agents();
        let level = ctx.control_level;
        ToolResult::Json(json!({
            "control_level": level.as_str(),
            "can_execute": level.can_execute(),
            "can_control": level.allows_control_tools(),
            "strict_resolution": ctx.strict_resolution(),
            "connected_agents": agents,
            "agent_count": agents.len(),
            "features": {
                "inventory": ctx.providers.has(Provider::State),
                "command_execution": ctx.providers.has(Provider::Transport),
                "alerts": ctx.providers.has(Provider::Alerts),
                "docker_updates": ctx.providers.has(Provider::Updates),
            },
            "protected_guests": ctx.settings.protected_guests,
        }))
    }
}
