//! Alerts tool: firing and recently resolved alerts.

use pulse_core::{ToolResult, args};
use serde_json::{Value, json};

use crate::PulseTool;
use crate::context::{Provider, Providers, ToolContext};
use crate::error::ToolError;

const ACTIONS: &[&str] = &["active", "resolved"];
const LEVELS: &[&str] = &["warning", "critical"];

/// Built-in tool for reading alerts.
pub struct AlertsTool;

#[async_trait::async_trait]
impl PulseTool for AlertsTool {
    fn name(&self) -> &'static str {
        "pulse_alerts"
    }

    fn description(&self) -> &'static str {
        "Lists alerts. action=active returns alerts firing now with their current value and \
         threshold; action=resolved returns alerts that cleared recently. Filter by resource \
         name and level."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ACTIONS,
                    "description": "Which alerts to list (default active)"
                },
                "resource": {
                    "type": "string",
                    "description": "Only alerts whose resource name or id contains this text"
                },
                "level": {
                    "type": "string",
                    "enum": LEVELS,
                    "description": "Only alerts of this level"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum alerts to return (default 50, max 200)"
                }
            }
        })
    }

    fn required_providers(&self) -> &'static [Provider] {
        &[Provider::Alerts]
    }

    // Resolved alerts come from the inventory, so either source will do.
    fn unavailable_reason(&self, providers: &Providers) -> Option<String> {
        (!providers.has(Provider::Alerts) && !providers.has(Provider::State)).then(|| {
            format!(
                "{} is not available: {} not configured",
                self.name(),
                Provider::Alerts.label()
            )
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        alerts(&args, ctx).unwrap_or_else(Into::into)
    }
}

struct Filter {
    resource: Option<String>,
    level: Option<String>,
    limit: usize,
}

impl Filter {
    fn keeps(&self, resource_name: &str, resource_id: &str, level: &str) -> bool {
        let resource_ok = self.resource.as_deref().is_none_or(|needle| {
            resource_name.to_ascii_lowercase().contains(needle)
                || resource_id.to_ascii_lowercase().contains(needle)
        });
        let level_ok = self
            .level
            .as_deref()
            .is_none_or(|l| level.eq_ignore_ascii_case(l));
        resource_ok && level_ok
    }
}

fn alerts(call_args: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
    let action = args::opt_enum(call_args, "action", ACTIONS)?.unwrap_or_else(|| "active".into());
    let filter = Filter {
        resource: args::opt_str(call_args, "resource").map(str::to_ascii_lowercase),
        level: args::opt_enum(call_args, "level", LEVELS)?,
        limit: args::clamp_count(args::opt_int(call_args, "limit")?, 50, 1, 200) as usize,
    };

    if action == "active" {
        let Some(provider) = &ctx.providers.alerts else {
            return Ok(ToolResult::text(
                "Active alerts are not available: alert provider not configured. \
                 Use action=resolved for recently resolved alerts.",
            ));
        };
        let mut firing: Vec<_> = provider
            .active_alerts()
            .into_iter()
            .filter(|a| filter.keeps(&a.resource_name, &a.resource_id, &a.level))
            .collect();
        firing.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        let total = firing.len();
        firing.truncate(filter.limit);
        if firing.is_empty() {
            return Ok(ToolResult::text("No active alerts."));
        }
        return Ok(ToolResult::Json(json!({
            "action": "active",
            "total": total,
            "alerts": firing,
        })));
    }

    let Some(state) = ctx.snapshot() else {
        return Ok(ToolResult::text(
            "Resolved alerts are not available: state provider not configured.",
        ));
    };
    let mut resolved: Vec<_> = state
        .resolved_alerts
        .into_iter()
        .filter(|a| filter.keeps(&a.resource_name, &a.resource_id, &a.level))
        .collect();
    resolved.sort_by(|a, b| b.resolved_at.cmp(&a.resolved_at));
    let total = resolved.len();
    resolved.truncate(filter.limit);
    if resolved.is_empty() {
        return Ok(ToolResult::text("No recently resolved alerts."));
    }
    Ok(ToolResult::Json(json!({
        "action": "resolved",
        "total": total,
        "alerts": resolved,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::ControlLevel;
    use pulse_test::{MockAlertProvider, MockStateProvider, delly_fleet, test_active_alert};
    use std::sync::Arc;

    fn ctx() -> ToolContext {
        ToolContext::new(ControlLevel::ReadOnly).with_providers(
            Providers::default()
                .with_state(Arc::new(MockStateProvider::new(delly_fleet())))
                .with_alerts(Arc::new(MockAlertProvider::new(vec![test_active_alert()]))),
        )
    }

    #[tokio::test]
    async fn test_active_alerts() {
        let result = AlertsTool.execute(json!({}), &ctx()).await;
        let body = result.as_json().unwrap();
        assert_eq!(body["total"], 1);
        assert_eq!(body["alerts"][0]["resource_name"], "db-vm");
        assert_eq!(body["alerts"][0]["threshold"], 90.0);
    }

    #[tokio::test]
    async fn test_filters() {
        let result = AlertsTool
            .execute(json!({"level": "critical"}), &ctx())
            .await;
        assert_eq!(result.as_text(), Some("No active alerts."));

        let result = AlertsTool
            .execute(json!({"action": "resolved", "resource": "HOMEPAGE"}), &ctx())
            .await;
        let body = result.as_json().unwrap();
        assert_eq!(body["alerts"][0]["kind"], "memory");
    }

    #[tokio::test]
    async fn test_resolved_without_alert_provider() {
        let ctx = ToolContext::new(ControlLevel::ReadOnly).with_providers(
            Providers::default().with_state(Arc::new(MockStateProvider::new(delly_fleet()))),
        );
        let result = AlertsTool.execute(json!({"action": "active"}), &ctx).await;
        assert!(result.as_text().unwrap().contains("not available"));
        let result = AlertsTool.execute(json!({"action": "resolved"}), &ctx).await;
        assert_eq!(result.as_json().unwrap()["total"], 1);
    }

    #[test]
    fn test_available_with_either_provider() {
        assert!(AlertsTool.unavailable_reason(&Providers::default()).is_some());
        let state_only =
            Providers::default().with_state(Arc::new(MockStateProvider::default()));
        assert!(AlertsTool.unavailable_reason(&state_only).is_none());
    }
}
