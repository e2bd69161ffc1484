//! The control-level and approval gate in front of every mutation.

use pulse_approval::{
    ApprovalRequest, approval_required_text, assess_command, suggestion_text,
};
use pulse_core::{ControlLevel, ToolResult, args};
use serde_json::Value;
use tracing::{info, warn};

use crate::context::ToolContext;

/// What an approval is bound to.
#[derive(Debug, Clone)]
pub(crate) struct ApprovalBinding {
    /// Exact command that will run.
    pub(crate) command: String,
    /// Binding class: `host`, `container`, `vm`, `file`, `docker`, ...
    pub(crate) action_type: String,
    /// Binding target, e.g. an agent id or `node:vmid`.
    pub(crate) target_id: String,
    /// Human label shown to the approver.
    pub(crate) target_label: String,
    /// Why the mutation is wanted.
    pub(crate) rationale: Option<String>,
    /// Target type fed to the risk assessment.
    pub(crate) risk_target: &'static str,
}

impl ApprovalBinding {
    pub(crate) fn new(
        command: impl Into<String>,
        action_type: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            action_type: action_type.into(),
            target_id: target_id.into(),
            target_label: String::new(),
            rationale: None,
            risk_target: "host",
        }
    }

    pub(crate) fn with_label(mut self, label: impl Into<String>) -> Self {
        self.target_label = label.into();
        self
    }

    pub(crate) fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub(crate) fn with_risk_target(mut self, risk_target: &'static str) -> Self {
        self.risk_target = risk_target;
        self
    }
}

/// Gate outcome.
#[derive(Debug)]
pub(crate) enum Authorization {
    /// Run the command now.
    Proceed,
    /// Return this to the caller instead of running.
    Respond(ToolResult),
}

/// Decide whether the mutation described by `binding` may run.
///
/// `action` is the human verb used in sentinels; `shown_command` is what a
/// suggestion displays, which may differ from the bound command (file
/// writes show a summary rather than the base64 payload).
pub(crate) fn authorize(
    ctx: &ToolContext,
    call_args: &Value,
    binding: &ApprovalBinding,
    action: &str,
    shown_command: &str,
) -> Authorization {
    let pre_approved = args::opt_str(call_args, "pre_approved_id");

    match ctx.control_level {
        ControlLevel::ReadOnly => Authorization::Respond(ToolResult::text(format!(
            "Cannot {action}: control actions are not available in read-only mode."
        ))),
        ControlLevel::Suggest => {
            let label = if binding.target_label.is_empty() {
                &binding.target_id
            } else {
                &binding.target_label
            };
            Authorization::Respond(ToolResult::text(suggestion_text(action, label, shown_command)))
        },
        ControlLevel::Autonomous => {
            if let Some(id) = pre_approved {
                let consumed = ctx.approvals.consume(
                    &ctx.org_id,
                    id,
                    &binding.command,
                    &binding.action_type,
                    &binding.target_id,
                );
                info!(approval_id = id, consumed, "Autonomous mode, approval not required");
            }
            Authorization::Proceed
        },
        ControlLevel::Controlled => {
            if let Some(id) = pre_approved {
                if ctx.approvals.consume(
                    &ctx.org_id,
                    id,
                    &binding.command,
                    &binding.action_type,
                    &binding.target_id,
                ) {
                    return Authorization::Proceed;
                }
                warn!(
                    approval_id = id,
                    action_type = %binding.action_type,
                    target_id = %binding.target_id,
                    "Pre-approval rejected, issuing a new approval"
                );
            }
            Authorization::Respond(request_approval(ctx, binding, action))
        },
    }
}

fn request_approval(ctx: &ToolContext, binding: &ApprovalBinding, action: &str) -> ToolResult {
    let risk = assess_command(&binding.command, binding.risk_target);
    let mut request = ApprovalRequest::new(
        binding.command.clone(),
        binding.action_type.clone(),
        binding.target_id.clone(),
    )
    .with_risk(risk.level);
    if !binding.target_label.is_empty() {
        request = request.with_label(binding.target_label.clone());
    }
    if let Some(rationale) = &binding.rationale {
        request = request.with_rationale(rationale.clone());
    }

    match ctx.approvals.create(&ctx.org_id, request) {
        Ok(record) => ToolResult::text(approval_required_text(&record, action)),
        Err(e) => ToolResult::error(format!("failed to create approval: {e}")),
    }
}
