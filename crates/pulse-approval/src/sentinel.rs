//! Text sentinels returned to the model instead of executing.
//!
//! A controlled-mode mutation answers with `APPROVAL_REQUIRED: {json}`;
//! a suggest-mode mutation answers with `SUGGESTION: {json}`. Both carry
//! `do_not_retry: true` so the model waits for the operator instead of
//! calling again.

use serde::{Deserialize, Serialize};

use crate::record::ApprovalRecord;

/// Prefix of an approval sentinel.
pub const APPROVAL_REQUIRED_PREFIX: &str = "APPROVAL_REQUIRED: ";

/// Prefix of a suggest-mode sentinel.
pub const SUGGESTION_PREFIX: &str = "SUGGESTION: ";

/// Payload of an `APPROVAL_REQUIRED:` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPayload {
    /// Always `approval_required`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Id to pass back as `pre_approved_id`.
    pub approval_id: String,
    /// What the mutation does (`restart`, `write`, `scale`, ...).
    pub action: String,
    /// Human-readable target.
    pub target: String,
    /// The exact command that will run.
    pub command: String,
    /// Explanation for the model.
    pub message: String,
    /// Assessed risk.
    pub risk_level: String,
    /// Instruction for obtaining the approval.
    pub how_to_approve: String,
    /// Always `true`.
    pub do_not_retry: bool,
}

/// Payload of a `SUGGESTION:` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionPayload {
    /// Always `suggestion`.
    #[serde(rename = "type")]
    pub kind: String,
    /// What the mutation would do.
    pub action: String,
    /// Human-readable target.
    pub target: String,
    /// The command that would run.
    pub command: String,
    /// Explanation for the model.
    pub message: String,
    /// Always `true`.
    pub do_not_retry: bool,
}

fn render<T: Serialize>(prefix: &str, payload: &T) -> String {
    match serde_json::to_string(payload) {
        Ok(json) => format!("{prefix}{json}"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize sentinel payload");
            format!("{prefix}{{\"do_not_retry\":true}}")
        },
    }
}

/// Render the approval sentinel for a freshly issued record.
#[must_use]
pub fn approval_required_text(record: &ApprovalRecord, action: &str) -> String {
    let payload = ApprovalPayload {
        kind: "approval_required".to_string(),
        approval_id: record.id.clone(),
        action: action.to_string(),
        target: record.target_label.clone(),
        command: record.command.clone(),
        message: format!(
            "Approval required to {action} on {}. The operator must approve this request; \
             do not retry until it has been approved.",
            record.target_label
        ),
        risk_level: record.risk_level.as_str().to_string(),
        how_to_approve: format!(
            "After the operator approves, call the same tool again with the same arguments \
             and pre_approved_id=\"{}\".",
            record.id
        ),
        do_not_retry: true,
    };
    render(APPROVAL_REQUIRED_PREFIX, &payload)
}

/// Render the suggest-mode sentinel.
#[must_use]
pub fn suggestion_text(action: &str, target: &str, command: &str) -> String {
    let payload = SuggestionPayload {
        kind: "suggestion".to_string(),
        action: action.to_string(),
        target: target.to_string(),
        command: command.to_string(),
        message: format!(
            "Suggest mode is active: nothing was executed. Ask the operator to run this \
             command on {target}, or to raise the control level."
        ),
        do_not_retry: true,
    };
    render(SUGGESTION_PREFIX, &payload)
}

/// Parse an approval sentinel back into its payload.
#[must_use]
pub fn parse_approval_required(text: &str) -> Option<ApprovalPayload> {
    let json = text.strip_prefix(APPROVAL_REQUIRED_PREFIX)?;
    serde_json::from_str(json).ok()
}

/// Parse a suggestion sentinel back into its payload.
#[must_use]
pub fn parse_suggestion(text: &str) -> Option<SuggestionPayload> {
    let json = text.strip_prefix(SUGGESTION_PREFIX)?;
    serde_json::from_str(json).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApprovalRequest, ApprovalStore, RiskLevel};

    #[test]
    fn test_approval_sentinel_shape() {
        let store = ApprovalStore::new();
        let record = store
            .create(
                "org",
                ApprovalRequest::new(
                    "kubectl -n default scale deployment nginx --replicas=3",
                    "kubernetes",
                    "c1:default:deployment:nginx",
                )
                .with_label("c1/default/nginx")
                .with_risk(RiskLevel::Medium),
            )
            .unwrap();

        let text = approval_required_text(&record, "scale");
        assert!(text.starts_with("APPROVAL_REQUIRED: {"));

        let value: serde_json::Value =
            serde_json::from_str(text.strip_prefix(APPROVAL_REQUIRED_PREFIX).unwrap()).unwrap();
        assert_eq!(value["type"], "approval_required");
        assert_eq!(value["approval_id"], record.id.as_str());
        assert_eq!(value["do_not_retry"], true);
        assert_eq!(value["risk_level"], "medium");

        let payload = parse_approval_required(&text).unwrap();
        assert_eq!(payload.action, "scale");
        assert_eq!(payload.target, "c1/default/nginx");
        assert!(payload.how_to_approve.contains(&record.id));
    }

    #[test]
    fn test_suggestion_sentinel_shape() {
        let text = suggestion_text("restart", "delly", "systemctl restart nginx");
        assert!(text.starts_with("SUGGESTION: {"));
        let payload = parse_suggestion(&text).unwrap();
        assert_eq!(payload.kind, "suggestion");
        assert_eq!(payload.command, "systemctl restart nginx");
        assert!(payload.do_not_retry);
        assert!(parse_approval_required(&text).is_none());
    }

    #[test]
    fn test_parse_rejects_plain_text() {
        assert!(parse_approval_required("Command completed").is_none());
        assert!(parse_approval_required("APPROVAL_REQUIRED: not json").is_none());
    }
}
