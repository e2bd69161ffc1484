//! Approval records and command binding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::risk::RiskLevel;

/// SHA-256 of `command|action_type|target_id`, lowercase hex.
///
/// Binds an approval to exactly one command on one target.
#[must_use]
pub fn command_hash(command: &str, action_type: &str, target_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(command.as_bytes());
    hasher.update(b"|");
    hasher.update(action_type.as_bytes());
    hasher.update(b"|");
    hasher.update(target_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// What a caller asks to have approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// The exact command (or operation label) that will run.
    pub command: String,
    /// Binding namespace: `host`, `container`, `vm`, `file`, `docker`, `kubernetes`.
    pub action_type: String,
    /// Binding target within the namespace.
    pub target_id: String,
    /// Human-readable target for the approver.
    pub target_label: String,
    /// Why the model wants to run it.
    pub rationale: String,
    /// Risk shown to the approver.
    pub risk_level: RiskLevel,
}

impl ApprovalRequest {
    /// Create a request. The label defaults to the target id.
    #[must_use]
    pub fn new(
        command: impl Into<String>,
        action_type: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        let target_id = target_id.into();
        Self {
            command: command.into(),
            action_type: action_type.into(),
            target_label: target_id.clone(),
            target_id,
            rationale: String::new(),
            risk_level: RiskLevel::Low,
        }
    }

    /// Set the target label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.target_label = label.into();
        self
    }

    /// Set the rationale.
    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// Set the risk level.
    #[must_use]
    pub fn with_risk(mut self, level: RiskLevel) -> Self {
        self.risk_level = level;
        self
    }
}

/// A pending, single-use approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Opaque nonce.
    pub id: String,
    /// Tenant the approval belongs to.
    pub org_id: String,
    /// Bound command.
    pub command: String,
    /// Bound action type.
    pub action_type: String,
    /// Bound target.
    pub target_id: String,
    /// Human-readable target.
    pub target_label: String,
    /// Model rationale.
    pub rationale: String,
    /// Assessed risk.
    pub risk_level: RiskLevel,
    /// [`command_hash`] of the bound fields.
    pub command_hash: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// First instant at which the record is no longer valid.
    pub expires_at: DateTime<Utc>,
}

impl ApprovalRecord {
    /// Whether the record has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the record has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether this record authorizes `command` on `target_id`.
    ///
    /// The comparison of the binding hash is constant-time.
    #[must_use]
    pub fn binds(&self, command: &str, action_type: &str, target_id: &str) -> bool {
        let presented = command_hash(command, action_type, target_id);
        presented
            .as_bytes()
            .ct_eq(self.command_hash.as_bytes())
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_hash_is_stable_hex() {
        let h = command_hash("systemctl restart nginx", "host", "delly-agent");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(h, command_hash("systemctl restart nginx", "host", "delly-agent"));
    }

    #[test]
    fn test_command_hash_covers_every_field() {
        assert_ne!(
            command_hash("ls", "host", "a"),
            command_hash("ls", "container", "a")
        );
        assert_ne!(
            command_hash("ls", "host", "a"),
            command_hash("ls -la", "host", "a")
        );
        assert_ne!(
            command_hash("ls", "host", "a"),
            command_hash("ls", "host", "b")
        );
    }

    #[test]
    fn test_request_builder_defaults_label() {
        let req = ApprovalRequest::new("ls", "container", "141")
            .with_rationale("check")
            .with_risk(RiskLevel::Medium);
        assert_eq!(req.target_label, "141");
        assert_eq!(req.rationale, "check");
        assert_eq!(req.risk_level, RiskLevel::Medium);
        assert_eq!(req.with_label("homepage-docker").target_label, "homepage-docker");
    }
}
