//! Risk assessment for mutating commands.
//!
//! The level is shown to the approver and recorded on the approval. It does
//! not change whether approval is needed: in controlled mode every mutation
//! is gated regardless of level.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use regex::RegexSet;

/// How dangerous a mutation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Everything not matched below.
    Low,
    /// Service restarts, package installs, guest lifecycle.
    Medium,
    /// Destructive or hard to undo.
    High,
}

impl RiskLevel {
    /// Wire form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assessment of a single command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// The assessed level.
    pub level: RiskLevel,
    /// Why this level was assigned.
    pub reason: String,
}

impl RiskAssessment {
    /// Create a new assessment.
    #[must_use]
    pub fn new(level: RiskLevel, reason: impl Into<String>) -> Self {
        Self {
            level,
            reason: reason.into(),
        }
    }
}

const HIGH_PATTERNS: &[&str] = &[
    r"(?i)\brm\s+(-[a-z]*r[a-z]*|--recursive)\s",
    r"(?i)\bdd\s+.*of=/dev/",
    r"(?i)\bmkfs\b",
    r"(?i)\bchmod\s+(-R\s+)?777\b",
    r"(?i)\bapt(-get)?\s+(remove|purge)\b",
    r"(?i)\byum\s+(remove|erase)\b",
    r"(?i)\bdnf\s+remove\b",
    r"(?i)\bpacman\s+-R",
    r"(?i)\biptables\s+-F\b",
    r"(?i)\bsystemctl\s+(disable|mask)\b",
    r"(?i)\bkill\s+-9\s",
    r"(?i)\bpkill\s+-9\b",
    r"(?i)\bdocker\s+rm\s+-f\b",
    r"(?i)\bdocker\s+system\s+prune\b",
    r"(?i)\bpct\s+destroy\b",
    r"(?i)\bqm\s+destroy\b",
    r"(?i)\bkubectl\s+delete\b",
];

const MEDIUM_PATTERNS: &[&str] = &[
    r"(?i)\bsystemctl\s+(restart|stop|start|reload)\b",
    r"(?i)\bservice\s+\S+\s+(restart|stop|start)\b",
    r"(?i)\bdocker\s+(restart|stop|start|kill|pause|unpause)\b",
    r"(?i)\bapt(-get)?\s+(update|upgrade|install)\b",
    r"(?i)\byum\s+(update|install)\b",
    r"(?i)\bdnf\s+(update|install)\b",
    r"(?i)\bpct\s+(start|stop|shutdown|reboot|resize)\b",
    r"(?i)\bqm\s+(start|stop|shutdown|reboot|resize)\b",
    r"(?i)\bkubectl\s+(scale|rollout|cordon|uncordon|drain)\b",
    r"(?i)\bkill\b",
    r"(?i)\bpkill\b",
    r"(?i)\bchmod\b",
    r"(?i)\bchown\b",
    r"(?i)\bmv\s",
    r"(?i)\bcp\s+-r",
];

static HIGH: LazyLock<RegexSet> =
    LazyLock::new(|| RegexSet::new(HIGH_PATTERNS).expect("invalid regex"));
static MEDIUM: LazyLock<RegexSet> =
    LazyLock::new(|| RegexSet::new(MEDIUM_PATTERNS).expect("invalid regex"));

/// Assess a command about to run on `target_type`.
///
/// Medium-risk commands escalate to high when they run directly on a
/// hypervisor node.
#[must_use]
pub fn assess_command(command: &str, target_type: &str) -> RiskAssessment {
    if HIGH.is_match(command) {
        return RiskAssessment::new(RiskLevel::High, "destructive or hard-to-reverse command");
    }
    if MEDIUM.is_match(command) {
        if target_type.eq_ignore_ascii_case("node") {
            return RiskAssessment::new(
                RiskLevel::High,
                "service or process change on a hypervisor node",
            );
        }
        return RiskAssessment::new(RiskLevel::Medium, "service, package, or process change");
    }
    RiskAssessment::new(RiskLevel::Low, "no destructive pattern matched")
}
