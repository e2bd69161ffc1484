//! Hard-blocked command patterns.
//!
//! A [`CommandPolicy`] refuses commands that are never worth an approval
//! prompt: wiping the root filesystem, formatting block devices, fork
//! bombs. It is checked before risk assessment on every control tool and
//! cannot be bypassed by approval or by the autonomous control level.
//!
//! Operators can add patterns through `safety.blocked_commands`.

use regex::Regex;
use std::fmt;

/// Built-in `(pattern, reason)` pairs.
const BUILTIN: &[(&str, &str)] = &[
    (
        r"(?i)\brm\s+(?:-\S+\s+)*(?:--no-preserve-root\s+)?(?:-\S+\s+)*/\*?(?:\s|$)",
        "recursive delete of the root filesystem",
    ),
    (
        r"(?i)\bmkfs(?:\.\w+)?\s+.*?/dev/",
        "formatting a block device",
    ),
    (
        r"(?i)\bdd\b.*\bof=/dev/(?:sd|nvme|hd|vd|xvd|mmcblk|disk)",
        "raw write to a block device",
    ),
    (
        r">\s*/dev/(?:sd[a-z]|nvme\d|hd[a-z]|vd[a-z]|xvd[a-z]|mmcblk\d)",
        "redirecting output onto a block device",
    ),
    (
        r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
        "fork bomb",
    ),
    (
        r"(?i)\bchmod\s+(?:-\S+\s+)*0?777\s+/(?:\s|$)",
        "making the root filesystem world-writable",
    ),
    (
        r"(?i)\b(?:wipefs\s+(?:-\S+\s+)*(?:-a|--all)|sgdisk\s+(?:-\S+\s+)*(?:-Z|--zap-all))\b",
        "erasing partition tables",
    ),
];

/// A refused command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyViolation {
    /// The pattern that matched.
    pub pattern: String,
    /// Why the pattern is blocked.
    pub reason: String,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blocked by policy: {}", self.reason)
    }
}

/// Hard-block rules for shell commands.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    rules: Vec<(Regex, String)>,
}

impl CommandPolicy {
    /// Policy with the built-in rules only.
    #[must_use]
    pub fn new() -> Self {
        let rules = BUILTIN
            .iter()
            .filter_map(|(pattern, reason)| match Regex::new(pattern) {
                Ok(re) => Some((re, (*reason).to_string())),
                Err(e) => {
                    tracing::error!(pattern, error = %e, "Invalid built-in block pattern");
                    None
                },
            })
            .collect();
        Self { rules }
    }

    /// Built-in rules plus operator-supplied regular expressions.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn with_patterns(patterns: &[String]) -> Result<Self, regex::Error> {
        let mut policy = Self::new();
        for pattern in patterns {
            let re = Regex::new(pattern)?;
            policy
                .rules
                .push((re, "matches a configured blocked pattern".to_string()));
        }
        Ok(policy)
    }

    /// Number of active rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check a command. Returns the first matching rule.
    #[must_use]
    pub fn check(&self, command: &str) -> Option<PolicyViolation> {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(command))
            .map(|(re, reason)| PolicyViolation {
                pattern: re.as_str().to_string(),
                reason: reason.clone(),
            })
    }
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self::new()
    }
}
