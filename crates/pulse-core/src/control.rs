//! Control level policy ladder.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// How much authority the assistant has over the fleet.
///
/// Ordered: `ReadOnly < Suggest < Controlled < Autonomous`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ControlLevel {
    /// No mutation tools are exposed.
    #[default]
    ReadOnly,
    /// Mutation tools describe the command they would run, never execute.
    Suggest,
    /// Mutation tools require a single-use human approval.
    Controlled,
    /// Mutation tools execute without per-call approval.
    Autonomous,
}

impl ControlLevel {
    /// Stable string form used in configuration and tool output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::Suggest => "suggest",
            Self::Controlled => "controlled",
            Self::Autonomous => "autonomous",
        }
    }

    /// Whether mutation tools may be advertised at this level.
    #[must_use]
    pub fn allows_control_tools(self) -> bool {
        self > Self::ReadOnly
    }

    /// Whether mutations may actually reach the transport at this level.
    #[must_use]
    pub fn can_execute(self) -> bool {
        self >= Self::Controlled
    }
}

impl fmt::Display for ControlLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "read_only" | "readonly" => Ok(Self::ReadOnly),
            "suggest" => Ok(Self::Suggest),
            "controlled" => Ok(Self::Controlled),
            "autonomous" => Ok(Self::Autonomous),
            _ => Err(CoreError::UnknownControlLevel(s.to_string())),
        }
    }
}
