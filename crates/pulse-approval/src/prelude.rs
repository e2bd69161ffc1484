//! Prelude module - commonly used types for convenient import.
//!
//! Use `use pulse_approval::prelude::*;` to import all essential types.

pub use crate::{ApprovalError, ApprovalResult};

pub use crate::{ApprovalRecord, ApprovalRequest, ApprovalStore};

pub use crate::{RiskAssessment, RiskLevel, assess_command};

pub use crate::{approval_required_text, suggestion_text};
