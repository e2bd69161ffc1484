//! Pulse Approval - single-use human approval for mutating tools.
//!
//! In controlled mode every mutation is paused behind an approval record:
//!
//! 1. The handler calls [`ApprovalStore::create`] with the exact command and
//!    its binding target, then returns [`approval_required_text`] to the model.
//! 2. The operator approves out of band.
//! 3. The model calls again with `pre_approved_id`; the handler calls
//!    [`ApprovalStore::consume`], which succeeds once and only for the same
//!    command on the same target.
//!
//! Records expire after a TTL (ten minutes by default) and carry a
//! [`RiskLevel`] from [`assess_command`] for the approver.
//!
//! # Example
//!
//! ```
//! use pulse_approval::{ApprovalRequest, ApprovalStore, assess_command, approval_required_text};
//!
//! let store = ApprovalStore::new();
//! let cmd = "systemctl restart nginx";
//! let risk = assess_command(cmd, "host");
//! let record = store
//!     .create("org", ApprovalRequest::new(cmd, "host", "delly-agent").with_risk(risk.level))
//!     .unwrap();
//!
//! let text = approval_required_text(&record, "restart");
//! assert!(text.starts_with("APPROVAL_REQUIRED: "));
//! assert!(store.consume("org", &record.id, cmd, "host", "delly-agent"));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

/// Error types and results for the approval crate.
pub mod error;
pub mod record;
pub mod risk;
pub mod sentinel;
pub mod store;

pub use error::{ApprovalError, ApprovalResult};
pub use record::{ApprovalRecord, ApprovalRequest, command_hash};
pub use risk::{RiskAssessment, RiskLevel, assess_command};
pub use sentinel::{
    APPROVAL_REQUIRED_PREFIX, ApprovalPayload, SUGGESTION_PREFIX, SuggestionPayload,
    approval_required_text, parse_approval_required, parse_suggestion, suggestion_text,
};
pub use store::{ApprovalStats, ApprovalStore, DEFAULT_MAX_PENDING, DEFAULT_TTL_SECS};
