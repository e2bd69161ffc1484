//! Pulse Safety - stateless policy for commands, paths, and output.
//!
//! Everything here is pure: no I/O, no locks, no providers.
//!
//! - [`classify`]: decide whether a shell command is read-only, using a
//!   conservative allowlist over a quote-aware tokenization.
//! - [`sensitive`]: credential paths, secret-harvesting commands, and URL
//!   targets that are refused regardless of control level.
//! - [`redact`]: scrub keys, tokens, and passwords from command output.
//! - [`policy`]: hard-blocked destructive command patterns.
//!
//! # Example
//!
//! ```
//! use pulse_safety::{CommandIntent, classify};
//!
//! assert_eq!(classify("df -h | grep /var").intent, CommandIntent::ReadOnlyCertain);
//! assert_eq!(classify("rm -rf /").intent, CommandIntent::WriteOrUnknown);
//!
//! let c = classify("journalctl -u nginx");
//! assert_eq!(c.intent, CommandIntent::ReadOnlyConditional);
//! assert_eq!(
//!     c.suggested_rewrite.as_deref(),
//!     Some("journalctl -u nginx -n 1000 --no-pager")
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod classifier;
pub mod policy;
pub mod redact;
pub mod sensitive;

pub use classifier::{BlockCategory, Classification, CommandIntent, classify};
pub use policy::{CommandPolicy, PolicyViolation};
pub use redact::{REDACTED, Redacted, redact};
pub use sensitive::{
    SensitiveMatch, UrlVerdict, blocked_ip_reason, check_command, check_path, check_url,
    is_metadata_ip, is_sensitive_path, normalize_path,
};
