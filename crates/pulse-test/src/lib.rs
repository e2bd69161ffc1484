//! Pulse Test - Shared test utilities for the Pulse AI tool core.
//!
//! This crate provides mock providers and fleet fixtures that can be used
//! across the Pulse crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! pulse-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! #[cfg(test)]
//! mod tests {
//!     use pulse_test::{MockTransport, fleet_agents};
//!     use pulse_core::{AgentTransport, CommandOutput, CommandRequest};
//!
//!     #[tokio::test]
//!     async fn test_uptime() {
//!         let transport = MockTransport::new()
//!             .with_agents(fleet_agents())
//!             .on_command("uptime", CommandOutput::ok("up 3 days"));
//!
//!         let out = transport
//!             .execute_command("delly-agent", CommandRequest::host("uptime"))
//!             .await
//!             .unwrap();
//!         assert_eq!(out.stdout, "up 3 days");
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

/// Install a test-friendly tracing subscriber once.
///
/// Honors `RUST_LOG`; output goes through the test harness capture.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
