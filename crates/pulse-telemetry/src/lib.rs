//! Pulse Telemetry - logging and per-call tracing for the Pulse AI tool core.
//!
//! This crate provides:
//! - [`LogConfig`] and [`setup_logging`] for the global `tracing` subscriber
//! - [`RequestContext`], whose span wraps every tool dispatch
//! - With the `config` feature, a conversion from the `[logging]` config section
//!
//! # Example
//!
//! ```rust,no_run
//! use pulse_telemetry::{LogConfig, LogFormat, RequestContext, setup_logging};
//!
//! # fn main() -> Result<(), pulse_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Json)
//!     .with_directive("pulse_tools=debug");
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("pulse_read").with_target_host("delly");
//! let span = ctx.span();
//! let _guard = span.enter();
//! tracing::info!("dispatching");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::RequestContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
