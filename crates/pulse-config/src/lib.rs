#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for the Pulse AI tool dispatch core.
//!
//! # Usage
//!
//! ```rust,no_run
//! use pulse_config::Config;
//!
//! let loaded = Config::load(None).unwrap();
//! println!("control level: {}", loaded.config.control.level);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment variables** (`PULSE_AI_CONTROL_LEVEL`,
//!    `PULSE_STRICT_RESOLUTION`, `PULSE_AI_ALLOW_LOOPBACK`,
//!    `PULSE_AI_LOG_LEVEL`, `PULSE_AI_ORG_ID`)
//! 2. **Explicit file** passed to [`Config::load`]
//! 3. **User** (`ai.toml` in the platform config directory)
//! 4. **System** (`/etc/pulse/ai.toml`)
//! 5. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate has no dependencies on other internal pulse crates.

/// Environment variable overrides.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigPaths, LoadedConfig};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed, the
    /// explicit file is missing, or the result fails validation.
    pub fn load(explicit: Option<&std::path::Path>) -> ConfigResult<LoadedConfig> {
        loader::load(explicit)
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
