//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `/etc/pulse/ai.toml` (system)
//! 3. Merge the user config (`ai.toml` in the platform config dir)
//! 4. Merge the explicit file, if one was given (must exist)
//! 5. Apply environment overrides
//! 6. Deserialize merged tree → `Config`
//! 7. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_overrides, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// File name looked up in the system and user config directories.
const CONFIG_FILE_NAME: &str = "ai.toml";

/// Which files take part in a layered load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPaths {
    /// System-wide file. Skipped when missing.
    pub system: Option<PathBuf>,
    /// Per-user file. Skipped when missing.
    pub user: Option<PathBuf>,
    /// File named on the command line. Must exist.
    pub explicit: Option<PathBuf>,
}

impl ConfigPaths {
    /// Standard locations plus an optional explicit file.
    #[must_use]
    pub fn discover(explicit: Option<&Path>) -> Self {
        Self {
            system: Some(PathBuf::from("/etc/pulse").join(CONFIG_FILE_NAME)),
            user: user_config_path(),
            explicit: explicit.map(Path::to_path_buf),
        }
    }
}

/// A loaded configuration and the files that contributed to it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The validated configuration.
    pub config: Config,
    /// Files that were merged, in order.
    pub loaded_files: Vec<String>,
}

/// Load configuration from the standard locations and the process
/// environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, the explicit
/// file is missing, or the merged configuration fails validation.
pub fn load(explicit: Option<&Path>) -> ConfigResult<LoadedConfig> {
    load_layers(&ConfigPaths::discover(explicit), &collect_env_vars())
}

/// Load configuration from explicit paths and an explicit environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, the explicit
/// file is missing, or the merged configuration fails validation.
pub fn load_layers<S: ::std::hash::BuildHasher>(
    paths: &ConfigPaths,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<LoadedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut loaded_files = Vec::new();

    for (layer, path) in [("system", &paths.system), ("user", &paths.user)] {
        let Some(path) = path else {
            continue;
        };
        if let Some(overlay) = try_load_file(path)? {
            deep_merge(&mut merged, &overlay);
            loaded_files.push(path.display().to_string());
            info!(layer, path = %path.display(), "loaded config");
        }
    }

    if let Some(path) = &paths.explicit {
        let overlay = read_toml(path)?;
        deep_merge(&mut merged, &overlay);
        loaded_files.push(path.display().to_string());
        info!(layer = "explicit", path = %path.display(), "loaded config");
    }

    let env_count = apply_env_overrides(&mut merged, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment overrides");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(LoadedConfig {
        config,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering, no environment).
///
/// Keys missing from the file take their defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let value = read_toml(path)?;
    let config: Config = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Recursively deep-merge `overlay` into `base`.
///
/// - Tables merge recursively per-field.
/// - Scalars and arrays from the overlay **replace** the base value.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    match read_toml(path) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::ReadError { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            debug!(path = %path.display(), "config file not found, skipping");
            Ok(None)
        },
        Err(e) => Err(e),
    }
}

fn read_toml(path: &Path) -> ConfigResult<toml::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    // Checked after reading so there is no window between stat and read.
    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "pulse", "pulse")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
