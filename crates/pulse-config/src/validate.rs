//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

const CONTROL_LEVELS: &[&str] = &["read_only", "readonly", "suggest", "controlled", "autonomous"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_control(config)?;
    validate_approvals(config)?;
    validate_safety(config)?;
    validate_execution(config)?;
    validate_http(config)?;
    validate_logging(config)?;
    validate_org(config)?;
    Ok(())
}

/// Normalize a control level string the way the tool layer parses it.
#[must_use]
pub fn normalize_level(level: &str) -> String {
    level.trim().to_ascii_lowercase().replace('-', "_")
}

fn validate_control(config: &Config) -> ConfigResult<()> {
    let level = normalize_level(&config.control.level);
    if !CONTROL_LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::invalid(
            "control.level",
            format!(
                "unknown control level '{}'; expected one of: read_only, suggest, \
                 controlled, autonomous",
                config.control.level
            ),
        ));
    }
    if config
        .control
        .protected_guests
        .iter()
        .any(|g| g.trim().is_empty())
    {
        return Err(ConfigError::invalid(
            "control.protected_guests",
            "entries must not be empty",
        ));
    }
    Ok(())
}

fn validate_approvals(config: &Config) -> ConfigResult<()> {
    if config.approvals.ttl_secs == 0 {
        return Err(ConfigError::invalid(
            "approvals.ttl_secs",
            "ttl_secs must be greater than zero",
        ));
    }
    if i64::try_from(config.approvals.ttl_secs).is_err() {
        return Err(ConfigError::invalid(
            "approvals.ttl_secs",
            "ttl_secs is too large",
        ));
    }
    if config.approvals.max_pending == 0 {
        return Err(ConfigError::invalid(
            "approvals.max_pending",
            "max_pending must be greater than zero",
        ));
    }
    Ok(())
}

fn validate_safety(config: &Config) -> ConfigResult<()> {
    for (i, pattern) in config.safety.blocked_commands.iter().enumerate() {
        if let Err(e) = regex::Regex::new(pattern) {
            return Err(ConfigError::invalid(
                &format!("safety.blocked_commands[{i}]"),
                format!("invalid regular expression: {e}"),
            ));
        }
    }
    Ok(())
}

fn validate_execution(config: &Config) -> ConfigResult<()> {
    let e = &config.execution;
    for (field, value) in [
        ("execution.verify_timeout_secs", e.verify_timeout_secs),
        ("execution.command_timeout_secs", e.command_timeout_secs),
    ] {
        if value == 0 {
            return Err(ConfigError::invalid(field, "timeout must be greater than zero"));
        }
    }
    if e.max_output_chars == 0 {
        return Err(ConfigError::invalid(
            "execution.max_output_chars",
            "max_output_chars must be greater than zero",
        ));
    }
    Ok(())
}

fn validate_http(config: &Config) -> ConfigResult<()> {
    if config.http.timeout_secs == 0 {
        return Err(ConfigError::invalid(
            "http.timeout_secs",
            "timeout must be greater than zero",
        ));
    }
    if config.http.max_body_bytes == 0 {
        return Err(ConfigError::invalid(
            "http.max_body_bytes",
            "max_body_bytes must be greater than zero",
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::invalid(
            "logging.level",
            format!("unknown log level '{}'", config.logging.level),
        ));
    }
    let format = config.logging.format.to_ascii_lowercase();
    if !LOG_FORMATS.contains(&format.as_str()) {
        return Err(ConfigError::invalid(
            "logging.format",
            format!(
                "unknown log format '{}'; expected one of: {}",
                config.logging.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }
    Ok(())
}

fn validate_org(config: &Config) -> ConfigResult<()> {
    if config.org.id.trim().is_empty() {
        return Err(ConfigError::invalid("org.id", "org id must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_control_level() {
        let mut config = Config::default();
        config.control.level = "Read-Only".to_owned();
        assert!(validate(&config).is_ok());

        config.control.level = "yolo".to_owned();
        assert_eq!(field_of(validate(&config)), "control.level");
    }

    #[test]
    fn test_zero_ttl_and_capacity() {
        let mut config = Config::default();
        config.approvals.ttl_secs = 0;
        assert_eq!(field_of(validate(&config)), "approvals.ttl_secs");

        let mut config = Config::default();
        config.approvals.max_pending = 0;
        assert_eq!(field_of(validate(&config)), "approvals.max_pending");
    }

    #[test]
    fn test_blocked_commands_must_compile() {
        let mut config = Config::default();
        config.safety.blocked_commands = vec![r"\bshutdown\b".to_owned(), "(".to_owned()];
        assert_eq!(field_of(validate(&config)), "safety.blocked_commands[1]");
    }

    #[test]
    fn test_zero_timeouts() {
        let mut config = Config::default();
        config.execution.verify_timeout_secs = 0;
        assert_eq!(field_of(validate(&config)), "execution.verify_timeout_secs");

        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert_eq!(field_of(validate(&config)), "http.timeout_secs");
    }

    #[test]
    fn test_logging() {
        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.format");

        let mut config = Config::default();
        config.logging.level = "loud".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.level");
    }

    #[test]
    fn test_empty_org() {
        let mut config = Config::default();
        config.org.id = " ".to_owned();
        assert_eq!(field_of(validate(&config)), "org.id");
    }
}
