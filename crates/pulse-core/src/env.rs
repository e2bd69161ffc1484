//! Environment flags that change safety behavior.

/// Enables hard failure for mutations on unresolved target names.
pub const STRICT_RESOLUTION_VAR: &str = "PULSE_STRICT_RESOLUTION";

/// Permits loopback and link-local fetches in the URL content tool.
pub const ALLOW_LOOPBACK_VAR: &str = "PULSE_AI_ALLOW_LOOPBACK";

/// Parse a boolean flag value.
///
/// Returns `None` for an unset or blank value, `Some(true)` for `true`,
/// `1`, `yes`, `on` (any case), and `Some(false)` otherwise.
#[must_use]
pub fn parse_flag(value: Option<&str>) -> Option<bool> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    Some(matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    ))
}

/// Read a boolean flag from the process environment.
#[must_use]
pub fn env_flag(name: &str) -> Option<bool> {
    parse_flag(std::env::var(name).ok().as_deref())
}

/// `PULSE_STRICT_RESOLUTION`, if set.
#[must_use]
pub fn strict_resolution() -> Option<bool> {
    env_flag(STRICT_RESOLUTION_VAR)
}

/// `PULSE_AI_ALLOW_LOOPBACK`, `false` when unset.
#[must_use]
pub fn allow_loopback() -> bool {
    env_flag(ALLOW_LOOPBACK_VAR).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(None), None);
        assert_eq!(parse_flag(Some("  ")), None);
        assert_eq!(parse_flag(Some("true")), Some(true));
        assert_eq!(parse_flag(Some("1")), Some(true));
        assert_eq!(parse_flag(Some("YES")), Some(true));
        assert_eq!(parse_flag(Some("on")), Some(true));
        assert_eq!(parse_flag(Some("false")), Some(false));
        assert_eq!(parse_flag(Some("0")), Some(false));
        assert_eq!(parse_flag(Some("maybe")), Some(false));
    }
}
