//! Environment variable overrides.
//!
//! Environment variables are the last layer: a set, non-blank variable
//! replaces whatever the files configured.

use std::collections::HashMap;

use tracing::debug;

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: FieldKind,
}

#[derive(Clone, Copy)]
enum FieldKind {
    Text,
    Flag,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "PULSE_AI_CONTROL_LEVEL",
        field_path: "control.level",
        kind: FieldKind::Text,
    },
    EnvMapping {
        var_name: "PULSE_STRICT_RESOLUTION",
        field_path: "control.strict_resolution",
        kind: FieldKind::Flag,
    },
    EnvMapping {
        var_name: "PULSE_AI_ALLOW_LOOPBACK",
        field_path: "safety.allow_loopback",
        kind: FieldKind::Flag,
    },
    EnvMapping {
        var_name: "PULSE_AI_LOG_LEVEL",
        field_path: "logging.level",
        kind: FieldKind::Text,
    },
    EnvMapping {
        var_name: "PULSE_AI_ORG_ID",
        field_path: "org.id",
        kind: FieldKind::Text,
    },
];

/// Apply environment overrides to the merged tree.
///
/// Returns the number of variables applied.
pub fn apply_env_overrides<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var override"
        );
        let value = match mapping.kind {
            FieldKind::Text => toml::Value::String(raw.to_owned()),
            FieldKind::Flag => toml::Value::Boolean(parse_flag(raw)),
        };
        set_field(merged, mapping.field_path, value);
        count = count.saturating_add(1);
    }

    count
}

/// `true`, `1`, `yes`, `on` (any case) are on; anything else is off.
fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Set a dotted field path, creating intermediate tables.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut current = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return;
        }
        current = table
            .entry(segment.to_owned())
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut merged: toml::Value =
            toml::from_str("[control]\nlevel = \"read_only\"").unwrap();
        let env = make_env(&[("PULSE_AI_CONTROL_LEVEL", "controlled")]);

        assert_eq!(apply_env_overrides(&mut merged, &env), 1);
        assert_eq!(merged["control"]["level"].as_str().unwrap(), "controlled");
    }

    #[test]
    fn test_flags_coerce_to_bool() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let env = make_env(&[
            ("PULSE_STRICT_RESOLUTION", "ON"),
            ("PULSE_AI_ALLOW_LOOPBACK", "nope"),
        ]);

        assert_eq!(apply_env_overrides(&mut merged, &env), 2);
        assert_eq!(merged["control"]["strict_resolution"].as_bool(), Some(true));
        assert_eq!(merged["safety"]["allow_loopback"].as_bool(), Some(false));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"warn\"").unwrap();
        let env = make_env(&[("PULSE_AI_LOG_LEVEL", "  ")]);

        assert_eq!(apply_env_overrides(&mut merged, &env), 0);
        assert_eq!(merged["logging"]["level"].as_str().unwrap(), "warn");
    }

    #[test]
    fn test_set_field_skips_non_table_parent() {
        let mut merged: toml::Value = toml::from_str("control = 3").unwrap();
        set_field(&mut merged, "control.level", toml::Value::String("x".to_owned()));
        assert_eq!(merged["control"].as_integer(), Some(3));
    }
}
