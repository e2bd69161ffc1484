//! Argument coercion for the dynamic tool boundary.
//!
//! Tool arguments arrive as an untyped JSON map. Each handler pulls the
//! fields it needs through these helpers. Unknown keys are ignored.

use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// A non-empty, trimmed string argument.
#[must_use]
pub fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A required string argument.
///
/// # Errors
///
/// Returns [`CoreError::MissingArgument`] if the key is absent, not a
/// string, or blank.
pub fn require_str<'a>(args: &'a Value, key: &str) -> CoreResult<&'a str> {
    opt_str(args, key).ok_or_else(|| CoreError::MissingArgument(key.to_string()))
}

/// A string argument kept verbatim (content payloads keep their whitespace).
#[must_use]
pub fn raw_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// An integer argument.
///
/// Accepts JSON integers, integral floats (`3.0`), and numeric strings.
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] if the value is present but not
/// an integer.
pub fn opt_int(args: &Value, key: &str) -> CoreResult<Option<i64>> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    let invalid = || CoreError::InvalidArgument {
        field: key.to_string(),
        message: format!("expected an integer, got {value}"),
    };
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(Some(i));
            }
            let f = n.as_f64().ok_or_else(invalid)?;
            if f.fract() == 0.0 && f.abs() < 9.0e15 {
                #[allow(clippy::cast_possible_truncation)]
                Ok(Some(f as i64))
            } else {
                Err(invalid())
            }
        },
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// A required integer argument.
///
/// # Errors
///
/// Returns [`CoreError::MissingArgument`] when absent, or
/// [`CoreError::InvalidArgument`] when not an integer.
pub fn require_int(args: &Value, key: &str) -> CoreResult<i64> {
    opt_int(args, key)?.ok_or_else(|| CoreError::MissingArgument(key.to_string()))
}

/// A boolean argument, `false` when absent.
///
/// Accepts JSON booleans and the strings `true`, `1`, `yes`.
#[must_use]
pub fn flag(args: &Value, key: &str) -> bool {
    match args.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        ),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// A case-insensitive enumeration argument, returned lowercased.
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] if the value is not one of
/// `allowed`.
pub fn opt_enum(args: &Value, key: &str, allowed: &[&str]) -> CoreResult<Option<String>> {
    let Some(raw) = opt_str(args, key) else {
        return Ok(None);
    };
    let lowered = raw.to_ascii_lowercase();
    if allowed.contains(&lowered.as_str()) {
        Ok(Some(lowered))
    } else {
        Err(CoreError::InvalidArgument {
            field: key.to_string(),
            message: format!("'{raw}' is not one of: {}", allowed.join(", ")),
        })
    }
}

/// A required case-insensitive enumeration argument.
///
/// # Errors
///
/// Returns [`CoreError::MissingArgument`] when absent, or
/// [`CoreError::InvalidArgument`] when not in `allowed`.
pub fn require_enum(args: &Value, key: &str, allowed: &[&str]) -> CoreResult<String> {
    opt_enum(args, key, allowed)?.ok_or_else(|| CoreError::MissingArgument(key.to_string()))
}

/// Clamp an optional count into `[min, max]`, using `default` when absent.
#[must_use]
pub fn clamp_count(value: Option<i64>, default: u32, min: u32, max: u32) -> u32 {
    match value {
        None => default,
        Some(v) => u32::try_from(v.clamp(i64::from(min), i64::from(max))).unwrap_or(default),
    }
}
