//! Identifier charset checks for names that end up inside shell commands.

use crate::error::{CoreError, CoreResult};

/// Longest DNS subdomain Kubernetes accepts for object names.
pub const MAX_DNS_NAME_LEN: usize = 253;

/// Whether `name` is a usable Docker container name or id.
#[must_use]
pub fn is_valid_container_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Validate a Docker container name or id (`[A-Za-z0-9_.-]+`).
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] naming `field` when the value
/// contains anything else.
pub fn validate_container_name(field: &str, name: &str) -> CoreResult<()> {
    if is_valid_container_name(name) {
        Ok(())
    } else {
        Err(CoreError::InvalidArgument {
            field: field.to_string(),
            message: "must contain only letters, digits, '_', '.', or '-'".to_string(),
        })
    }
}

/// Whether `name` is a lowercase DNS subdomain.
///
/// Labels are `[a-z0-9-]`, separated by dots, and must start and end with
/// an alphanumeric character.
#[must_use]
pub fn is_dns_subdomain(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_DNS_NAME_LEN {
        return false;
    }
    name.split('.').all(|label| {
        let bytes = label.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                first.is_ascii_alphanumeric()
                    && last.is_ascii_alphanumeric()
                    && bytes
                        .iter()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
            },
            _ => false,
        }
    })
}

/// Validate a Kubernetes object or namespace name.
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] naming `field` when the value is
/// not a lowercase DNS subdomain of at most 253 characters.
pub fn validate_dns_name(field: &str, name: &str) -> CoreResult<()> {
    if is_dns_subdomain(name) {
        Ok(())
    } else {
        Err(CoreError::InvalidArgument {
            field: field.to_string(),
            message: format!(
                "'{name}' is not a valid name (lowercase letters, digits, '-', '.'; \
                 at most {MAX_DNS_NAME_LEN} characters)"
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_names() {
        assert!(is_valid_container_name("homepage"));
        assert!(is_valid_container_name("my_app.v2-1"));
        assert!(is_valid_container_name("3f2a9c1b0d4e"));
        assert!(!is_valid_container_name(""));
        assert!(!is_valid_container_name("web; rm -rf /"));
        assert!(!is_valid_container_name("a b"));
        assert!(!is_valid_container_name("it's"));
    }

    #[test]
    fn test_validate_container_name_reports_field() {
        let err = validate_container_name("docker_container", "x$y").unwrap_err();
        assert!(err.to_string().contains("docker_container"));
    }

    #[test]
    fn test_dns_names() {
        assert!(is_dns_subdomain("nginx"));
        assert!(is_dns_subdomain("kube-system"));
        assert!(is_dns_subdomain("api.v1.example"));
        assert!(is_dns_subdomain("nginx-7d9c5b-abcde"));
        assert!(!is_dns_subdomain(""));
        assert!(!is_dns_subdomain("Nginx"));
        assert!(!is_dns_subdomain("-nginx"));
        assert!(!is_dns_subdomain("nginx-"));
        assert!(!is_dns_subdomain("a..b"));
        assert!(!is_dns_subdomain("ng inx"));
        assert!(!is_dns_subdomain("nginx;id"));
    }

    #[test]
    fn test_dns_name_length_limit() {
        let ok = "a".repeat(MAX_DNS_NAME_LEN);
        assert!(is_dns_subdomain(&ok));
        let long = "a".repeat(MAX_DNS_NAME_LEN.saturating_add(1));
        assert!(!is_dns_subdomain(&long));
    }

    #[test]
    fn test_validate_dns_name_message() {
        let err = validate_dns_name("namespace", "Default").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("namespace"));
        assert!(msg.contains("Default"));
    }
}
