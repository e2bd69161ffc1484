//! Shell quoting for model-supplied strings.

/// Quote `s` as a single POSIX shell word.
///
/// Wraps in single quotes and replaces each embedded `'` with `'"'"'`.
///
/// ```
/// use pulse_core::shell_escape;
///
/// assert_eq!(shell_escape("/opt/app.yaml"), "'/opt/app.yaml'");
/// assert_eq!(shell_escape("it's"), r#"'it'"'"'s'"#);
/// ```
#[must_use]
pub fn shell_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len().saturating_add(2));
    out.push('\'');
    out.push_str(&s.replace('\'', "'\"'\"'"));
    out.push('\'');
    out
}

/// Run `inner` inside a Docker container via `sh -c`.
///
/// The whole inner pipeline is escaped as one argument so nested quotes in
/// `inner` never reach the outer shell.
#[must_use]
pub fn wrap_docker_exec(container: &str, inner: &str) -> String {
    format!(
        "docker exec {} sh -c {}",
        shell_escape(container),
        shell_escape(inner)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_plain() {
        assert_eq!(shell_escape("hello world"), "'hello world'");
        assert_eq!(shell_escape(""), "''");
    }

    #[test]
    fn test_escape_single_quote() {
        assert_eq!(shell_escape("a'b"), "'a'\"'\"'b'");
    }

    #[test]
    fn test_escape_neutralizes_metacharacters() {
        let escaped = shell_escape("$(rm -rf /); `id` | tee x");
        let inner = escaped
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .unwrap();
        assert!(!inner.contains('\''));
    }

    #[test]
    fn test_wrap_docker_exec_escapes_inner_as_one_word() {
        let wrapped = wrap_docker_exec("homepage", "echo 'aGk=' | base64 -d > '/x'");
        assert_eq!(
            wrapped,
            "docker exec 'homepage' sh -c 'echo '\"'\"'aGk='\"'\"' | base64 -d > '\"'\"'/x'\"'\"''"
        );
    }
}
