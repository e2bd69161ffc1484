//! UTF-8-safe truncation and redaction of text bound for the model.

use pulse_safety::{Redacted, redact};

/// Truncate a string at the nearest char boundary at or before `max_bytes`.
///
/// # Examples
///
/// ```
/// use pulse_tools::truncate_at_char_boundary;
///
/// assert_eq!(truncate_at_char_boundary("hello world", 5), "hello");
///
/// let s = format!("{}é", "x".repeat(199));
/// assert_eq!(truncate_at_char_boundary(&s, 200), "x".repeat(199));
/// ```
#[must_use]
pub fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    s[..end].to_string()
}

/// Keep at most `max_chars` characters, appending a notice when cut.
#[must_use]
pub fn truncate_output(output: String, max_chars: usize) -> String {
    match output.char_indices().nth(max_chars) {
        None => output,
        Some((end, _)) => {
            let mut truncated = output[..end].to_string();
            truncated.push_str(&format!(
                "\n\n... (output truncated: exceeded {max_chars} character limit)"
            ));
            truncated
        },
    }
}

/// Redact secrets, then truncate. The redaction trailer survives truncation.
#[must_use]
pub fn render_output(text: &str, max_chars: usize) -> String {
    let redacted = redact(text);
    Redacted {
        text: truncate_output(redacted.text, max_chars),
        count: redacted.count,
    }
    .with_notice()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Byte truncation ----

    #[test]
    fn short_string_returned_unchanged() {
        assert_eq!(truncate_at_char_boundary("hello", 200), "hello");
    }

    #[test]
    fn empty_string_returned_unchanged() {
        assert_eq!(truncate_at_char_boundary("", 100), "");
    }

    #[test]
    fn ascii_truncates_at_exact_boundary() {
        let s = "x".repeat(300);
        let result = truncate_at_char_boundary(&s, 200);
        assert_eq!(result, "x".repeat(200));
    }

    #[test]
    fn four_byte_emoji_at_boundary() {
        let mut s = "x".repeat(198);
        s.push('🦀');
        assert_eq!(s.len(), 202);
        assert_eq!(truncate_at_char_boundary(&s, 200), "x".repeat(198));
    }

    #[test]
    fn zero_max_bytes_returns_empty() {
        assert_eq!(truncate_at_char_boundary("hello", 0), "");
    }

    #[test]
    fn result_is_valid_utf8() {
        let s = "añ€🦀".repeat(100);
        for boundary in [1, 2, 3, 4, 5, 50, 100, 500, 999] {
            let result = truncate_at_char_boundary(&s, boundary);
            assert!(result.len() <= boundary);
        }
    }

    // ---- Character truncation ----

    #[test]
    fn output_within_limit_untouched() {
        assert_eq!(truncate_output("hello".to_string(), 5), "hello");
    }

    #[test]
    fn output_over_limit_counts_chars_not_bytes() {
        let s = "€".repeat(10);
        let result = truncate_output(s, 4);
        assert!(result.starts_with("€€€€\n"));
        assert!(result.contains("exceeded 4 character limit"));
    }

    // ---- Rendering ----

    #[test]
    fn render_redacts_and_reports_count() {
        let out = render_output("user=admin\npassword=hunter2hunter2\n", 1000);
        assert!(!out.contains("hunter2"));
        assert!(out.ends_with("[redacted 1 sensitive value(s)]"));
    }

    #[test]
    fn render_keeps_notice_after_truncation() {
        let text = format!("password=supersecretvalue\n{}", "x".repeat(5000));
        let out = render_output(&text, 100);
        assert!(out.contains("output truncated"));
        assert!(out.ends_with("[redacted 1 sensitive value(s)]"));
    }

    #[test]
    fn render_plain_output() {
        assert_eq!(render_output("up 3 days", 100), "up 3 days");
    }
}
