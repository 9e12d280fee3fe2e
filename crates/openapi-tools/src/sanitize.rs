//! Tool identifier sanitization.

/// Map an arbitrary string (usually an `OpenAPI` path) to a tool-safe identifier.
///
/// Every character outside `[a-zA-Z0-9_-]` becomes `_`, one replacement per character. The
/// output length in chars equals the input length, and sanitizing twice is a no-op.
#[must_use]
pub fn sanitize_identifier(input: &str) -> String {
    input
        .chars()
        .map(|c| if is_identifier_char(c) { c } else { '_' })
        .collect()
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_identifier_examples() {
        assert_eq!(sanitize_identifier("/v1/ip-geo"), "_v1_ip-geo");
        assert_eq!(sanitize_identifier("/pet/{petId}"), "_pet__petId_");
        assert_eq!(sanitize_identifier("/a b.c"), "_a_b_c");
        assert_eq!(sanitize_identifier(""), "");
        assert_eq!(sanitize_identifier("already_ok-1"), "already_ok-1");
    }

    #[test]
    fn test_sanitize_identifier_replaces_non_ascii_per_char() {
        assert_eq!(sanitize_identifier("/café"), "_caf_");
        assert_eq!(sanitize_identifier("日本"), "__");
    }

    #[test]
    fn test_sanitize_identifier_output_charset_and_idempotence() {
        let inputs = [
            "/v1/ip-geo",
            "/users/{id}/repos?x=1",
            "  spaced  out ",
            "tabs\tand\nnewlines",
            "emoji 🚀 path",
            "%2F%7Bencoded%7D",
            "---___",
            "/",
        ];
        for input in inputs {
            let once = sanitize_identifier(input);
            assert!(
                once.chars().all(is_identifier_char),
                "unexpected char in {once:?}"
            );
            assert_eq!(sanitize_identifier(&once), once, "not idempotent for {input:?}");
        }
    }
}
