//! Small text helpers for configuration values and error messages

const HTTP_SCHEMES: [&str; 2] = ["http://", "https://"];
const MAX_ERROR_TEXT: usize = 180;

/// Trim user-supplied text, treating blank input the same as absent input
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Whether `value` names an HTTP(S) endpoint
pub fn is_http_url(value: &str) -> bool {
    HTTP_SCHEMES.iter().any(|scheme| value.starts_with(scheme))
}

/// Whether a database URL points at a hosted libsql server rather than a
/// local file
pub fn is_remote_database_url(value: &str) -> bool {
    value.starts_with("libsql://") || is_http_url(value)
}

/// Shorten a response body so it fits in an error message
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(MAX_ERROR_TEXT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_user_ids_count_as_missing() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(" \t ".to_string())), None);
        assert_eq!(
            normalize_text_option(Some("  investor-7 ".to_string())),
            Some("investor-7".to_string())
        );
    }

    #[test]
    fn endpoints_need_an_http_scheme() {
        assert!(is_http_url("http://127.0.0.1:8080/api/dividends"));
        assert!(is_http_url("https://dividends.example.com"));
        assert!(!is_http_url("libsql://dividends.example.io"));
        assert!(!is_http_url("127.0.0.1:8080"));
    }

    #[test]
    fn database_urls_are_remote_or_local() {
        assert!(is_remote_database_url("libsql://dividends.example.io"));
        assert!(is_remote_database_url("https://dividends.example.io"));
        assert!(!is_remote_database_url("data/dividends.db"));
        assert!(!is_remote_database_url(":memory:"));
    }

    #[test]
    fn long_error_bodies_are_cut() {
        let html = format!("<html>{}</html>", "x".repeat(500));
        assert_eq!(compact_text(&html).chars().count(), MAX_ERROR_TEXT);
        assert_eq!(compact_text("  Bad Gateway \n"), "Bad Gateway");
    }
}
