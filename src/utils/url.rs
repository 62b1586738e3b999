//! URL helpers shared by the backend adapters.

/// Strip trailing slashes so endpoint construction never doubles them.
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path with exactly one slash between.
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let base = normalize_base_url(base_url);
    format!("{}/{}", base, endpoint.trim_start_matches('/'))
}

/// Loose check used before handing an argument to the HTTP fetch handlers.
pub fn looks_like_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_trailing_slashes() {
        assert_eq!(
            normalize_base_url("http://localhost:11434/"),
            "http://localhost:11434"
        );
        assert_eq!(
            normalize_base_url("https://api.groq.com/openai/v1///"),
            "https://api.groq.com/openai/v1"
        );
        assert_eq!(normalize_base_url(""), "");
    }

    #[test]
    fn construct_joins_with_single_slash() {
        assert_eq!(
            construct_api_url("https://api.openai.com/v1/", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            construct_api_url("http://localhost:11434", "api/chat"),
            "http://localhost:11434/api/chat"
        );
    }

    #[test]
    fn url_detection_requires_scheme() {
        assert!(looks_like_url("https://example.com/"));
        assert!(!looks_like_url("example.com"));
        assert!(!looks_like_url("ftp://example.com"));
    }
}
