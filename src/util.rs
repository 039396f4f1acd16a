use reqwest::Url;
use std::time::Duration;

/// Parse "true"/"false"/"1"/"0" from an owned String.
pub fn parse_bool_flag(s: String) -> Option<bool> {
    parse_bool_str(&s)
}

/// Parse "true"/"false"/"1"/"0" from a &str.
pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Returns true for localhost, loopback IPv4/IPv6, and 0.0.0.0 URLs.
pub fn is_local_endpoint_url(url: &str) -> bool {
    let parsed = match Url::parse(url.trim()) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    match parsed.host_str() {
        Some(host) => {
            let normalized = host
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_ascii_lowercase();
            normalized == "localhost"
                || normalized == "::1"
                || normalized == "0.0.0.0"
                || normalized.starts_with("127.")
        }
        None => false,
    }
}

pub fn is_http_url(url: &str) -> bool {
    let normalized = url.trim().to_ascii_lowercase();
    normalized.starts_with("http://") || normalized.starts_with("https://")
}

/// Reads an env var, treating unset and whitespace-only values the same.
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reads a whole-second duration; `0` disables the timeout.
pub fn env_secs(name: &str) -> Option<Option<Duration>> {
    let value = env_string(name)?;
    let secs = value.parse::<u64>().ok()?;
    Some((secs > 0).then(|| Duration::from_secs(secs)))
}

pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_helpers() {
        assert_eq!(parse_bool_str("true"), Some(true));
        assert_eq!(parse_bool_str("0"), Some(false));
        assert_eq!(parse_bool_flag("YES".to_string()), Some(true));
        assert_eq!(parse_bool_flag("off".to_string()), Some(false));
        assert_eq!(parse_bool_str("maybe"), None);
    }

    #[test]
    fn test_is_local_endpoint_url_normalizes_case_and_space() {
        assert!(is_local_endpoint_url(" HTTP://LOCALHOST:11434/v1 "));
        assert!(is_local_endpoint_url("https://127.0.0.1/v1"));
        assert!(is_local_endpoint_url("http://[::1]:8080/v1"));
        assert!(!is_local_endpoint_url("https://api.deepseek.com/v1"));
        assert!(!is_local_endpoint_url("not a url"));
    }

    #[test]
    fn test_join_url_collapses_slashes() {
        assert_eq!(
            join_url("https://api.openai.com/v1/", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(join_url("http://h:3000", "api/gpt"), "http://h:3000/api/gpt");
    }

    #[test]
    fn test_env_secs_zero_disables() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var("CHATRELAY_TEST_SECS", "0");
        assert_eq!(env_secs("CHATRELAY_TEST_SECS"), Some(None));
        std::env::set_var("CHATRELAY_TEST_SECS", "45");
        assert_eq!(
            env_secs("CHATRELAY_TEST_SECS"),
            Some(Some(Duration::from_secs(45)))
        );
        std::env::set_var("CHATRELAY_TEST_SECS", "soon");
        assert_eq!(env_secs("CHATRELAY_TEST_SECS"), None);
        std::env::remove_var("CHATRELAY_TEST_SECS");
    }
}
