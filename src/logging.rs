use crate::util::parse_bool_flag;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const DEBUG_PAYLOAD_ENV: &str = "CHAT_DEBUG_PAYLOAD";
const DEFAULT_FILTER: &str = "info";

/// Installs the fmt subscriber on stderr. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .and_then(parse_bool_flag)
        .unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    if !debug_payload_enabled() {
        return;
    }
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    tracing::debug!(url = request_url, payload = %formatted_payload, "upstream request payload");
}

pub fn emit_sse_parse_error(source: &str, data: &str, parse_error: &serde_json::Error) {
    tracing::warn!(source, error = %parse_error, data, "skipping malformed SSE record");
}
