use serde::{Deserialize, Serialize};

/// Terminal record written after the last content frame of a healthy stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Body of `POST /api/{model}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptBody {
    #[serde(default)]
    pub prompt: Option<String>,
    /// Provider-specific variant, e.g. `deepseek-reasoner`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, rename = "fileUrl", skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

impl PromptBody {
    pub fn prompt_text(&self) -> &str {
        self.prompt.as_deref().map(str::trim).unwrap_or_default()
    }

    pub fn file_reference(&self) -> Option<&str> {
        self.file_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// JSON payload carried by a `data:` record.
///
/// Exactly one of `content` or `error` is set on records the relay writes.
/// `event` is accepted for older relays that closed streams with
/// `{"event":"done"}` instead of the sentinel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SsePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl SsePayload {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            error: Some(message.into()),
            details,
            ..Self::default()
        }
    }

    pub fn is_done_event(&self) -> bool {
        self.event.as_deref() == Some("done")
    }
}

/// Pre-stream failure body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Body of `GET /`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResponse {
    #[serde(default)]
    pub message: String,
    pub available_models: Vec<String>,
    #[serde(default)]
    pub endpoints: Vec<String>,
}
