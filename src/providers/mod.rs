pub mod gemini;
pub mod mock;
pub mod openai;

pub use gemini::GeminiAdapter;
pub use mock::ScriptedAdapter;
pub use openai::OpenAiCompatibleAdapter;

use crate::api::{ByteStream, StreamParser};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::types::{ModelId, PromptBody, StreamFrame};
use anyhow::{anyhow, Result};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

const UPSTREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const FILE_ONLY_PROMPT: &str = "Please analyze the attached file.";

pub type FrameStream = Pin<Box<dyn Stream<Item = StreamFrame> + Send>>;

/// One prompt as an adapter sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub variant: Option<String>,
    pub file_reference: Option<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn from_body(body: &PromptBody) -> Result<Self, RelayError> {
        let request = Self {
            prompt: body.prompt_text().to_string(),
            variant: body
                .model
                .as_deref()
                .map(str::trim)
                .filter(|variant| !variant.is_empty())
                .map(str::to_string),
            file_reference: body.file_reference().map(str::to_string),
        };
        request.ensure_prompt()?;
        Ok(request)
    }

    pub fn ensure_prompt(&self) -> Result<(), RelayError> {
        let has_file = self
            .file_reference
            .as_deref()
            .is_some_and(|file| !file.trim().is_empty());
        if self.prompt.trim().is_empty() && !has_file {
            return Err(RelayError::MissingPrompt);
        }
        Ok(())
    }

    /// Text sent as the single user message.
    pub fn user_message(&self) -> String {
        let prompt = self.prompt.trim();
        match self.file_reference.as_deref().map(str::trim) {
            Some(file) if !file.is_empty() => {
                let prompt = if prompt.is_empty() {
                    FILE_ONLY_PROMPT
                } else {
                    prompt
                };
                format!("{prompt}\n\nAttached file: {file}")
            }
            _ => prompt.to_string(),
        }
    }
}

/// A vendor streaming chat API behind one call.
///
/// `stream_completion` validates synchronously and returns a lazy stream: no
/// request leaves the process until the stream is first polled. A vendor
/// failure ends the stream with exactly one `StreamFrame::Error`.
pub trait ProviderAdapter: Send + Sync {
    fn model(&self) -> ModelId;
    fn stream_completion(&self, request: CompletionRequest) -> Result<FrameStream, RelayError>;
}

/// Configured adapters keyed by model. Immutable once the relay starts.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: BTreeMap<ModelId, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(UPSTREAM_CONNECT_TIMEOUT)
            .build()
            .map_err(|error| anyhow!("failed to build upstream HTTP client: {error}"))?;

        let enabled = config.enabled_models();
        let mut registry = Self::new();
        for model in ModelId::ALL {
            if !enabled.contains(&model) {
                tracing::warn!(%model, "no API key configured, provider disabled");
                continue;
            }
            let settings = config.provider(model);
            let adapter: Arc<dyn ProviderAdapter> = match model {
                ModelId::Gpt | ModelId::DeepSeek => Arc::new(OpenAiCompatibleAdapter::new(
                    http.clone(),
                    model,
                    settings,
                )),
                ModelId::Gemini => Arc::new(GeminiAdapter::new(http.clone(), settings)),
            };
            tracing::info!(%model, default_model = %settings.model, "provider enabled");
            registry = registry.with_adapter(adapter);
        }
        Ok(registry)
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.model(), adapter);
        self
    }

    pub fn resolve(&self, model: ModelId) -> Result<Arc<dyn ProviderAdapter>, RelayError> {
        self.adapters
            .get(&model)
            .cloned()
            .ok_or(RelayError::ProviderUnavailable(model))
    }

    pub fn available(&self) -> Vec<ModelId> {
        self.adapters.keys().copied().collect()
    }
}

/// Vendor response body as a stream of `data:` payloads.
pub(crate) fn sse_records(mut bytes: ByteStream) -> impl Stream<Item = Result<String>> + Send {
    async_stream::try_stream! {
        let mut parser = StreamParser::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            for data in parser.process(&chunk) {
                yield data;
            }
        }
        for data in parser.flush() {
            yield data;
        }
    }
}

pub(crate) fn response_bytes(response: reqwest::Response) -> ByteStream {
    Box::pin(
        response
            .bytes_stream()
            .map(|item| item.map_err(anyhow::Error::from)),
    )
}

pub(crate) fn is_terminal(frame: &StreamFrame) -> bool {
    !matches!(frame, StreamFrame::Content(_))
}

/// Best human-readable detail from a vendor error body.
pub(crate) fn vendor_error_detail(body: &str) -> String {
    let trimmed = body.trim();
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|value| value.get("error").map(vendor_error_message))
        .unwrap_or_else(|| {
            if trimmed.is_empty() {
                "empty response body".to_string()
            } else {
                trimmed.to_string()
            }
        })
}

/// Detail for a non-2xx vendor response. An unreadable body is reported as
/// such, not as an empty one.
pub(crate) async fn rejection_detail(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(body) => vendor_error_detail(&body),
        Err(error) => format!("failed to read error body: {error}"),
    }
}

/// `{"error": {"message": ...}}` and `{"error": "..."}` both occur in the wild.
pub(crate) fn vendor_error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}
