use super::{
    is_terminal, rejection_detail, response_bytes, sse_records, vendor_error_message,
    CompletionRequest, FrameStream, ProviderAdapter,
};
use crate::config::ProviderSettings;
use crate::error::RelayError;
use crate::logging::{emit_debug_payload, emit_sse_parse_error};
use crate::types::{ModelId, StreamFrame, DONE_SENTINEL};
use crate::util::join_url;
use futures::StreamExt;
use serde_json::{json, Value};

/// `POST {base}/chat/completions` with `stream: true`. Serves GPT and
/// DeepSeek, which speak the same protocol.
pub struct OpenAiCompatibleAdapter {
    http: reqwest::Client,
    model_id: ModelId,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
}

impl OpenAiCompatibleAdapter {
    pub fn new(http: reqwest::Client, model_id: ModelId, settings: &ProviderSettings) -> Self {
        Self {
            http,
            model_id,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            default_model: settings.model.clone(),
        }
    }

    fn request_payload(&self, request: &CompletionRequest) -> Value {
        let model = request
            .variant
            .as_deref()
            .unwrap_or(self.default_model.as_str());
        json!({
            "model": model,
            "stream": true,
            "messages": [
                { "role": "user", "content": request.user_message() }
            ],
        })
    }
}

impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn model(&self) -> ModelId {
        self.model_id
    }

    fn stream_completion(&self, request: CompletionRequest) -> Result<FrameStream, RelayError> {
        request.ensure_prompt()?;

        let http = self.http.clone();
        let provider = self.model_id;
        let request_url = join_url(&self.base_url, "chat/completions");
        let api_key = self.api_key.clone();
        let payload = self.request_payload(&request);

        Ok(Box::pin(async_stream::stream! {
            emit_debug_payload(&request_url, &payload);

            let mut builder = http.post(&request_url).json(&payload);
            if let Some(api_key) = &api_key {
                builder = builder.bearer_auth(api_key);
            }

            let response = match builder.send().await {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(%provider, url = %request_url, %error, "upstream request failed");
                    yield StreamFrame::error(
                        format!("{provider} request failed"),
                        Some(error.to_string()),
                    );
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let detail = rejection_detail(response).await;
                tracing::warn!(%provider, %status, "upstream rejected request");
                yield StreamFrame::error(
                    format!("{provider} API returned HTTP {}", status.as_u16()),
                    Some(detail),
                );
                return;
            }

            let mut records = Box::pin(sse_records(response_bytes(response)));
            while let Some(record) = records.next().await {
                let data = match record {
                    Ok(data) => data,
                    Err(error) => {
                        tracing::warn!(%provider, %error, "upstream stream interrupted");
                        yield StreamFrame::error(
                            format!("{provider} stream interrupted"),
                            Some(error.to_string()),
                        );
                        return;
                    }
                };
                for frame in parse_chat_chunk(&data) {
                    let terminal = is_terminal(&frame);
                    yield frame;
                    if terminal {
                        return;
                    }
                }
            }
        }))
    }
}

/// Frames carried by one `chat.completion.chunk` record.
pub(crate) fn parse_chat_chunk(data: &str) -> Vec<StreamFrame> {
    let data = data.trim();
    if data == DONE_SENTINEL {
        return vec![StreamFrame::Done];
    }
    if data.is_empty() {
        return Vec::new();
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(error) => {
            emit_sse_parse_error("chat/completions", data, &error);
            return Vec::new();
        }
    };

    if let Some(error) = value.get("error") {
        return vec![StreamFrame::error(
            "Upstream provider error",
            Some(vendor_error_message(error)),
        )];
    }

    let mut frames = Vec::new();
    let Some(choice) = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    else {
        return frames;
    };

    if let Some(content) = choice
        .get("delta")
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
    {
        frames.push(StreamFrame::content(content));
    }
    if choice
        .get("finish_reason")
        .is_some_and(|reason| !reason.is_null())
    {
        frames.push(StreamFrame::Done);
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(base_url: &str) -> OpenAiCompatibleAdapter {
        OpenAiCompatibleAdapter::new(
            reqwest::Client::new(),
            ModelId::DeepSeek,
            &ProviderSettings {
                api_key: Some("sk-test".to_string()),
                base_url: base_url.to_string(),
                model: "deepseek-chat".to_string(),
            },
        )
    }

    #[test]
    fn test_delta_content_becomes_content_frame() {
        let frames = parse_chat_chunk(
            r#"{"choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#,
        );
        assert_eq!(frames, vec![StreamFrame::content("Hel")]);
    }

    #[test]
    fn test_finish_reason_ends_stream_after_content() {
        let frames = parse_chat_chunk(
            r#"{"choices":[{"delta":{"content":"!"},"finish_reason":"stop"}]}"#,
        );
        assert_eq!(frames, vec![StreamFrame::content("!"), StreamFrame::Done]);
    }

    #[test]
    fn test_role_only_and_malformed_chunks_are_skipped() {
        assert!(parse_chat_chunk(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).is_empty());
        assert!(parse_chat_chunk("{oops").is_empty());
        assert_eq!(parse_chat_chunk("[DONE]"), vec![StreamFrame::Done]);
    }

    #[test]
    fn test_in_band_error_object() {
        let frames = parse_chat_chunk(r#"{"error":{"message":"context length exceeded"}}"#);
        assert_eq!(
            frames,
            vec![StreamFrame::error(
                "Upstream provider error",
                Some("context length exceeded".to_string())
            )]
        );
    }

    #[test]
    fn test_variant_overrides_default_model() {
        let adapter = adapter("https://api.deepseek.com/v1");
        let mut request = CompletionRequest::new("hi");
        assert_eq!(adapter.request_payload(&request)["model"], "deepseek-chat");
        request.variant = Some("deepseek-reasoner".to_string());
        let payload = adapter.request_payload(&request);
        assert_eq!(payload["model"], "deepseek-reasoner");
        assert_eq!(payload["stream"], true);
        assert_eq!(payload["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_empty_prompt_fails_before_any_request() {
        let adapter = adapter("http://127.0.0.1:9");
        assert!(matches!(
            adapter.stream_completion(CompletionRequest::new(" ")),
            Err(RelayError::MissingPrompt)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_vendor_yields_single_error_frame() {
        // Port 9 (discard) is closed on test hosts; connect fails fast.
        let adapter = adapter("http://127.0.0.1:9");
        let frames: Vec<_> = adapter
            .stream_completion(CompletionRequest::new("hi"))
            .unwrap()
            .collect()
            .await;
        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], StreamFrame::Error { message, detail: Some(_) }
            if message == "DeepSeek request failed"));
    }

    #[tokio::test]
    async fn test_unreadable_error_body_is_reported_as_such() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Promises 64 bytes of body, sends 7, then hangs up.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 64\r\n\r\npartial",
                )
                .await;
        });

        let adapter = adapter(&format!("http://{addr}"));
        let frames: Vec<_> = adapter
            .stream_completion(CompletionRequest::new("hi"))
            .unwrap()
            .collect()
            .await;
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            StreamFrame::Error { message, detail } => {
                assert_eq!(message, "DeepSeek API returned HTTP 500");
                let detail = detail.as_deref().unwrap_or_default();
                assert!(detail.starts_with("failed to read error body: "), "{detail}");
            }
            other => panic!("expected error frame, got {other:?}"),
        }
    }
}
