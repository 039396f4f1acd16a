use super::{
    is_terminal, rejection_detail, response_bytes, sse_records, vendor_error_message,
    CompletionRequest, FrameStream, ProviderAdapter,
};
use crate::config::ProviderSettings;
use crate::error::RelayError;
use crate::logging::{emit_debug_payload, emit_sse_parse_error};
use crate::types::{ModelId, StreamFrame};
use crate::util::join_url;
use futures::StreamExt;
use serde_json::{json, Value};

pub struct GeminiAdapter {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
}

impl GeminiAdapter {
    pub fn new(http: reqwest::Client, settings: &ProviderSettings) -> Self {
        Self {
            http,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            default_model: settings.model.clone(),
        }
    }

    fn request_url(&self, request: &CompletionRequest) -> String {
        let model = request
            .variant
            .as_deref()
            .unwrap_or(self.default_model.as_str());
        join_url(
            &self.base_url,
            &format!("models/{model}:streamGenerateContent?alt=sse"),
        )
    }

    fn request_payload(request: &CompletionRequest) -> Value {
        json!({
            "contents": [
                { "role": "user", "parts": [ { "text": request.user_message() } ] }
            ],
        })
    }
}

impl ProviderAdapter for GeminiAdapter {
    fn model(&self) -> ModelId {
        ModelId::Gemini
    }

    fn stream_completion(&self, request: CompletionRequest) -> Result<FrameStream, RelayError> {
        request.ensure_prompt()?;

        let http = self.http.clone();
        let request_url = self.request_url(&request);
        let api_key = self.api_key.clone();
        let payload = Self::request_payload(&request);

        Ok(Box::pin(async_stream::stream! {
            emit_debug_payload(&request_url, &payload);

            let mut builder = http.post(&request_url).json(&payload);
            if let Some(api_key) = &api_key {
                builder = builder.header("x-goog-api-key", api_key);
            }

            let response = match builder.send().await {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(url = %request_url, %error, "Gemini request failed");
                    yield StreamFrame::error("Gemini request failed", Some(error.to_string()));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let detail = rejection_detail(response).await;
                tracing::warn!(%status, "Gemini rejected request");
                yield StreamFrame::error(
                    format!("Gemini API returned HTTP {}", status.as_u16()),
                    Some(detail),
                );
                return;
            }

            let mut records = Box::pin(sse_records(response_bytes(response)));
            while let Some(record) = records.next().await {
                let data = match record {
                    Ok(data) => data,
                    Err(error) => {
                        tracing::warn!(%error, "Gemini stream interrupted");
                        yield StreamFrame::error("Gemini stream interrupted", Some(error.to_string()));
                        return;
                    }
                };
                for frame in parse_generate_chunk(&data) {
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

/// Frames carried by one `GenerateContentResponse` record.
pub(crate) fn parse_generate_chunk(data: &str) -> Vec<StreamFrame> {
    let data = data.trim();
    if data.is_empty() {
        return Vec::new();
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(error) => {
            emit_sse_parse_error("streamGenerateContent", data, &error);
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
    let Some(candidate) = value
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
    else {
        if let Some(reason) = value
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str)
        {
            frames.push(StreamFrame::error(
                "Gemini blocked the prompt",
                Some(format!("block reason: {reason}")),
            ));
        }
        return frames;
    };

    let text: String = candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    if !text.is_empty() {
        frames.push(StreamFrame::Content(text));
    }
    match candidate.get("finishReason").and_then(Value::as_str) {
        None | Some("") | Some("FINISH_REASON_UNSPECIFIED") => {}
        Some("STOP") | Some("MAX_TOKENS") => frames.push(StreamFrame::Done),
        // SAFETY, RECITATION, BLOCKLIST and friends: the reply was cut by policy.
        Some(reason) => frames.push(StreamFrame::error(
            "Gemini stopped the response",
            Some(format!("finish reason: {reason}")),
        )),
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_are_joined_into_one_content_frame() {
        let frames = parse_generate_chunk(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#,
        );
        assert_eq!(frames, vec![StreamFrame::content("Hello")]);
    }

    #[test]
    fn test_finish_reason_stop_ends_stream() {
        let frames = parse_generate_chunk(
            r#"{"candidates":[{"content":{"parts":[{"text":"."}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(frames, vec![StreamFrame::content("."), StreamFrame::Done]);
    }

    #[test]
    fn test_policy_finish_reason_is_an_error() {
        let frames = parse_generate_chunk(
            r#"{"candidates":[{"content":{"parts":[{"text":"Once"}]},"finishReason":"SAFETY"}]}"#,
        );
        assert_eq!(
            frames,
            vec![
                StreamFrame::content("Once"),
                StreamFrame::error(
                    "Gemini stopped the response",
                    Some("finish reason: SAFETY".to_string())
                ),
            ]
        );
        let frames = parse_generate_chunk(r#"{"candidates":[{"finishReason":"RECITATION"}]}"#);
        assert!(matches!(&frames[..], [StreamFrame::Error { detail: Some(detail), .. }]
            if detail == "finish reason: RECITATION"));
    }

    #[test]
    fn test_max_tokens_still_completes() {
        let frames = parse_generate_chunk(r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#);
        assert_eq!(frames, vec![StreamFrame::Done]);
    }

    #[test]
    fn test_blocked_prompt_without_candidates_is_an_error() {
        let frames = parse_generate_chunk(r#"{"promptFeedback":{"blockReason":"BLOCKLIST"}}"#);
        assert_eq!(
            frames,
            vec![StreamFrame::error(
                "Gemini blocked the prompt",
                Some("block reason: BLOCKLIST".to_string())
            )]
        );
    }

    #[test]
    fn test_error_object_becomes_error_frame() {
        let frames = parse_generate_chunk(
            r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert_eq!(
            frames,
            vec![StreamFrame::error(
                "Upstream provider error",
                Some("Resource has been exhausted".to_string())
            )]
        );
    }

    #[test]
    fn test_request_url_uses_variant_when_given() {
        let adapter = GeminiAdapter::new(
            reqwest::Client::new(),
            &ProviderSettings {
                api_key: Some("g-key".to_string()),
                base_url: "https://generativelanguage.googleapis.com/v1beta/".to_string(),
                model: "gemini-1.5-flash".to_string(),
            },
        );
        let mut request = CompletionRequest::new("hi");
        assert_eq!(
            adapter.request_url(&request),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:streamGenerateContent?alt=sse"
        );
        request.variant = Some("gemini-1.5-pro".to_string());
        assert!(adapter
            .request_url(&request)
            .ends_with("models/gemini-1.5-pro:streamGenerateContent?alt=sse"));
        assert_eq!(
            GeminiAdapter::request_payload(&request)["contents"][0]["parts"][0]["text"],
            "hi"
        );
    }
}
