use super::stream::{classify_relay_record, RelayRecord, StreamParser};
use crate::config::ClientConfig;
use crate::types::{DiscoveryResponse, ModelId, PromptBody};
use crate::util::{is_local_endpoint_url, join_url};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// How a single prompt's stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Sentinel seen or body exhausted. Carries the accumulated text.
    Completed(String),
    /// Carries the display message, always prefixed `Error:`.
    Errored(String),
    /// User stop or a timeout. No text.
    Cancelled,
}

impl StreamOutcome {
    pub fn into_text(self) -> Option<String> {
        match self {
            StreamOutcome::Completed(text) | StreamOutcome::Errored(text) => Some(text),
            StreamOutcome::Cancelled => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub prompt_text: String,
    pub model: ModelId,
    /// Provider-specific variant forwarded as `model` in the body.
    pub variant: Option<String>,
    pub file_reference: Option<String>,
}

impl PromptRequest {
    pub fn new(prompt_text: impl Into<String>, model: ModelId) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            model,
            variant: None,
            file_reference: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_file_reference(mut self, file_reference: impl Into<String>) -> Self {
        self.file_reference = Some(file_reference.into());
        self
    }

    /// Blank prompts are only sendable alongside a file reference.
    pub fn is_submittable(&self) -> bool {
        !self.prompt_text.trim().is_empty()
            || self
                .file_reference
                .as_deref()
                .is_some_and(|file| !file.trim().is_empty())
    }

    fn body(&self) -> PromptBody {
        PromptBody {
            prompt: Some(self.prompt_text.clone()),
            model: self.variant.clone(),
            file_url: self.file_reference.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamTimeouts {
    /// Longest gap between two `data:` records.
    pub idle: Option<Duration>,
    /// Cap on the whole body.
    pub total: Option<Duration>,
}

/// Talks to the relay's `/api/{model}` endpoints.
#[derive(Clone)]
pub struct TransportClient {
    http: reqwest::Client,
    relay_url: String,
    response_timeout: Option<Duration>,
    timeouts: StreamTimeouts,
}

impl TransportClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|error| anyhow!("failed to build HTTP client: {error}"))?;
        Ok(Self {
            http,
            relay_url: config.relay_url.trim().to_string(),
            response_timeout: config.response_timeout,
            timeouts: StreamTimeouts {
                idle: config.idle_timeout,
                total: config.total_timeout,
            },
        })
    }

    /// Models the relay reports as configured, in display order.
    pub async fn available_models(&self) -> Result<Vec<ModelId>> {
        let request_url = join_url(&self.relay_url, "/");
        let mut request = self.http.get(&request_url);
        if let Some(timeout) = self.response_timeout {
            request = request.timeout(timeout);
        }

        let discovery: DiscoveryResponse = request
            .send()
            .await
            .map_err(|error| map_relay_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_relay_request_error(error, &request_url))?
            .json()
            .await
            .map_err(|error| map_relay_request_error(error, &request_url))?;

        let mut models: Vec<ModelId> = discovery
            .available_models
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect();
        models.sort();
        models.dedup();
        Ok(models)
    }

    /// Streams one prompt, handing each content increment to `on_increment`
    /// in arrival order.
    ///
    /// Cancelling `token` at any point resolves to `Cancelled` and drops the
    /// response, which closes the connection. A timeout cancels `token` itself.
    pub async fn stream_prompt<F>(
        &self,
        request: &PromptRequest,
        token: &CancellationToken,
        on_increment: F,
    ) -> StreamOutcome
    where
        F: FnMut(&str),
    {
        let request_url = join_url(&self.relay_url, &request.model.endpoint());
        tracing::debug!(url = %request_url, model = %request.model, "sending prompt");

        let send = self.http.post(&request_url).json(&request.body()).send();
        let response_deadline = deadline(self.response_timeout);

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return StreamOutcome::Cancelled,
            _ = response_deadline => {
                tracing::warn!(url = %request_url, "no response from relay before timeout");
                token.cancel();
                return StreamOutcome::Cancelled;
            }
            result = send => result,
        };

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                return transport_failure(token, map_relay_request_error(error, &request_url))
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = token.cancelled() => return StreamOutcome::Cancelled,
                body = response.text() => body.unwrap_or_default(),
            };
            return StreamOutcome::Errored(backend_error_message(status, &body));
        }

        let stream: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(move |item| item.map_err(|error| anyhow!("stream interrupted: {error}"))),
        );
        read_relay_stream(stream, token, self.timeouts, on_increment).await
    }
}

/// Consumes a relay response body until it ends, errors, or is cancelled.
pub async fn read_relay_stream<F>(
    mut stream: ByteStream,
    token: &CancellationToken,
    timeouts: StreamTimeouts,
    mut on_increment: F,
) -> StreamOutcome
where
    F: FnMut(&str),
{
    let mut parser = StreamParser::new();
    let mut accumulated = String::new();
    let total_deadline = deadline(timeouts.total);
    tokio::pin!(total_deadline);
    // Only `data:` records count as activity. Keep-alive comments do not.
    let idle_deadline = tokio::time::sleep(timeouts.idle.unwrap_or_default());
    tokio::pin!(idle_deadline);

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return StreamOutcome::Cancelled,
            _ = &mut total_deadline => {
                tracing::warn!("stream exceeded total timeout");
                token.cancel();
                return StreamOutcome::Cancelled;
            }
            _ = &mut idle_deadline, if timeouts.idle.is_some() => {
                tracing::warn!("stream idle timeout");
                token.cancel();
                return StreamOutcome::Cancelled;
            }
            next = stream.next() => next,
        };

        let (records, exhausted) = match next {
            Some(Ok(chunk)) => (parser.process(&chunk), false),
            Some(Err(error)) => return transport_failure(token, error),
            None => (parser.flush(), true),
        };
        if let (Some(idle), false) = (timeouts.idle, records.is_empty()) {
            idle_deadline.as_mut().reset(Instant::now() + idle);
        }

        for data in records {
            if token.is_cancelled() {
                return StreamOutcome::Cancelled;
            }
            match classify_relay_record(&data) {
                RelayRecord::Content(text) => {
                    on_increment(&text);
                    accumulated.push_str(&text);
                }
                RelayRecord::Error(message) => {
                    return StreamOutcome::Errored(format!("Error: {message}"))
                }
                RelayRecord::Done => return StreamOutcome::Completed(accumulated),
                RelayRecord::Ignored | RelayRecord::Malformed => {}
            }
        }

        if exhausted {
            return StreamOutcome::Completed(accumulated);
        }
    }
}

fn deadline(limit: Option<Duration>) -> impl Future<Output = ()> {
    async move {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    }
}

fn transport_failure(token: &CancellationToken, error: anyhow::Error) -> StreamOutcome {
    if token.is_cancelled() {
        return StreamOutcome::Cancelled;
    }
    StreamOutcome::Errored(format!("Error: unable to get model response - {error}"))
}

fn backend_error_message(status: StatusCode, body: &str) -> String {
    let details = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            let pick = |key: &str| {
                value
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string)
            };
            pick("details").or_else(|| pick("error"))
        })
        .or_else(|| Some(body.trim().to_string()).filter(|text| !text.is_empty()))
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| "unknown error".to_string());
    format!("Error: backend error - {} - {details}", status.as_u16())
}

fn map_relay_request_error(error: reqwest::Error, request_url: &str) -> anyhow::Error {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return anyhow!(
            "cannot reach local relay '{}': {}. Start the relay or update CHAT_RELAY_URL.",
            request_url,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach relay '{}': {}", request_url, error);
    }
    if error.is_timeout() {
        return anyhow!("request to '{}' timed out: {}", request_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!("relay '{}' returned HTTP {}: {}", request_url, status, error);
    }
    anyhow!("request to '{}' failed: {}", request_url, error)
}
