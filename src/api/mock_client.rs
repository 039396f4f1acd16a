use crate::api::client::ByteStream;
use anyhow::anyhow;
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
enum Tail {
    #[default]
    End,
    Stall,
    Fail(String),
}

/// Scripted relay response body for exercising the transport without a socket.
#[derive(Debug, Clone, Default)]
pub struct MockRelayStream {
    chunks: Vec<Bytes>,
    pace: Option<Duration>,
    tail: Tail,
}

impl MockRelayStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one framed `data:` record.
    pub fn record(mut self, data: &str) -> Self {
        self.chunks.push(Bytes::from(format!("data: {data}\n\n")));
        self
    }

    pub fn content(self, text: &str) -> Self {
        let payload = serde_json::json!({ "content": text }).to_string();
        self.record(&payload)
    }

    pub fn done(self) -> Self {
        self.record(crate::types::DONE_SENTINEL)
    }

    /// Appends bytes exactly as given, for split-frame cases.
    pub fn raw(mut self, bytes: impl Into<Bytes>) -> Self {
        self.chunks.push(bytes.into());
        self
    }

    /// Sleeps `delay` before each scripted chunk.
    pub fn paced(mut self, delay: Duration) -> Self {
        self.pace = Some(delay);
        self
    }

    /// Never ends after the scripted chunks.
    pub fn stall(mut self) -> Self {
        self.tail = Tail::Stall;
        self
    }

    /// Yields a transport error after the scripted chunks.
    pub fn fail(mut self, message: &str) -> Self {
        self.tail = Tail::Fail(message.to_string());
        self
    }

    pub fn into_stream(self) -> ByteStream {
        let tail: ByteStream = match self.tail {
            Tail::End => Box::pin(stream::empty()),
            Tail::Stall => Box::pin(stream::pending()),
            Tail::Fail(message) => Box::pin(stream::once(async move { Err(anyhow!(message)) })),
        };
        let pace = self.pace;
        let chunks = stream::iter(self.chunks).then(move |chunk| async move {
            if let Some(delay) = pace {
                tokio::time::sleep(delay).await;
            }
            Ok::<Bytes, anyhow::Error>(chunk)
        });
        Box::pin(chunks.chain(tail))
    }
}
