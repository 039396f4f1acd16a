use crate::providers::FrameStream;
use crate::types::{ModelId, StreamFrame, DONE_SENTINEL};
use axum::response::sse::Event;
use futures::{Stream, StreamExt};
use std::time::Instant;

/// Lifetime of one relayed stream. Dropped together with the response body,
/// so an unfinished session on drop means the client went away.
pub(crate) struct RelaySession {
    id: u64,
    model: ModelId,
    started: Instant,
    frames_sent: usize,
    finished: bool,
}

impl RelaySession {
    pub(crate) fn open(id: u64, model: ModelId) -> Self {
        tracing::info!(session = id, %model, "stream opened");
        Self {
            id,
            model,
            started: Instant::now(),
            frames_sent: 0,
            finished: false,
        }
    }

    fn finish(&mut self, outcome: &'static str) {
        self.finished = true;
        tracing::info!(
            session = self.id,
            model = %self.model,
            outcome,
            frames = self.frames_sent,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "stream closed"
        );
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!(
                session = self.id,
                model = %self.model,
                frames = self.frames_sent,
                "client disconnected, upstream stream dropped"
            );
        }
    }
}

/// Re-frames adapter output as SSE records.
///
/// Content becomes `{"content":..}`; an error becomes `{"error":..,"details":..}`
/// and ends the stream without the sentinel; a natural end writes `[DONE]`.
pub(crate) fn frame_events(
    mut frames: FrameStream,
    mut session: RelaySession,
) -> impl Stream<Item = Result<Event, axum::Error>> + Send {
    async_stream::stream! {
        while let Some(frame) = frames.next().await {
            let Some(payload) = frame.to_payload() else {
                break;
            };
            if let StreamFrame::Error { message, detail } = &frame {
                tracing::warn!(
                    session = session.id,
                    model = %session.model,
                    error = %message,
                    detail = detail.as_deref().unwrap_or_default(),
                    "upstream error relayed in-band"
                );
                yield Event::default().json_data(payload);
                session.finish("error");
                return;
            }
            session.frames_sent += 1;
            yield Event::default().json_data(payload);
        }
        yield Ok(Event::default().data(DONE_SENTINEL));
        session.finish("done");
    }
}
