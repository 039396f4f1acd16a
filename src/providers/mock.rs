use super::{CompletionRequest, FrameStream, ProviderAdapter};
use crate::error::RelayError;
use crate::types::{ModelId, StreamFrame};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replays a fixed frame script. Used by tests and by the relay's
/// `--demo` mode when no vendor keys are at hand.
#[derive(Clone)]
pub struct ScriptedAdapter {
    model: ModelId,
    frames: Vec<StreamFrame>,
    frame_delay: Option<Duration>,
    hold_open: bool,
    released: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedAdapter {
    pub fn new(model: ModelId, frames: Vec<StreamFrame>) -> Self {
        Self {
            model,
            frames,
            frame_delay: None,
            hold_open: false,
            released: Arc::new(AtomicBool::new(false)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shorthand for a script of content frames followed by `Done`.
    pub fn replying(model: ModelId, fragments: &[&str]) -> Self {
        let frames = fragments
            .iter()
            .map(|fragment| StreamFrame::content(*fragment))
            .chain(std::iter::once(StreamFrame::Done))
            .collect();
        Self::new(model, frames)
    }

    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = Some(delay);
        self
    }

    /// Keeps the stream pending after the script instead of ending it.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Set once the most recent stream has been dropped.
    pub fn released(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl ProviderAdapter for ScriptedAdapter {
    fn model(&self) -> ModelId {
        self.model
    }

    fn stream_completion(&self, request: CompletionRequest) -> Result<FrameStream, RelayError> {
        request.ensure_prompt()?;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        self.released.store(false, Ordering::SeqCst);
        let guard = ReleaseGuard(Arc::clone(&self.released));
        let frames = self.frames.clone();
        let frame_delay = self.frame_delay;
        let hold_open = self.hold_open;

        Ok(Box::pin(async_stream::stream! {
            let _guard = guard;
            for frame in frames {
                if let Some(delay) = frame_delay {
                    tokio::time::sleep(delay).await;
                }
                yield frame;
            }
            if hold_open {
                std::future::pending::<()>().await;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_replays_script_and_records_request() {
        let adapter = ScriptedAdapter::replying(ModelId::Gpt, &["He", "llo"]);
        let frames: Vec<_> = adapter
            .stream_completion(CompletionRequest::new("greet"))
            .unwrap()
            .collect()
            .await;
        assert_eq!(
            frames,
            vec![
                StreamFrame::content("He"),
                StreamFrame::content("llo"),
                StreamFrame::Done
            ]
        );
        assert_eq!(adapter.requests()[0].prompt, "greet");
        assert!(adapter.released().load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dropping_held_stream_sets_release_flag() {
        let adapter =
            ScriptedAdapter::new(ModelId::Gpt, vec![StreamFrame::content("x")]).hold_open();
        let released = adapter.released();
        let mut stream = adapter
            .stream_completion(CompletionRequest::new("hi"))
            .unwrap();
        assert_eq!(stream.next().await, Some(StreamFrame::content("x")));
        assert!(!released.load(Ordering::SeqCst));
        drop(stream);
        assert!(released.load(Ordering::SeqCst));
    }
}
