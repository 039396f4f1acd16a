use tokio_util::sync::CancellationToken;

pub type SessionId = u64;

/// One in-flight request: the id tags its updates, the token stops it.
#[derive(Debug, Clone)]
pub struct StreamSession {
    pub id: SessionId,
    pub token: CancellationToken,
}

/// Tracks the single active stream of a view.
///
/// Idle until `begin`, back to Idle on `stop` or `finish`. A token is never
/// reused: every `begin` hands out a fresh one and cancels the previous.
#[derive(Debug, Default)]
pub struct CancellationController {
    last_id: SessionId,
    active: Option<StreamSession>,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> StreamSession {
        if let Some(previous) = self.active.take() {
            tracing::debug!(session = previous.id, "superseded by new submission");
            previous.token.cancel();
        }
        self.last_id += 1;
        let session = StreamSession {
            id: self.last_id,
            token: CancellationToken::new(),
        };
        self.active = Some(session.clone());
        session
    }

    /// Cancels the active stream. Returns the stopped id, or `None` when idle.
    pub fn stop(&mut self) -> Option<SessionId> {
        let session = self.active.take()?;
        session.token.cancel();
        Some(session.id)
    }

    /// Marks `id` as ended on its own. Ignored unless `id` is current.
    pub fn finish(&mut self, id: SessionId) -> bool {
        if self.is_current(id) {
            self.active = None;
            return true;
        }
        false
    }

    pub fn is_current(&self, id: SessionId) -> bool {
        self.active.as_ref().is_some_and(|session| session.id == id)
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }
}
