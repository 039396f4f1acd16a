use crate::api::StreamOutcome;
use crate::state::SessionId;

/// Sent from a streaming task back to the dispatcher. The session id lets
/// the dispatcher drop updates from streams it has already moved past.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiUpdate {
    Delta { session: SessionId, text: String },
    Finished { session: SessionId, outcome: StreamOutcome },
}

impl UiUpdate {
    pub fn session(&self) -> SessionId {
        match self {
            UiUpdate::Delta { session, .. } | UiUpdate::Finished { session, .. } => *session,
        }
    }
}
