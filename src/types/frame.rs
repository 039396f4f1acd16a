use super::api::SsePayload;

/// One increment produced by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Content(String),
    Error {
        message: String,
        detail: Option<String>,
    },
    /// Explicit end of a healthy stream. Exhaustion means the same thing.
    Done,
}

impl StreamFrame {
    pub fn content(text: impl Into<String>) -> Self {
        StreamFrame::Content(text.into())
    }

    pub fn error(message: impl Into<String>, detail: Option<String>) -> Self {
        StreamFrame::Error {
            message: message.into(),
            detail,
        }
    }

    /// Wire payload for this frame; `Done` is written as the bare sentinel instead.
    pub fn to_payload(&self) -> Option<SsePayload> {
        match self {
            StreamFrame::Content(text) => Some(SsePayload::content(text.clone())),
            StreamFrame::Error { message, detail } => {
                Some(SsePayload::error(message.clone(), detail.clone()))
            }
            StreamFrame::Done => None,
        }
    }
}
