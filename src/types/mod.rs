mod api;
mod frame;
mod model;

pub use api::{DiscoveryResponse, ErrorBody, PromptBody, SsePayload, DONE_SENTINEL};
pub use frame::StreamFrame;
pub use model::ModelId;
