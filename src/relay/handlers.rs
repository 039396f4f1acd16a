use super::sse::{frame_events, RelaySession};
use super::AppState;
use crate::error::RelayError;
use crate::providers::CompletionRequest;
use crate::types::{DiscoveryResponse, ModelId, PromptBody};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;

const DISCOVERY_MESSAGE: &str = "Chat relay is running";

pub(crate) async fn discovery(State(state): State<AppState>) -> Json<DiscoveryResponse> {
    let models = state.registry.available();
    Json(DiscoveryResponse {
        message: DISCOVERY_MESSAGE.to_string(),
        available_models: models
            .iter()
            .map(|model| model.display_name().to_string())
            .collect(),
        endpoints: models.iter().map(|model| model.endpoint()).collect(),
    })
}

/// `POST /api/{model}`. Every rejection happens here, before SSE headers.
pub(crate) async fn stream_prompt(
    State(state): State<AppState>,
    Path(model): Path<String>,
    body: Result<Json<PromptBody>, JsonRejection>,
) -> Result<Response, RelayError> {
    let Json(body) = body.map_err(|rejection| RelayError::InvalidBody(rejection.body_text()))?;
    let request = CompletionRequest::from_body(&body)?;
    let model: ModelId = model.parse()?;
    let adapter = state.registry.resolve(model)?;
    let frames = adapter.stream_completion(request)?;

    let session = RelaySession::open(state.next_session_id(), model);
    let sse = Sse::new(frame_events(frames, session))
        .keep_alive(KeepAlive::new().interval(state.keep_alive));
    Ok(([(header::CONNECTION, "keep-alive")], sse).into_response())
}
