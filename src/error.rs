use crate::types::{ErrorBody, ModelId};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Failures the relay reports before a stream is opened.
///
/// Once SSE headers are out, the same conditions travel in-band as an error
/// record instead (see `StreamFrame::Error`).
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid request body")]
    InvalidBody(String),
    #[error("request body is missing 'prompt'")]
    MissingPrompt,
    #[error("unknown model '{0}'")]
    UnknownModel(String),
    #[error("{0} API is not configured, this feature is unavailable")]
    ProviderUnavailable(ModelId),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidBody(_) | RelayError::MissingPrompt => StatusCode::BAD_REQUEST,
            RelayError::UnknownModel(_) => StatusCode::NOT_FOUND,
            RelayError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn body(&self) -> ErrorBody {
        let details = match self {
            RelayError::InvalidBody(reason) => Some(reason.clone()),
            _ => None,
        };
        ErrorBody {
            error: self.to_string(),
            details,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        tracing::warn!(status = %self.status(), error = %self, "rejecting request before stream");
        (self.status(), Json(self.body())).into_response()
    }
}
