use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Body text for `/upload_frame` without a usable `frame` field.
pub const NO_FRAME_FOUND: &str = "No frame found";
/// Body text for `/upload_batch` without a `frames` array.
pub const INVALID_PAYLOAD: &str = "Invalid payload";

pub type Result<T, E = RelayError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Request is missing a required field. Carries the response body.
    #[error("{0}")]
    InvalidPayload(&'static str),

    /// One entry of a batch failed to decode. Never fatal to the batch.
    #[error("batch entry {index} is not valid base64: {source}")]
    Decode {
        index: usize,
        #[source]
        source: base64::DecodeError,
    },

    /// Viewer went away; ends that session only.
    #[error("viewer disconnected")]
    Disconnected,

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RelayError {
    pub(crate) fn invalid_config(msg: &str) -> Self {
        RelayError::Config(config::ConfigError::Message(msg.to_string()))
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::InvalidPayload(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            other => {
                tracing::error!("request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
            }
        }
    }
}
