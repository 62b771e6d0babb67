//! Error types for the snapshot store.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Store-level error, mapped onto the HTTP contract.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed request body or undecodable payload.
    #[error("{0}")]
    BadRequest(String),

    /// Encoded document body above the upload ceiling.
    #[error("payload exceeds the upload size ceiling")]
    PayloadTooLarge,

    /// No snapshot stored under the requested identifier.
    #[error("snapshot not found")]
    NotFound,

    /// The snapshot existed but its expiration timestamp has passed.
    #[error("snapshot has expired")]
    Gone,

    /// Anything unexpected.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Gone => StatusCode::GONE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body: `{ "error": "<message>" }`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
