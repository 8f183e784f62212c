use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use serde::Serialize;
use storage::StorageError;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed identifier or extension; the message names the bad value.
    BadRequest(String),
    /// Well-formed identifier with no stored data.
    NotFound(String),
    /// The `json` extension.
    NotImplemented,
    /// Path does not match any route.
    NoRoute,
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        error!(error = %err, "Storage query failed");
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            ApiError::NotFound(id) => (StatusCode::NOT_FOUND, format!("{id} not found")).into_response(),
            ApiError::NotImplemented => (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    error: "Not implemented.",
                }),
            )
                .into_response(),
            ApiError::NoRoute => (StatusCode::NOT_FOUND, Html("")).into_response(),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message).into_response(),
        }
    }
}
