use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::engine::EngineError;

/// Error returned by the HTTP handlers.
///
/// Client errors carry their kind so callers can tell a conflict from a bad
/// range; store faults are logged and surface as a bare 500.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match &self.0 {
            EngineError::Conflict(_) => "conflict",
            EngineError::InvalidRange { .. } => "invalid_range",
            EngineError::InvalidRoom { .. } => "invalid_room",
            EngineError::NotFound(_) => "not_found",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::CredentialsRejected(_) | EngineError::WalError(_) => "internal",
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self.0, "store failure");
            "internal error".to_string()
        } else {
            tracing::debug!(error = %self.0, "request rejected");
            self.0.to_string()
        };
        let body = ErrorBody {
            error: self.kind(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
