//! Maps the shared `TaskerError` taxonomy onto HTTP responses, the way the
//! store layer maps SQLSTATE onto a typed error: one place, one mapping,
//! reused by every handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use taskflow_shared::TaskerError;

/// Wraps a `TaskerError` so handlers can return it directly via `?`.
#[derive(Debug)]
pub struct ApiError(pub TaskerError);

impl From<TaskerError> for ApiError {
    fn from(err: TaskerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TaskerError::Validation(_) | TaskerError::Serde(_) => StatusCode::BAD_REQUEST,
            TaskerError::Auth(_) => StatusCode::UNAUTHORIZED,
            TaskerError::NotFound(_) => StatusCode::NOT_FOUND,
            TaskerError::UniqueViolation(_) | TaskerError::ForeignKeyViolation(_) => {
                StatusCode::FORBIDDEN
            }
            TaskerError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            TaskerError::TransientInfra(_)
            | TaskerError::PoisonMessage(_)
            | TaskerError::Timeout(_)
            | TaskerError::Interrupt
            | TaskerError::Broker(_)
            | TaskerError::Store(_)
            | TaskerError::Config(_)
            | TaskerError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}
