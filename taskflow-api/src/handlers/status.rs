//! Long-poll status observer: `GET /task/{id}/status` blocks until the task
//! leaves `PENDING` or a deadline elapses. Read-only, holds no lock;
//! cancellation of the request future (the client disconnecting) drops the
//! wait promptly since nothing here detaches from the request's async task.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use taskflow_shared::task::TaskStatus;
use taskflow_shared::TaskerError;

use crate::state::AppState;

/// Default long-poll deadline.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Interval between `get` polls while a task is still `PENDING`.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub result: Option<String>,
}

pub enum StatusOutcome {
    Ready(StatusResponse),
    NotFound,
    TimedOut,
    Internal(TaskerError),
}

impl IntoResponse for StatusOutcome {
    fn into_response(self) -> Response {
        match self {
            StatusOutcome::Ready(body) => (StatusCode::OK, Json(body)).into_response(),
            StatusOutcome::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({"error": "task not found"}))).into_response()
            }
            StatusOutcome::TimedOut => (
                StatusCode::REQUEST_TIMEOUT,
                Json(json!({"error": "long-poll deadline elapsed"})),
            )
                .into_response(),
            StatusOutcome::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": err.to_string()})),
            )
                .into_response(),
        }
    }
}

/// Once per second, `get(id)`: `404` if absent, `200` once non-`PENDING`,
/// `408` once `DEFAULT_POLL_TIMEOUT` elapses.
pub async fn get_task_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> StatusOutcome {
    let deadline = tokio::time::Instant::now() + DEFAULT_POLL_TIMEOUT;

    loop {
        match state.store.get(id).await {
            Ok(task) if task.status != TaskStatus::Pending => {
                return StatusOutcome::Ready(StatusResponse {
                    task_id: task.id,
                    status: task.status,
                    result: task.result,
                });
            }
            Ok(_) => {}
            Err(TaskerError::NotFound(_)) => return StatusOutcome::NotFound,
            Err(err) => return StatusOutcome::Internal(err),
        }

        if tokio::time::Instant::now() >= deadline {
            return StatusOutcome::TimedOut;
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
