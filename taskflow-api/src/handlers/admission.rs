//! Admission handler and the admin listing/get/update endpoints built on
//! the same task store.
//!
//! Grounded on the original platform's `internal/server/task.go`
//! (`CreateTask`/`GetTasks`/`GetTask`/`UpdateTaskStatus`), generalized to
//! the richer `TaskRequestMessage` envelope and the typed `TaskStatus`
//! transition the store layer already enforces.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use taskflow_shared::broker::TaskRequestMessage;
use taskflow_shared::task::{NewTask, Priority, Task, TaskStatus};
use taskflow_shared::TaskerError;

use crate::error::ApiError;
use crate::state::AppState;

/// Body for `POST /api/v1/task`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1))]
    pub title: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub task_type: String,
    pub description: String,
    pub user_id: Uuid,
    pub priority: String,
    pub payload: serde_json::Value,
    pub due_time: String,
}

/// `POST /api/v1/task`: validate, persist `PENDING`, publish, respond `201`.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    if body.validate().is_err() {
        return Err(ApiError(TaskerError::validation("title and type must not be empty")));
    }

    let due_time = DateTime::parse_from_rfc3339(&body.due_time)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ApiError(TaskerError::validation(format!("invalid due_time: {e}"))))?;

    let priority = Priority::from_str(&body.priority)
        .map_err(|e| ApiError(TaskerError::validation(format!("invalid priority: {e}"))))?;

    let task = state
        .store
        .create(NewTask {
            user_id: body.user_id,
            r#type: body.task_type.clone(),
            title: body.title.clone(),
            description: body.description.clone(),
            payload: body.payload.clone(),
            priority,
            due_time,
        })
        .await?;

    let envelope = TaskRequestMessage {
        id: task.id,
        user_id: task.user_id,
        r#type: task.r#type.clone(),
        title: task.title.clone(),
        description: task.description.clone(),
        priority: task.priority,
        payload: task.payload.clone(),
        due_time: task.due_time,
    };

    state
        .broker
        .publish(taskflow_shared::broker::TASK_QUEUE, &envelope)
        .await
        .map_err(|_| ApiError(TaskerError::Other("failed to publish task to broker".into())))?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// Query parameters for `GET /api/v1/task`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub user_id: Option<Uuid>,
}

fn default_limit() -> i64 {
    20
}

/// `GET /api/v1/task` (admin-only): paginated listing, optionally scoped to
/// a single `user_id`, ordered `created_at DESC`.
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    if query.limit <= 0 {
        return Err(ApiError(TaskerError::validation("limit must be positive")));
    }

    let tasks = match query.user_id {
        Some(user_id) => state.store.list_by_user(user_id, query.limit, query.offset).await?,
        None => state.store.list_all(query.limit, query.offset).await?,
    };

    Ok(Json(tasks))
}

/// `GET /api/v1/task/{id}`.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    let task = state.store.get(id).await?;
    Ok(Json(task))
}

/// Body for `PATCH /api/v1/task/{id}`: mapped directly to `update_status`.
#[derive(Debug, Deserialize)]
pub struct UpdateTaskStatusRequest {
    pub status: String,
    pub result: Option<String>,
}

/// `PATCH /api/v1/task/{id}` (admin-only).
pub async fn update_task_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTaskStatusRequest>,
) -> Result<Json<Task>, ApiError> {
    let status = TaskStatus::from_str(&body.status)
        .map_err(|e| ApiError(TaskerError::validation(format!("invalid status: {e}"))))?;

    let task = state.store.update_status(id, status, body.result).await?;
    Ok(Json(task))
}
