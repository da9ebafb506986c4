//! Postgres-backed [`super::TaskStore`], grounded on the original
//! platform's `sqlc`-generated queries (`CreateTask`, `GetTask`,
//! `ListTasksByUser`, `UpdateTaskStatus`, `CreateTaskLog`).
//!
//! Queries are built with `sqlx::query`/`query_as` at runtime rather than
//! the `query!` macro family, so the crate compiles without a live database
//! connection available at build time.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::error::{TaskerError, TaskerResult};
use crate::task::{NewTask, Priority, Task, TaskStatus};

use super::TaskStore;

#[derive(Debug)]
pub struct PostgresTaskStore {
    pool: PgPool,
}

impl PostgresTaskStore {
    pub async fn connect(db_url: &str) -> TaskerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(db_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> TaskerResult<()> {
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| TaskerError::config(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Appends a row to the supplemental `task_log` audit table. Failure
    /// here never fails the caller's status update: the log is a
    /// best-effort record, not part of the task's durability contract.
    async fn log_transition(&self, task_id: Uuid, status: TaskStatus, result: Option<&str>) {
        let outcome = sqlx::query(
            "INSERT INTO task_log (task_id, status, result, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(task_id)
        .bind(status.to_string())
        .bind(result)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        if let Err(err) = outcome {
            warn!(%task_id, error = %err, "failed to append task_log entry");
        }
    }
}

fn row_to_task(row: &sqlx::postgres::PgRow) -> TaskerResult<Task> {
    let priority_raw: String = row.try_get("priority")?;
    let status_raw: String = row.try_get("status")?;

    Ok(Task {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        r#type: row.try_get("type")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        payload: row.try_get("payload")?,
        priority: Priority::from_str(&priority_raw)
            .map_err(|e| TaskerError::Other(format!("corrupt priority column: {e}")))?,
        status: TaskStatus::from_str(&status_raw)
            .map_err(|e| TaskerError::Other(format!("corrupt status column: {e}")))?,
        result: row.try_get("result")?,
        due_time: row.try_get("due_time")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_sqlx_err(err: sqlx::Error) -> TaskerError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.code().as_deref() {
            Some("23505") => return TaskerError::UniqueViolation(db_err.message().to_string()),
            Some("23503") => {
                return TaskerError::ForeignKeyViolation(db_err.message().to_string())
            }
            _ => {}
        }
    }
    if matches!(err, sqlx::Error::RowNotFound) {
        return TaskerError::NotFound("task not found".into());
    }
    TaskerError::Store(err)
}

#[async_trait]
impl TaskStore for PostgresTaskStore {
    async fn create(&self, task: NewTask) -> TaskerResult<Task> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        let row = sqlx::query(
            "INSERT INTO task (id, user_id, type, title, description, payload, priority, status, result, due_time, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING', NULL, $8, $9, $9)
             RETURNING *",
        )
        .bind(id)
        .bind(task.user_id)
        .bind(&task.r#type)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.payload)
        .bind(task.priority.to_string())
        .bind(task.due_time)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        row_to_task(&row)
    }

    async fn get(&self, id: Uuid) -> TaskerResult<Task> {
        let row = sqlx::query("SELECT * FROM task WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or_else(|| TaskerError::not_found(format!("task {id}")))?;
        row_to_task(&row)
    }

    async fn list_by_user(&self, user_id: Uuid, limit: i64, offset: i64) -> TaskerResult<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT * FROM task WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        rows.iter().map(row_to_task).collect()
    }

    async fn list_all(&self, limit: i64, offset: i64) -> TaskerResult<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM task ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        rows.iter().map(row_to_task).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        result: Option<String>,
    ) -> TaskerResult<Task> {
        let current = self.get(id).await?;

        if !current.status.can_transition_to(status) {
            return Err(TaskerError::validation(format!(
                "illegal transition {} -> {} for task {id}",
                current.status, status
            )));
        }

        let row = sqlx::query(
            "UPDATE task SET status = $1, result = COALESCE($2, result), updated_at = $3
             WHERE id = $4 AND status = $5
             RETURNING *",
        )
        .bind(status.to_string())
        .bind(&result)
        .bind(Utc::now())
        .bind(id)
        .bind(current.status.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or_else(|| {
            TaskerError::validation(format!(
                "task {id} status changed concurrently, expected {}",
                current.status
            ))
        })?;

        self.log_transition(id, status, result.as_deref()).await;

        row_to_task(&row)
    }
}
