//! Task store: the durable-write boundary every other component goes
//! through to read or mutate a task row.

pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::TaskerResult;
use crate::task::{NewTask, Task, TaskStatus};

pub use postgres::PostgresTaskStore;

/// Durable task persistence. A trait so the worker/API crates can be tested
/// against an in-memory fake without a live database.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: NewTask) -> TaskerResult<Task>;

    async fn get(&self, id: Uuid) -> TaskerResult<Task>;

    /// Pagination uses `(limit, offset)`, ordered by `created_at DESC`.
    async fn list_by_user(&self, user_id: Uuid, limit: i64, offset: i64) -> TaskerResult<Vec<Task>>;

    async fn list_all(&self, limit: i64, offset: i64) -> TaskerResult<Vec<Task>>;

    /// Moves `id` to `status`, attaching `result` for terminal states.
    /// Rejects the call if `status` is not a legal forward move from the
    /// task's current status.
    async fn update_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        result: Option<String>,
    ) -> TaskerResult<Task>;
}
