//! Wire envelope published to and consumed from the task queue.
//!
//! A richer, self-describing JSON struct rather than a bare payload string:
//! the producer (admission handler) and the worker loop decode the same
//! type, so a schema change is visible in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::Priority;

/// Message body published to the task queue, one per admitted task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequestMessage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub r#type: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub payload: serde_json::Value,
    pub due_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let msg = TaskRequestMessage {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            r#type: "echo".into(),
            title: "hi".into(),
            description: "desc".into(),
            priority: Priority::High,
            payload: serde_json::json!({"k": "v"}),
            due_time: Utc::now(),
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let back: TaskRequestMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.id, msg.id);
        assert_eq!(back.r#type, "echo");
    }
}
