//! Integration tests against a live Postgres instance. Gated behind
//! `#[ignore]` since this workspace never provisions a database for CI;
//! run manually with `TEST_DATABASE_URL` set and `--ignored`.

use chrono::Utc;
use serde_json::json;
use taskflow_shared::store::{PostgresTaskStore, TaskStore};
use taskflow_shared::{NewTask, Priority, TaskStatus};
use uuid::Uuid;

async fn connect() -> PostgresTaskStore {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let store = PostgresTaskStore::connect(&url)
        .await
        .expect("connect to test database");
    store.run_migrations().await.expect("run migrations");
    store
}

#[tokio::test]
#[ignore]
async fn create_then_get_round_trips() {
    let store = connect().await;
    let task = store
        .create(NewTask {
            user_id: Uuid::now_v7(),
            r#type: "echo".into(),
            title: "hello".into(),
            description: "world".into(),
            payload: json!({"message": "hi"}),
            priority: Priority::Medium,
            due_time: Utc::now(),
        })
        .await
        .expect("create task");

    let fetched = store.get(task.id).await.expect("fetch task");
    assert_eq!(fetched.id, task.id);
    assert_eq!(fetched.status, TaskStatus::Pending);
}

#[tokio::test]
#[ignore]
async fn illegal_transition_is_rejected() {
    let store = connect().await;
    let task = store
        .create(NewTask {
            user_id: Uuid::now_v7(),
            r#type: "echo".into(),
            title: "hello".into(),
            description: "world".into(),
            payload: json!({}),
            priority: Priority::Low,
            due_time: Utc::now(),
        })
        .await
        .expect("create task");

    let result = store
        .update_status(task.id, TaskStatus::Completed, Some("done".into()))
        .await;
    assert!(result.is_err());
}
