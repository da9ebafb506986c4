//! Worker execution loop: drains a broker delivery stream, drives the task
//! state machine, retries processor invocation with backoff, and acks or
//! nacks each delivery.
//!
//! Grounded on the original platform's `internal/worker/task_worker.go`
//! (`DoTask`: update to `IN_PROGRESS`, process, ack) and `internal/worker/
//! worker.go` (a fixed-size goroutine pool draining a work channel), with
//! the per-delivery steps generalized to the full state machine the
//! original only partially implemented (it never wrote `FAILED` or
//! retried).

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::message::Delivery;
use lapin::Consumer;
use tokio::sync::watch;
use tracing::{error, info, warn};

use taskflow_shared::broker::{ack, nack, TaskRequestMessage};
use taskflow_shared::store::TaskStore;
use taskflow_shared::task::TaskStatus;
use taskflow_shared::{TaskerError, TaskerResult};

use crate::processor::ProcessorRegistry;

/// Attempts before a processor invocation is abandoned.
pub const MAX_PROCESSOR_RETRIES: u32 = 3;

/// Worker loop's default overall run timer.
pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Backoff between processor retry attempts: `2 * 2^(i-1)` seconds for
/// attempt `i` (1-indexed): 2s, 4s, 8s.
fn processor_backoff(attempt: u32) -> Duration {
    Duration::from_secs(2 * 2u64.pow(attempt - 1))
}

/// Drives deliveries from a single consumer through the task state machine.
/// One `WorkerLoop` corresponds to one worker process with `prefetch=1`:
/// at most one delivery is in flight at a time.
pub struct WorkerLoop {
    store: Arc<dyn TaskStore>,
    registry: Arc<ProcessorRegistry>,
    max_retries: u32,
    overall_timeout: Duration,
}

/// Why [`WorkerLoop::run`] stopped consuming.
#[derive(Debug)]
pub enum LoopExit {
    /// The delivery stream ended (connection dropped); the caller should
    /// reconnect and resubscribe.
    StreamEnded,
}

impl WorkerLoop {
    #[must_use]
    pub fn new(store: Arc<dyn TaskStore>, registry: Arc<ProcessorRegistry>) -> Self {
        Self {
            store,
            registry,
            max_retries: MAX_PROCESSOR_RETRIES,
            overall_timeout: DEFAULT_OVERALL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Consumes `consumer` until the stream ends, `shutdown` signals true,
    /// or the overall timeout elapses. An interrupt or timeout is observed
    /// only at a delivery boundary: the current delivery always finishes
    /// processing first.
    pub async fn run(
        &self,
        mut consumer: Consumer,
        mut shutdown: watch::Receiver<bool>,
    ) -> TaskerResult<LoopExit> {
        let deadline = tokio::time::sleep(self.overall_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                _ = &mut deadline => {
                    warn!("worker loop overall timeout elapsed");
                    return Err(TaskerError::Timeout("worker overall timeout elapsed".into()));
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("worker loop observed interrupt at delivery boundary");
                        return Err(TaskerError::Interrupt);
                    }
                }
                delivery = consumer.next() => {
                    match delivery {
                        None => return Ok(LoopExit::StreamEnded),
                        Some(Err(err)) => return Err(err.into()),
                        Some(Ok(delivery)) => self.handle_delivery(delivery).await,
                    }
                }
            }
        }
    }

    /// Decodes, marks `IN_PROGRESS`, runs the processor with retry, and
    /// records the terminal outcome. Never propagates an error: every
    /// branch acks or nacks the delivery and logs, so one bad task never
    /// kills the loop.
    async fn handle_delivery(&self, delivery: Delivery) {
        let envelope: TaskRequestMessage = match serde_json::from_slice(&delivery.data) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "poison delivery: undecodable envelope");
                self.reject(&delivery, false).await;
                return;
            }
        };
        let task_id = envelope.id;

        let Some(processor) = self.registry.get(&envelope.r#type) else {
            warn!(%task_id, task_type = %envelope.r#type, "poison delivery: no processor registered for task type");
            self.reject(&delivery, false).await;
            return;
        };

        if let Err(err) = self
            .store
            .update_status(task_id, TaskStatus::InProgress, None)
            .await
        {
            warn!(%task_id, error = %err, "failed to mark task IN_PROGRESS");
            self.reject(&delivery, err.is_retryable()).await;
            return;
        }

        info!(%task_id, task_type = %envelope.r#type, "processing task");

        match self.invoke_with_retry(processor.as_ref(), &envelope).await {
            Ok(result) => {
                match self
                    .store
                    .update_status(task_id, TaskStatus::Completed, Some(result))
                    .await
                {
                    Ok(_) => {
                        if let Err(err) = ack(&delivery).await {
                            error!(%task_id, error = %err, "failed to ack completed delivery");
                        }
                    }
                    Err(err) => {
                        warn!(%task_id, error = %err, "failed to mark task COMPLETED");
                        self.reject(&delivery, err.is_retryable()).await;
                    }
                }
            }
            Err(final_error) => {
                warn!(%task_id, error = %final_error, "task processing failed permanently");
                if let Err(err) = self
                    .store
                    .update_status(task_id, TaskStatus::Failed, Some(final_error.0))
                    .await
                {
                    error!(%task_id, error = %err, "failed to mark task FAILED");
                }
                self.reject(&delivery, false).await;
            }
        }
    }

    /// Up to `max_retries` attempts, sleeping `2 * 2^(i-1)` seconds between
    /// attempts, stopping on first success.
    async fn invoke_with_retry(
        &self,
        processor: &dyn crate::processor::Processor,
        envelope: &TaskRequestMessage,
    ) -> Result<String, crate::processor::ProcessorError> {
        let body = serde_json::to_vec(&envelope.payload).unwrap_or_default();

        let mut last_error = None;
        for attempt in 1..=self.max_retries {
            match processor.process(&body).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    warn!(attempt, error = %err, "processor attempt failed");
                    last_error = Some(err);
                    if attempt < self.max_retries {
                        tokio::time::sleep(processor_backoff(attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| crate::processor::ProcessorError::new("processor failed with no recorded error")))
    }

    async fn reject(&self, delivery: &Delivery, requeue: bool) {
        if let Err(err) = nack(delivery, requeue).await {
            error!(error = %err, requeue, "failed to nack delivery");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{Processor, ProcessorError};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use taskflow_shared::task::Priority;
    use taskflow_shared::{NewTask, Task, TaskerResult};
    use uuid::Uuid;

    #[test]
    fn backoff_follows_2_4_8_seconds() {
        assert_eq!(processor_backoff(1), Duration::from_secs(2));
        assert_eq!(processor_backoff(2), Duration::from_secs(4));
        assert_eq!(processor_backoff(3), Duration::from_secs(8));
    }

    /// Fails its first `fail_count` invocations, then succeeds.
    struct FlakyProcessor {
        fail_count: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Processor for FlakyProcessor {
        async fn process(&self, _body: &[u8]) -> Result<String, ProcessorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_count {
                Err(ProcessorError::new("transient failure"))
            } else {
                Ok("ok".into())
            }
        }
    }

    /// Fails every invocation.
    #[derive(Default)]
    struct AlwaysFailsProcessor {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Processor for AlwaysFailsProcessor {
        async fn process(&self, _body: &[u8]) -> Result<String, ProcessorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProcessorError::new("permanent failure"))
        }
    }

    #[derive(Default)]
    struct NullStore;

    #[async_trait]
    impl TaskStore for NullStore {
        async fn create(&self, _task: NewTask) -> TaskerResult<Task> {
            unimplemented!("not exercised by these tests")
        }
        async fn get(&self, _id: Uuid) -> TaskerResult<Task> {
            unimplemented!("not exercised by these tests")
        }
        async fn list_by_user(&self, _user_id: Uuid, _limit: i64, _offset: i64) -> TaskerResult<Vec<Task>> {
            unimplemented!("not exercised by these tests")
        }
        async fn list_all(&self, _limit: i64, _offset: i64) -> TaskerResult<Vec<Task>> {
            unimplemented!("not exercised by these tests")
        }
        async fn update_status(
            &self,
            _id: Uuid,
            _status: TaskStatus,
            _result: Option<String>,
        ) -> TaskerResult<Task> {
            unimplemented!("not exercised by these tests")
        }
    }

    fn sample_envelope() -> TaskRequestMessage {
        TaskRequestMessage {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            r#type: "DATA_PROCESSING".into(),
            title: "t".into(),
            description: "d".into(),
            priority: Priority::Medium,
            payload: serde_json::json!({}),
            due_time: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_up_to_max_then_succeeds() {
        let worker = WorkerLoop::new(Arc::new(NullStore), Arc::new(ProcessorRegistry::new()))
            .with_max_retries(3);
        let processor = FlakyProcessor {
            fail_count: 2,
            calls: AtomicU32::new(0),
        };

        let result = worker.invoke_with_retry(&processor, &sample_envelope()).await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(processor.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let worker = WorkerLoop::new(Arc::new(NullStore), Arc::new(ProcessorRegistry::new()))
            .with_max_retries(3);
        let processor = AlwaysFailsProcessor::default();

        let result = worker.invoke_with_retry(&processor, &sample_envelope()).await;
        assert!(result.is_err());
        assert_eq!(processor.calls.load(Ordering::SeqCst), 3);
    }
}
