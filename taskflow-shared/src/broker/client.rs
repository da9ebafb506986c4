//! AMQP 0.9.1 broker client wrapping `lapin`, grounded on the original
//! platform's `internal/queue.QueueManager` (connect/declare/publish/consume)
//! and generalized with the resilience crate's circuit breaker so a
//! connection outage fails fast instead of piling up dial attempts.

use std::sync::Arc;
use std::time::Duration;

use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tracing::{info, warn};

use crate::error::{TaskerError, TaskerResult};
use crate::resilience::{CircuitBreaker, CircuitBreakerBehavior};

use super::envelope::TaskRequestMessage;

/// Maximum AMQP priority a declared queue accepts.
pub const MAX_QUEUE_PRIORITY: i64 = 10;

/// Connection attempts before `connect` gives up.
const CONNECT_ATTEMPTS: u32 = 5;

/// A connected broker handle: one `lapin::Connection` plus the channel used
/// for declares/publishes/consumes.
#[derive(Debug)]
pub struct BrokerClient {
    _connection: Connection,
    channel: Channel,
    breaker: Arc<CircuitBreaker>,
}

impl BrokerClient {
    /// Dials `addr` with exponential backoff (`2^(attempt-1)` seconds,
    /// `CONNECT_ATTEMPTS` tries), matching the reconnect behavior of the
    /// original queue manager's `connect` loop.
    pub async fn connect(addr: &str) -> TaskerResult<Self> {
        let breaker = Arc::new(CircuitBreaker::with_defaults("broker-connect"));
        let mut last_err = None;

        for attempt in 1..=CONNECT_ATTEMPTS {
            if !breaker.should_allow() {
                return Err(TaskerError::TransientInfra(
                    "broker circuit breaker is open".into(),
                ));
            }
            match Connection::connect(addr, ConnectionProperties::default()).await {
                Ok(connection) => {
                    breaker.record_success();
                    let channel = connection.create_channel().await?;
                    info!(attempt, "connected to broker");
                    return Ok(Self {
                        _connection: connection,
                        channel,
                        breaker,
                    });
                }
                Err(err) => {
                    breaker.record_failure();
                    warn!(attempt, error = %err, "broker connect attempt failed");
                    last_err = Some(err);
                    if attempt < CONNECT_ATTEMPTS {
                        tokio::time::sleep(Duration::from_secs(1 << (attempt - 1))).await;
                    }
                }
            }
        }

        Err(last_err
            .map(TaskerError::from)
            .unwrap_or_else(|| TaskerError::TransientInfra("broker unreachable".into())))
    }

    /// Declares a durable, priority-capable queue (`x-max-priority: 10`).
    pub async fn declare_queue(&self, name: &str) -> TaskerResult<()> {
        let mut args = FieldTable::default();
        args.insert("x-max-priority".into(), AMQPValue::LongInt(MAX_QUEUE_PRIORITY as i32));

        self.channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                args,
            )
            .await?;
        Ok(())
    }

    /// Sets the channel's prefetch count. The worker loop uses `1` so a
    /// single in-flight delivery is processed at a time per consumer.
    pub async fn set_prefetch(&self, count: u16) -> TaskerResult<()> {
        self.channel
            .basic_qos(count, BasicQosOptions::default())
            .await?;
        Ok(())
    }

    /// Publishes a task request with persistent delivery mode and the
    /// message's priority, content-type `application/json`.
    pub async fn publish(&self, queue: &str, message: &TaskRequestMessage) -> TaskerResult<()> {
        if !self.breaker.should_allow() {
            return Err(TaskerError::TransientInfra("broker circuit breaker is open".into()));
        }

        let body = serde_json::to_vec(message)?;
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2) // persistent
            .with_priority(message.priority.broker_priority())
            .with_timestamp(chrono::Utc::now().timestamp() as u64);

        match self
            .channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
        {
            Ok(confirm) => {
                confirm.await?;
                self.breaker.record_success();
                Ok(())
            }
            Err(err) => {
                self.breaker.record_failure();
                Err(err.into())
            }
        }
    }

    /// Starts consuming `queue` with manual ack (`auto_ack: false`).
    pub async fn consume(&self, queue: &str, consumer_tag: &str) -> TaskerResult<Consumer> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(consumer)
    }

    #[must_use]
    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        Arc::clone(&self.breaker)
    }
}

/// Acknowledges a delivery as successfully processed.
pub async fn ack(delivery: &lapin::message::Delivery) -> TaskerResult<()> {
    delivery.ack(BasicAckOptions::default()).await?;
    Ok(())
}

/// Rejects a delivery. `requeue = false` permanently drops a poison message;
/// `requeue = true` returns it to the front of the queue for a retry.
pub async fn nack(delivery: &lapin::message::Delivery, requeue: bool) -> TaskerResult<()> {
    delivery
        .nack(BasicNackOptions {
            multiple: false,
            requeue,
        })
        .await?;
    Ok(())
}
