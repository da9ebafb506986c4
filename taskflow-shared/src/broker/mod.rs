//! Broker client: a thin, resilient wrapper around `lapin` for declaring
//! the priority task queue, publishing task requests, and consuming them
//! with manual acknowledgement.

pub mod client;
pub mod envelope;

pub use client::{ack, nack, BrokerClient, MAX_QUEUE_PRIORITY};
pub use envelope::TaskRequestMessage;

/// The single queue this core publishes to and consumes from.
pub const TASK_QUEUE: &str = "task_queue";

/// Per-consumer prefetch the worker loop requires to guarantee at most one
/// in-flight delivery per process.
pub const WORKER_PREFETCH: u16 = 1;
