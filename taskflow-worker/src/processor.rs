//! Processor interface: the single extension point through which the core
//! hands a task's opaque payload to caller-supplied work.
//!
//! Grounded on the original platform's `internal/weather` package, which the
//! worker invoked directly with no shared interface; here that becomes a
//! sum-type registry (`TaskType -> Processor`) built at start-up and
//! injected into the worker loop, instead of a global singleton.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Error returned by a processor. The core never inspects its contents; it
/// is recorded verbatim as the task's terminal `result` on permanent
/// failure and retried otherwise.
#[derive(Debug, Error, Clone)]
#[error("{0}")]
pub struct ProcessorError(pub String);

impl ProcessorError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A task-type-specific handler. Pure with respect to the core: the body
/// and result strings are opaque payloads the processor alone interprets.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, body: &[u8]) -> Result<String, ProcessorError>;
}

/// Maps a task's `type` tag to the processor that handles it. Built once at
/// start-up by the binary and passed by reference into the worker loop
/// constructor, rather than reached for as a module-level global.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("task_types", &self.processors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProcessorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task_type: impl Into<String>, processor: Arc<dyn Processor>) -> &mut Self {
        self.processors.insert(task_type.into(), processor);
        self
    }

    #[must_use]
    pub fn get(&self, task_type: &str) -> Option<Arc<dyn Processor>> {
        self.processors.get(task_type).cloned()
    }
}

/// Deterministic stand-in for the out-of-scope weather processor: echoes
/// the decoded payload back as the task result. Enough to exercise the
/// worker loop and its tests without a real external dependency.
#[derive(Debug, Default)]
pub struct EchoProcessor;

#[async_trait]
impl Processor for EchoProcessor {
    async fn process(&self, body: &[u8]) -> Result<String, ProcessorError> {
        std::str::from_utf8(body)
            .map(|s| format!("echo: {s}"))
            .map_err(|e| ProcessorError::new(format!("payload is not valid UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_processor_echoes_payload() {
        let result = EchoProcessor.process(b"hello").await.unwrap();
        assert_eq!(result, "echo: hello");
    }

    #[tokio::test]
    async fn registry_resolves_registered_type() {
        let mut registry = ProcessorRegistry::new();
        registry.register("DATA_PROCESSING", Arc::new(EchoProcessor));

        assert!(registry.get("DATA_PROCESSING").is_some());
        assert!(registry.get("REPORT_GENERATION").is_none());
    }
}
