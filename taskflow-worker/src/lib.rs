//! Worker fleet library: the processor interface and the execution loop
//! that drives deliveries through it, consumed by the `taskflow-worker`
//! binary.

pub mod processor;
pub mod worker_loop;

pub use processor::{EchoProcessor, Processor, ProcessorError, ProcessorRegistry};
pub use worker_loop::{LoopExit, WorkerLoop, DEFAULT_OVERALL_TIMEOUT, MAX_PROCESSOR_RETRIES};
