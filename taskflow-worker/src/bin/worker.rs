//! `taskflow-worker` binary: consumes admitted tasks from the broker and
//! executes them through the registered processors.
//!
//! Grounded on the original platform's `cmd/worker/main.go` (connect to the
//! queue, declare, consume, run the worker pool): a dropped channel is not
//! retried inside the loop itself, but the binary's outer loop re-dials.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use taskflow_shared::broker::{BrokerClient, TASK_QUEUE, WORKER_PREFETCH};
use taskflow_shared::store::{PostgresTaskStore, TaskStore};
use taskflow_shared::{Settings, TaskerError};
use taskflow_worker::{EchoProcessor, LoopExit, ProcessorRegistry, WorkerLoop};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    taskflow_shared::logging::init_tracing();

    let settings = Settings::load()?;
    info!(port = settings.port, "loaded worker configuration");

    let pg_store = PostgresTaskStore::connect(&settings.db_url).await?;
    pg_store.run_migrations().await?;
    let store: Arc<dyn TaskStore> = Arc::new(pg_store);

    // Stands in for the out-of-scope weather processor: the same
    // EchoProcessor handles every task type this demo registers, which is
    // enough to exercise the loop end to end.
    let mut registry = ProcessorRegistry::new();
    registry.register("DATA_PROCESSING", Arc::new(EchoProcessor));
    registry.register("REPORT_GENERATION", Arc::new(EchoProcessor));
    let registry = Arc::new(registry);

    let worker_id = std::env::var("WORKER_ID").unwrap_or_else(|_| "1".into());
    let consumer_tag = format!("worker-{worker_id}");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let worker_loop = WorkerLoop::new(Arc::clone(&store), Arc::clone(&registry));

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let broker = match BrokerClient::connect(&settings.rmq_address).await {
            Ok(broker) => broker,
            Err(err) => {
                error!(error = %err, "failed to connect to broker, exiting");
                return Err(err.into());
            }
        };
        broker.declare_queue(TASK_QUEUE).await?;
        broker.set_prefetch(WORKER_PREFETCH).await?;
        let consumer = broker.consume(TASK_QUEUE, &consumer_tag).await?;

        info!(consumer_tag, "worker consuming from task queue");

        match worker_loop.run(consumer, shutdown_rx.clone()).await {
            Ok(LoopExit::StreamEnded) => {
                warn!("broker stream ended, reconnecting");
                // Jittered so a fleet of workers that all lost the same
                // connection don't all re-dial RabbitMQ in lockstep.
                let jitter_ms = fastrand::u64(0..250);
                tokio::time::sleep(Duration::from_secs(1) + Duration::from_millis(jitter_ms)).await;
                continue;
            }
            Err(TaskerError::Interrupt) => {
                info!("worker loop exiting on interrupt");
                break;
            }
            Err(TaskerError::Timeout(msg)) => {
                error!(msg, "worker overall timeout reached, exiting");
                std::process::exit(1);
            }
            Err(err) => {
                error!(error = %err, "worker loop exited with error, exiting");
                std::process::exit(1);
            }
        }
    }

    info!("worker shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
