//! `taskflow-api` binary: the client-facing HTTP service. Accepts typed
//! work requests, persists and publishes them, and serves the long-poll
//! status endpoint.
//!
//! Grounded on the original platform's `cmd/api/main.go` (load config,
//! connect db + broker, build server, listen) and `internal/server/
//! server.go`.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use taskflow_api::{build_router, AppState, JwtAuthGate, RateLimiter};
use taskflow_shared::broker::{BrokerClient, TASK_QUEUE};
use taskflow_shared::store::{PostgresTaskStore, TaskStore};
use taskflow_shared::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    taskflow_shared::logging::init_tracing();

    let settings = Settings::load()?;

    let pg_store = PostgresTaskStore::connect(&settings.db_url).await?;
    pg_store.run_migrations().await?;
    let store: Arc<dyn TaskStore> = Arc::new(pg_store);

    let broker = Arc::new(BrokerClient::connect(&settings.rmq_address).await?);
    broker.declare_queue(TASK_QUEUE).await?;

    let state = Arc::new(AppState {
        store,
        broker: Arc::clone(&broker),
    });

    let auth_gate: Arc<dyn taskflow_api::AuthGate> =
        Arc::new(JwtAuthGate::new(settings.token_secret.as_bytes()));
    let rate_limiter = Arc::new(RateLimiter::new());

    let app = build_router(state, auth_gate, rate_limiter);

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "taskflow-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await?;

    info!("taskflow-api shutdown complete");
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
