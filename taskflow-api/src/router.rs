//! Route table for the `/api/v1` task surface.
//!
//! Grounded on the original platform's `internal/server/routes.go`
//! (route registration) and `middleware.go` (auth before rate limit before
//! handler), rebuilt as axum `Router`/`middleware::from_fn_with_state`
//! layers instead of gin middleware chains. Auth/session endpoints are
//! issued and verified elsewhere and are not routed here.

use std::sync::Arc;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::{admin_only_middleware, auth_middleware, AuthGate};
use crate::handlers::{admission, status};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::state::AppState;

/// Builds the full router: admin-only routes get an extra
/// [`admin_only_middleware`] layer; every task route is behind auth then
/// the per-principal rate limiter.
pub fn build_router(
    state: Arc<AppState>,
    auth_gate: Arc<dyn AuthGate>,
    rate_limiter: Arc<RateLimiter>,
) -> Router {
    let admin = Router::new()
        .route("/task", get(admission::list_tasks))
        .route("/task/{id}", patch(admission::update_task_status))
        .layer(from_fn(admin_only_middleware));

    let task_routes = Router::new()
        .route("/task", post(admission::create_task))
        .route("/task/{id}", get(admission::get_task))
        .route("/task/{id}/status", get(status::get_task_status))
        .merge(admin)
        .layer(from_fn_with_state(rate_limiter, rate_limit_middleware))
        .layer(from_fn_with_state(auth_gate, auth_middleware))
        .with_state(state);

    Router::new()
        .nest("/api/v1", task_routes)
        .layer(TraceLayer::new_for_http())
}
