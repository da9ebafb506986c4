//! Rate limiter: a per-principal token bucket sitting on write/read task
//! endpoints, keyed by the verified principal from the auth gate.
//!
//! Grounded on the original platform's `internal/server/middleware.go`
//! (`getRateLimiter`/`RateLimitMiddleware`, `golang.org/x/time/rate`), with
//! the module-level `sync.Map` singleton replaced by a limiter service
//! owned by the HTTP layer and injected into the middleware. Unlike the
//! original, which runs before auth and falls back to a shared
//! `"unauthorized"` bucket for unauthenticated callers, this limiter runs
//! strictly after the auth gate and is keyed only by the verified
//! principal — a shared anonymous bucket would let one caller exhaust a
//! limit that every other anonymous caller then inherits.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use serde_json::json;
use uuid::Uuid;

use crate::auth::Principal;

/// Requests allowed per minute, and the burst capacity — both `10`.
pub const REQUESTS_PER_MINUTE: u32 = 10;
pub const BURST_CAPACITY: f64 = 10.0;

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new() -> Self {
        Self {
            tokens: BURST_CAPACITY,
            last_refill: Instant::now(),
        }
    }

    /// Refills at `REQUESTS_PER_MINUTE / 60` tokens per second, capped at
    /// burst capacity, then takes one token if available.
    fn try_take(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        let refill_rate = f64::from(REQUESTS_PER_MINUTE) / 60.0;
        self.tokens = (self.tokens + elapsed * refill_rate).min(BURST_CAPACITY);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Process-wide concurrent map of per-principal buckets. Entries are
/// created lazily on first request and retained for process lifetime;
/// eviction is out of scope at expected principal cardinality.
#[derive(Default)]
pub struct RateLimiter {
    buckets: DashMap<Uuid, TokenBucket>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allow(&self, key: Uuid) -> bool {
        self.buckets
            .entry(key)
            .or_insert_with(TokenBucket::new)
            .try_take()
    }
}

/// Axum middleware: denies with `429` once a principal's bucket is empty.
/// Must run after [`crate::auth::auth_middleware`] so `Principal` is
/// already present in request extensions.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let principal = req.extensions().get::<Principal>().cloned();

    let Some(principal) = principal else {
        return Ok(next.run(req).await);
    };

    if !limiter.allow(principal.user_id) {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "rate limit exceeded",
                "message": format!("limit: {REQUESTS_PER_MINUTE} requests per minute"),
            })),
        )
            .into_response());
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_burst_capacity_then_denies() {
        let limiter = RateLimiter::new();
        let user = Uuid::now_v7();

        for _ in 0..10 {
            assert!(limiter.allow(user));
        }
        assert!(!limiter.allow(user));
    }

    #[test]
    fn distinct_principals_have_independent_buckets() {
        let limiter = RateLimiter::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        for _ in 0..10 {
            assert!(limiter.allow(a));
        }
        assert!(!limiter.allow(a));
        assert!(limiter.allow(b));
    }
}
