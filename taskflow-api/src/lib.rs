//! HTTP surface: the admission handler, the long-poll status observer, the
//! rate limiter, and the auth gate.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod router;
pub mod state;

pub use auth::{AuthGate, JwtAuthGate, Principal, Role};
pub use rate_limit::RateLimiter;
pub use router::build_router;
pub use state::AppState;
