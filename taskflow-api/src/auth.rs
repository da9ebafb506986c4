//! Auth gate — interface only: bearer-token issuance and verification live
//! outside this core. `JwtAuthGate` is the one concrete implementation
//! needed to exercise the admission, rate limit, and long-poll paths
//! without reimplementing registration/login (grounded on the original
//! platform's `internal/server/token.Maker` interface, narrowed to just
//! `verify`).

use axum::extract::{FromRequestParts, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Roles the core recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Standard,
}

/// The resolved caller of a request, injected into request extensions by
/// [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

/// Why [`AuthGate::verify`] rejected a bearer token.
#[derive(Debug)]
pub enum AuthError {
    Invalid,
    Expired,
}

/// Resolves a bearer token to a principal. A thin interface: the core
/// never mints tokens, it only verifies ones issued elsewhere.
pub trait AuthGate: Send + Sync {
    fn verify(&self, bearer: &str) -> Result<Principal, AuthError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    role: Role,
    exp: i64,
}

/// HS256 `jsonwebtoken`-backed auth gate, keyed off `TOKEN_SECRET`.
pub struct JwtAuthGate {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthGate {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::default(),
        }
    }
}

impl AuthGate for JwtAuthGate {
    fn verify(&self, bearer: &str) -> Result<Principal, AuthError> {
        let data = decode::<Claims>(bearer, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            }
        })?;

        let expires_at = DateTime::<Utc>::from_timestamp(data.claims.exp, 0)
            .ok_or(AuthError::Invalid)?;

        Ok(Principal {
            user_id: data.claims.sub,
            role: data.claims.role,
            expires_at,
        })
    }
}

/// Extracts `Authorization: Bearer <token>`, verifies it through the
/// injected [`AuthGate`], and inserts the resolved [`Principal`] into the
/// request's extensions for downstream handlers and the rate limiter.
pub async fn auth_middleware(
    State(gate): State<Arc<dyn AuthGate>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let (mut parts, body) = req.into_parts();
    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(&mut parts, &())
            .await
            .map_err(|_| unauthorized("missing or malformed Authorization header"))?;
    req = Request::from_parts(parts, body);

    let principal = gate.verify(bearer.token()).map_err(|err| match err {
        AuthError::Expired => unauthorized("token expired"),
        AuthError::Invalid => unauthorized("invalid token"),
    })?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Rejects non-admin principals with `403`. Layered onto the admin-only
/// routes (`GET /task`, `PATCH /task/{id}`).
pub async fn admin_only_middleware(req: Request, next: Next) -> Result<Response, Response> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or_else(|| unauthorized("missing principal"))?;

    if !principal.is_admin() {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "admin role required"})),
        )
            .into_response());
    }

    Ok(next.run(req).await)
}

fn unauthorized(msg: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": msg}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(role: Role, exp: i64) -> String {
        let claims = Claims {
            sub: Uuid::now_v7(),
            role,
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret")).unwrap()
    }

    #[test]
    fn verifies_a_well_formed_token() {
        let gate = JwtAuthGate::new(b"test-secret");
        let exp = (Utc::now() + chrono::Duration::hours(1)).timestamp();
        let token = token_for(Role::Standard, exp);

        let principal = gate.verify(&token).expect("token should verify");
        assert_eq!(principal.role, Role::Standard);
        assert!(!principal.is_admin());
    }

    #[test]
    fn rejects_expired_token() {
        let gate = JwtAuthGate::new(b"test-secret");
        let exp = (Utc::now() - chrono::Duration::hours(1)).timestamp();
        let token = token_for(Role::Standard, exp);

        assert!(matches!(gate.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn rejects_token_signed_with_wrong_secret() {
        let gate = JwtAuthGate::new(b"test-secret");
        let exp = (Utc::now() + chrono::Duration::hours(1)).timestamp();
        let claims = Claims {
            sub: Uuid::now_v7(),
            role: Role::Admin,
            exp,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"wrong-secret"),
        )
        .unwrap();

        assert!(matches!(gate.verify(&token), Err(AuthError::Invalid)));
    }

    #[test]
    fn admin_role_recognised() {
        let gate = JwtAuthGate::new(b"test-secret");
        let exp = (Utc::now() + chrono::Duration::hours(1)).timestamp();
        let token = token_for(Role::Admin, exp);

        let principal = gate.verify(&token).expect("token should verify");
        assert!(principal.is_admin());
    }
}
