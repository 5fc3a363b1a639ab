//! # Authentication & Caller Identity
//!
//! Two separate concerns:
//!
//! - **Bearer token.** An optional static token guards every `/v1`
//!   route. It authenticates the presentation layer, not the end user.
//! - **Caller address.** The ledger authorizes by address. The
//!   presentation layer passes the end user's wallet address in the
//!   `X-Caller-Address` header; handlers receive it through the
//!   [`Caller`] extractor. Owner and bidder checks happen in the ledger.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, HeaderName, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dbb_core::Address;
use subtle::ConstantTimeEq;

use crate::error::{AppError, ErrorBody, ErrorDetail};

/// Header carrying the end user's address.
pub const CALLER_HEADER: HeaderName = HeaderName::from_static("x-caller-address");

// ── Caller ──────────────────────────────────────────────────────────────────

/// The address on whose behalf a request acts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub Address);

/// Reads [`CALLER_HEADER`]. Missing or malformed values are 400s.
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(&CALLER_HEADER)
            .ok_or_else(|| AppError::BadRequest("missing X-Caller-Address header".into()))?
            .to_str()
            .map_err(|_| AppError::BadRequest("X-Caller-Address is not valid ASCII".into()))?;
        Address::new(raw)
            .map(Caller)
            .map_err(|e| AppError::BadRequest(format!("invalid X-Caller-Address: {e}")))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer tokens.
///
/// When lengths differ, performs a dummy comparison so that the length
/// mismatch is not observable through timing.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the Bearer token from the Authorization header.
///
/// When `AuthConfig.token` is `None`, all requests pass.
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.token.clone());

    let Some(expected) = expected else {
        return next.run(request).await;
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let verdict = match auth_header.and_then(|v| v.strip_prefix("Bearer ")) {
        Some(provided) if constant_time_token_eq(provided, &expected) => Ok(()),
        Some(_) => Err("invalid bearer token"),
        None if auth_header.is_some() => Err("authorization header must use Bearer scheme"),
        None => Err("missing authorization header"),
    };

    match verdict {
        Ok(()) => next.run(request).await,
        Err(reason) => {
            tracing::warn!(reason, "authentication failed");
            unauthorized_response(reason)
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
