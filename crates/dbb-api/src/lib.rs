//! # dbb-api: HTTP Surface for the Design-Bid-Build Ledger
//!
//! Exposes the ledger operations to a presentation layer (wallet UI,
//! indexer, test harness) over JSON. The caller of every mutating
//! operation is the address in the `X-Caller-Address` header; the
//! presentation layer is responsible for having authenticated it.
//!
//! ## API Surface
//!
//! | Prefix | Module | Operations |
//! |---|---|---|
//! | `/v1/projects/*` | [`routes::projects`] | post, bid, select, release, raise |
//! | `/v1/disputes/*` | [`routes::disputes`] | query, vote |
//! | `/v1/escrow/*`, `/v1/accounts/*` | [`routes::escrow`] | deposit, balances |
//! | `/v1/events` | [`routes::events`] | notification feed |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated from utoipa derive macros and served at `/openapi.json`.

pub mod auth;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the auth middleware
/// so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = state.metrics.clone();

    let api = Router::new()
        .merge(routes::projects::router())
        .merge(routes::disputes::router())
        .merge(routes::escrow::router())
        .merge(routes::events::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .layer(axum::Extension(metrics))
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe. Always 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. The ledger is in memory, so it is ready once constructed.
async fn readiness() -> &'static str {
    "ready"
}
