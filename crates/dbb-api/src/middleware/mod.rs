//! # Middleware
//!
//! Request counting by status and error code. Tracing is provided by `tower_http::trace::TraceLayer`
//! and authentication by [`crate::auth::auth_middleware`].

pub mod metrics;
