//! # Request Metrics
//!
//! In-process counters: total requests, error responses, and rejections
//! broken down by the machine-readable error code (`INVALID_STATE`,
//! `TRANSFER_FAILED`, ...). The breakdown is what an operator reads to
//! tell a dispute freeze apart from an underfunded escrow pool.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::Mutex;

use crate::error::ErrorCode;

/// Shared metrics state.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    request_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
    rejections: Arc<Mutex<BTreeMap<&'static str, u64>>>,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests seen so far.
    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Responses with a 4xx or 5xx status.
    pub fn errors(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Rejections carrying `code`.
    pub fn rejections(&self, code: &str) -> u64 {
        self.rejections.lock().get(code).copied().unwrap_or(0)
    }

    /// Snapshot of every non-zero rejection counter, keyed by error code.
    pub fn rejections_by_code(&self) -> BTreeMap<&'static str, u64> {
        self.rejections.lock().clone()
    }

    fn record(&self, response: &Response) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        let status = response.status();
        if !(status.is_client_error() || status.is_server_error()) {
            return;
        }
        self.error_count.fetch_add(1, Ordering::Relaxed);
        if let Some(ErrorCode(code)) = response.extensions().get::<ErrorCode>() {
            *self.rejections.lock().entry(code).or_insert(0) += 1;
        }
    }
}

/// Middleware that updates the counters once the response is known.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record(&response);
    }

    response
}
