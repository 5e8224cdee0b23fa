use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Header carrying the trace id, propagated when the caller sends one.
pub const TRACE_ID_HEADER: &str = "x-trace-id";
/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request tracing identifiers, stored in request extensions.
#[derive(Debug, Clone)]
pub struct TracingState {
    pub trace_id: String,
    pub request_id: String,
    pub start_time: Instant,
}

impl TracingState {
    pub fn new() -> Self {
        Self::with_trace_id(Uuid::new_v4().to_string())
    }

    /// Continue a trace started upstream.
    pub fn with_trace_id(trace_id: String) -> Self {
        Self {
            trace_id,
            request_id: Uuid::new_v4().to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for TracingState {
    fn default() -> Self {
        Self::new()
    }
}

/// Attach trace and request ids to the request and echo them on the response.
pub async fn tracing_middleware(mut req: Request, next: Next) -> Response {
    let state = req
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| TracingState::with_trace_id(v.to_string()))
        .unwrap_or_default();

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(state.clone());

    let mut response = next.run(req).await;

    tracing::debug!(
        trace_id = %state.trace_id,
        request_id = %state.request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = state.elapsed().as_millis() as u64,
        "Request finished"
    );

    let headers = response.headers_mut();
    for (name, value) in [
        (TRACE_ID_HEADER, &state.trace_id),
        (REQUEST_ID_HEADER, &state.request_id),
    ] {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }

    response
}
