//! Exchange tracing middleware.
//!
//! Mounted with `axum::middleware::from_fn_with_state`, holding the shared
//! [`TraceFilter`].

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::exchange::{RequestHead, SharedResponseHead, TraceFilter};
use crate::http::body::{ContentMode, TracedBody};
use crate::trace::Direction;

/// Trace one exchange: request head and body on the way in, response head
/// and body on the way out.
///
/// The trace is finalized when the response body ends. If no trace file can
/// be created the exchange is served untraced.
pub async fn trace_exchange(State(filter): State<Arc<TraceFilter>>, request: Request<Body>, next: Next) -> Response {
    let record = match filter.begin() {
        Ok(record) => record,
        Err(e) => {
            tracing::error!(error = %e, uri = %request.uri(), "Serving exchange untraced");
            return next.run(request).await;
        }
    };

    let (parts, body) = request.into_parts();
    record.log_request_headers(&RequestHead::from_parts(&parts));
    let mode = ContentMode::for_headers(&parts.headers);
    let body = TracedBody::new(body, Arc::clone(&record), Direction::Request, mode);
    let response = next.run(Request::from_parts(parts, Body::new(body))).await;

    let (mut parts, body) = response.into_parts();
    if let Some(name) = filter.trace_id_header() {
        match HeaderValue::from_str(&record.file_name()) {
            Ok(value) => {
                parts.headers.insert(name.clone(), value);
            }
            Err(e) => tracing::warn!(parent: record.span(), error = %e, "Trace id is not a valid header value"),
        }
    }
    let head = SharedResponseHead::default();
    head.capture(parts.status, &parts.headers);
    record.set_response(Arc::new(head));

    let mode = ContentMode::for_headers(&parts.headers);
    let body = TracedBody::new(body, record, Direction::Response, mode);
    Response::from_parts(parts, Body::new(body))
}
