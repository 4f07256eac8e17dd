//! Demonstration handlers served by the binary.

use axum::{
    body::Bytes,
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::http::body::ContentMode;

/// `/hello`, `/echo` and `/binary`.
pub fn demo_routes() -> Router {
    Router::new()
        .route("/hello", get(hello))
        .route("/echo", axum::routing::put(echo).post(echo))
        .route("/binary", get(binary))
}

async fn hello() -> &'static str {
    "Hello World\n"
}

/// Consume the request body and report how much arrived.
async fn echo(headers: HeaderMap, body: Bytes) -> String {
    match ContentMode::for_headers(&headers) {
        ContentMode::Chars => format!("Read {} characters\n", String::from_utf8_lossy(&body).chars().count()),
        ContentMode::Bytes => format!("Read {} bytes\n", body.len()),
    }
}

async fn binary() -> impl IntoResponse {
    let payload: Vec<u8> = (0..=u8::MAX).collect();
    ([(header::CONTENT_TYPE, "application/octet-stream")], payload)
}
