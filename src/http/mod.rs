//! HTTP integration subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, timeout, access log)
//!     → middleware.rs (open trace, log request head)
//!     → body.rs (mirror request body while the handler reads it)
//!     → application handler
//!     → middleware.rs (trace id header, capture response head)
//!     → body.rs (mirror response body; its end finalizes the trace)
//!     → Send to client
//! ```

pub mod body;
pub mod demo;
pub mod middleware;
pub mod server;

pub use body::{ContentMode, TracedBody, Utf8Decoder};
pub use demo::demo_routes;
pub use middleware::trace_exchange;
pub use server::HttpServer;
