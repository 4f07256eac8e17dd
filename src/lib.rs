//! Request/response exchange tracing.
//!
//! Every traced exchange gets its own trace file: request headers, request
//! and response content as hex/ASCII dumps or escaped character
//! transcripts, stream lifecycle events, errors, response headers and the
//! elapsed time, each line timestamped.

pub mod config;
pub mod error;
pub mod exchange;
pub mod http;
pub mod observability;
pub mod stream;
pub mod trace;

pub use config::TraceConfig;
pub use error::TraceError;
pub use exchange::TraceFilter;
pub use http::HttpServer;
pub use trace::TraceRecord;
