//! Exchange-level integration.
//!
//! # Data Flow
//! ```text
//! TraceFilter::do_filter(request, response, chain)
//!     → TraceRecord created (trace-id header set on response)
//!     → TracedRequest logs request headers
//!     → TracedResponse registers response metadata
//!     → chain runs against the traced pair
//!     → Complete: record closed now
//!       Async(ctx): TraceCompletion listener closes it later
//! ```
//!
//! # Design Decisions
//! - Each direction's content has a single access mode; the first stream
//!   handed out decides it and the other accessor fails from then on
//! - The traced request/response only log and forward; they never change
//!   what the application observes

pub mod filter;
pub mod head;
pub mod request;
pub mod response;

use std::io;
use std::sync::Arc;

use crate::stream::{CharSink, CharSource, ContentSink, ContentSource};

pub use filter::{AsyncContext, AsyncListener, ChainOutcome, TraceCompletion, TraceFilter};
pub use head::{parse_parameters, RequestHead, ResponseHead, ResponseMetadata, SharedResponseHead};
pub use request::TracedRequest;
pub use response::TracedResponse;

/// The request side of an exchange, as provided by the hosting pipeline.
pub trait ExchangeRequest: Send {
    fn head(&self) -> RequestHead;

    /// Body as bytes. Called at most once per exchange.
    fn open_stream(&mut self) -> io::Result<Box<dyn ContentSource>>;

    /// Body as characters. Called at most once per exchange.
    fn open_reader(&mut self) -> io::Result<Box<dyn CharSource>>;
}

/// The response side of an exchange, as provided by the hosting pipeline.
pub trait ExchangeResponse: Send {
    /// View of status and headers, read when the trace is finalized.
    fn metadata(&self) -> Arc<dyn ResponseMetadata>;

    fn set_status(&mut self, status: u16);

    fn set_header(&mut self, name: &str, value: &str);

    /// Body as bytes. Called at most once per exchange.
    fn open_stream(&mut self) -> io::Result<Box<dyn ContentSink>>;

    /// Body as characters. Called at most once per exchange.
    fn open_writer(&mut self) -> io::Result<Box<dyn CharSink>>;

    fn flush_buffer(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn reset(&mut self) {}

    fn reset_buffer(&mut self) {}

    fn send_error(&mut self, status: u16, message: Option<&str>) -> io::Result<()>;

    fn send_redirect(&mut self, location: &str) -> io::Result<()>;
}

/// Which stream of a direction has been handed out.
enum Access<B, C> {
    Unselected,
    Bytes(B),
    Chars(C),
}
