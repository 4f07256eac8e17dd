//! Traced request.

use std::sync::Arc;

use crate::error::TraceError;
use crate::exchange::{Access, ExchangeRequest, RequestHead};
use crate::stream::{traced, CharSource, ContentSource, TraceInputStream, TraceReader};
use crate::trace::TraceRecord;

pub type RequestStream = TraceInputStream<Box<dyn ContentSource>>;
pub type RequestReader = TraceReader<Box<dyn CharSource>>;

/// Request whose body streams are mirrored into a trace.
pub struct TracedRequest<R> {
    inner: R,
    record: Arc<TraceRecord>,
    access: Access<RequestStream, RequestReader>,
}

impl<R: ExchangeRequest> TracedRequest<R> {
    /// Wrap `inner`, logging its header block immediately.
    pub fn new(inner: R, record: Arc<TraceRecord>) -> Self {
        record.log_request_headers(&inner.head());
        Self {
            inner,
            record,
            access: Access::Unselected,
        }
    }

    pub fn head(&self) -> RequestHead {
        self.inner.head()
    }

    /// The body as bytes. Repeated calls return the same stream.
    pub fn input_stream(&mut self) -> Result<&mut RequestStream, TraceError> {
        self.record.log("Get InputStream");
        if let Access::Unselected = self.access {
            let delegate = traced(&self.record, self.inner.open_stream())?;
            let stream = TraceInputStream::new(delegate, Arc::clone(&self.record)).with_label("request input stream");
            self.access = Access::Bytes(stream);
        }
        match &mut self.access {
            Access::Bytes(stream) => Ok(stream),
            _ => Err(TraceError::StateConflict("reader() previously called")),
        }
    }

    /// The body as characters. Repeated calls return the same reader.
    pub fn reader(&mut self) -> Result<&mut RequestReader, TraceError> {
        self.record.log("Get Reader");
        if let Access::Unselected = self.access {
            let delegate = traced(&self.record, self.inner.open_reader())?;
            let reader = TraceReader::new(delegate, Arc::clone(&self.record)).with_label("request reader");
            self.access = Access::Chars(reader);
        }
        match &mut self.access {
            Access::Chars(reader) => Ok(reader),
            _ => Err(TraceError::StateConflict("input_stream() previously called")),
        }
    }
}
