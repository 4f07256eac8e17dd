//! Traced response.

use std::sync::Arc;

use crate::error::TraceError;
use crate::exchange::{Access, ExchangeResponse};
use crate::stream::{traced, CharSink, ContentSink, TraceOutputStream, TraceWriter};
use crate::trace::TraceRecord;

pub type ResponseStream = TraceOutputStream<Box<dyn ContentSink>>;
pub type ResponseWriter = TraceWriter<Box<dyn CharSink>>;

/// Response whose body streams are mirrored into a trace.
///
/// Headers are not logged here: they are not final until the exchange
/// completes, so the record reads them at close.
pub struct TracedResponse<R> {
    inner: R,
    record: Arc<TraceRecord>,
    access: Access<ResponseStream, ResponseWriter>,
}

impl<R: ExchangeResponse> TracedResponse<R> {
    pub fn new(inner: R, record: Arc<TraceRecord>) -> Self {
        record.set_response(inner.metadata());
        Self {
            inner,
            record,
            access: Access::Unselected,
        }
    }

    /// The body as bytes. Repeated calls return the same stream.
    pub fn output_stream(&mut self) -> Result<&mut ResponseStream, TraceError> {
        self.record.log("Get OutputStream");
        if let Access::Unselected = self.access {
            let delegate = traced(&self.record, self.inner.open_stream())?;
            let stream = TraceOutputStream::new(delegate, Arc::clone(&self.record)).with_label("response output stream");
            self.access = Access::Bytes(stream);
        }
        match &mut self.access {
            Access::Bytes(stream) => Ok(stream),
            _ => Err(TraceError::StateConflict("writer() previously called")),
        }
    }

    /// The body as characters. Repeated calls return the same writer.
    pub fn writer(&mut self) -> Result<&mut ResponseWriter, TraceError> {
        self.record.log("Get Writer");
        if let Access::Unselected = self.access {
            let delegate = traced(&self.record, self.inner.open_writer())?;
            let writer = TraceWriter::new(delegate, Arc::clone(&self.record)).with_label("response writer");
            self.access = Access::Chars(writer);
        }
        match &mut self.access {
            Access::Chars(writer) => Ok(writer),
            _ => Err(TraceError::StateConflict("output_stream() previously called")),
        }
    }

    pub fn set_status(&mut self, status: u16) {
        self.inner.set_status(status);
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.inner.set_header(name, value);
    }

    pub fn flush_buffer(&mut self) -> Result<(), TraceError> {
        self.record.log("Response.flushBuffer()");
        traced(&self.record, self.inner.flush_buffer())?;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.record.log("Response.reset()");
        self.inner.reset();
    }

    pub fn reset_buffer(&mut self) {
        self.record.log("Response.resetBuffer()");
        self.inner.reset_buffer();
    }

    pub fn send_error(&mut self, status: u16, message: Option<&str>) -> Result<(), TraceError> {
        match message {
            Some(message) => self.record.log(format_args!("Response.sendError({}, {})", status, message)),
            None => self.record.log(format_args!("Response.sendError({})", status)),
        }
        traced(&self.record, self.inner.send_error(status, message))?;
        Ok(())
    }

    pub fn send_redirect(&mut self, location: &str) -> Result<(), TraceError> {
        self.record.log(format_args!("Response.sendRedirect({})", location));
        traced(&self.record, self.inner.send_redirect(location))?;
        Ok(())
    }
}
