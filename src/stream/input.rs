//! Request-side wrappers: byte input stream and character reader.

use std::any::type_name;
use std::borrow::Cow;
use std::io::{self, Read};
use std::sync::Arc;

use crate::stream::{traced, CharSource, ContentSource};
use crate::trace::TraceRecord;

/// Byte source that mirrors everything read into the request trace.
pub struct TraceInputStream<S> {
    delegate: S,
    record: Arc<TraceRecord>,
    label: Cow<'static, str>,
}

impl<S: ContentSource> TraceInputStream<S> {
    pub fn new(delegate: S, record: Arc<TraceRecord>) -> Self {
        Self {
            delegate,
            record,
            label: Cow::Borrowed(type_name::<S>()),
        }
    }

    /// Name used for the delegate in `EOF reached on` and `Closed:` lines.
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    /// Read a single byte; `None` at end of input.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut b = [0u8; 1];
        match self.read(&mut b)? {
            0 => Ok(None),
            _ => Ok(Some(b[0])),
        }
    }
}

impl<S: ContentSource> Read for TraceInputStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = traced(&self.record, self.delegate.read(buf))?;
        if n == 0 && !buf.is_empty() {
            self.record.log(format_args!("EOF reached on {}", self.label));
        } else {
            self.record.log_request_content_bytes(&buf[..n]);
        }
        Ok(n)
    }
}

impl<S: ContentSource> ContentSource for TraceInputStream<S> {
    fn is_ready(&self) -> bool {
        self.delegate.is_ready()
    }

    fn is_finished(&self) -> bool {
        self.delegate.is_finished()
    }

    fn close(&mut self) -> io::Result<()> {
        self.record.log_request_content_close();
        traced(&self.record, self.delegate.close())?;
        self.record.log(format_args!("Closed: {}", self.label));
        Ok(())
    }
}

/// Character source that mirrors everything read into the request trace.
pub struct TraceReader<S> {
    delegate: S,
    record: Arc<TraceRecord>,
    label: Cow<'static, str>,
}

impl<S: CharSource> TraceReader<S> {
    pub fn new(delegate: S, record: Arc<TraceRecord>) -> Self {
        Self {
            delegate,
            record,
            label: Cow::Borrowed(type_name::<S>()),
        }
    }

    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    fn eof(&self) {
        self.record.log(format_args!("EOF reached on {}", self.label));
    }
}

impl<S: CharSource> CharSource for TraceReader<S> {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        let c = traced(&self.record, self.delegate.read_char())?;
        match c {
            Some(c) => self.record.log_request_content_char(c),
            None => self.eof(),
        }
        Ok(c)
    }

    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let n = traced(&self.record, self.delegate.read_chars(buf))?;
        if n == 0 && !buf.is_empty() {
            self.eof();
        } else {
            self.record.log_request_content_chars(&buf[..n]);
        }
        Ok(n)
    }

    fn is_ready(&self) -> bool {
        self.delegate.is_ready()
    }

    fn close(&mut self) -> io::Result<()> {
        self.record.log_request_content_close();
        traced(&self.record, self.delegate.close())?;
        self.record.log(format_args!("Closed: {}", self.label));
        Ok(())
    }
}
