//! Response-side wrappers: byte output stream and character writer.

use std::any::type_name;
use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::Arc;

use crate::stream::{traced, CharSink, ContentSink};
use crate::trace::TraceRecord;

/// Byte sink that logs every write into the response trace before forwarding.
pub struct TraceOutputStream<S> {
    delegate: S,
    record: Arc<TraceRecord>,
    label: Cow<'static, str>,
}

impl<S: ContentSink> TraceOutputStream<S> {
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

    pub fn write_byte(&mut self, b: u8) -> io::Result<()> {
        self.write_all(&[b])
    }

    pub fn get_ref(&self) -> &S {
        &self.delegate
    }

    pub fn into_inner(self) -> S {
        self.delegate
    }
}

impl<S: ContentSink> Write for TraceOutputStream<S> {
    /// Forwards the whole buffer so the logged attempt matches what was sent.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_all(buf)?;
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.record.log_response_content_bytes(buf);
        traced(&self.record, self.delegate.write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        traced(&self.record, self.delegate.flush())?;
        self.record.log(format_args!("Flushed: {}", self.label));
        Ok(())
    }
}

impl<S: ContentSink> ContentSink for TraceOutputStream<S> {
    fn is_ready(&self) -> bool {
        self.delegate.is_ready()
    }

    fn close(&mut self) -> io::Result<()> {
        self.record.log_response_content_close();
        traced(&self.record, self.delegate.close())?;
        self.record.log(format_args!("Closed: {}", self.label));
        Ok(())
    }
}

/// Character sink that logs every write into the response trace before forwarding.
pub struct TraceWriter<S> {
    delegate: S,
    record: Arc<TraceRecord>,
    label: Cow<'static, str>,
}

impl<S: CharSink> TraceWriter<S> {
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

    pub fn get_ref(&self) -> &S {
        &self.delegate
    }
}

impl<S: CharSink> CharSink for TraceWriter<S> {
    fn write_char(&mut self, c: char) -> io::Result<()> {
        self.record.log_response_content_char(c);
        traced(&self.record, self.delegate.write_char(c))
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.record.log_response_content_str(s);
        traced(&self.record, self.delegate.write_str(s))
    }

    fn flush(&mut self) -> io::Result<()> {
        traced(&self.record, self.delegate.flush())?;
        self.record.log(format_args!("Flushed: {}", self.label));
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.delegate.is_ready()
    }

    fn close(&mut self) -> io::Result<()> {
        self.record.log_response_content_close();
        traced(&self.record, self.delegate.close())?;
        self.record.log(format_args!("Closed: {}", self.label));
        Ok(())
    }
}
