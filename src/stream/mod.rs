//! Content streams and their tracing wrappers.
//!
//! # Data Flow
//! ```text
//! application read  → TraceInputStream / TraceReader
//!                       → delegate.read → record (content or EOF)
//! application write → TraceOutputStream / TraceWriter
//!                       → record (content) → delegate.write
//! close             → record content-close → delegate.close → "Closed:"
//! ```
//!
//! # Design Decisions
//! - Reads are logged after the delegate answers, writes before it is called
//! - Delegate errors are logged and returned unchanged
//! - Readiness queries are forwarded without touching the record

pub mod input;
pub mod output;

use std::io::{self, Cursor, Read, Write};

use crate::trace::{TraceRecord, LINE_SEPARATOR};

pub use input::{TraceInputStream, TraceReader};
pub use output::{TraceOutputStream, TraceWriter};

/// Byte source of a request body.
pub trait ContentSource: Read + Send {
    fn is_ready(&self) -> bool {
        true
    }

    fn is_finished(&self) -> bool {
        false
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Byte sink of a response body.
pub trait ContentSink: Write + Send {
    fn is_ready(&self) -> bool {
        true
    }

    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Character source of a request body.
pub trait CharSource: Send {
    /// Next character, or `None` at end of input.
    fn read_char(&mut self) -> io::Result<Option<char>>;

    /// Fill `buf` as far as input allows. `Ok(0)` for a non-empty `buf` is EOF.
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.read_char()? {
                Some(c) => {
                    buf[n] = c;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Character sink of a response body.
pub trait CharSink: Send {
    fn write_char(&mut self, c: char) -> io::Result<()>;

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        s.chars().try_for_each(|c| self.write_char(c))
    }

    /// `s` followed by the platform line separator.
    fn write_line(&mut self, s: &str) -> io::Result<()> {
        self.write_str(s)?;
        self.write_str(LINE_SEPARATOR)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl<S: ContentSource + ?Sized> ContentSource for Box<S> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<S: ContentSink + ?Sized> ContentSink for Box<S> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<S: CharSource + ?Sized> CharSource for Box<S> {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        (**self).read_char()
    }

    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<usize> {
        (**self).read_chars(buf)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<S: CharSink + ?Sized> CharSink for Box<S> {
    fn write_char(&mut self, c: char) -> io::Result<()> {
        (**self).write_char(c)
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        (**self).write_str(s)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<T: AsRef<[u8]> + Send> ContentSource for Cursor<T> {
    fn is_finished(&self) -> bool {
        self.position() >= self.get_ref().as_ref().len() as u64
    }
}

impl ContentSink for Vec<u8> {}

impl CharSink for String {
    fn write_char(&mut self, c: char) -> io::Result<()> {
        self.push(c);
        Ok(())
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.push_str(s);
        Ok(())
    }
}

/// In-memory character source.
#[derive(Debug, Clone, Default)]
pub struct CharCursor {
    chars: Vec<char>,
    pos: usize,
}

impl CharCursor {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

impl CharSource for CharCursor {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        Ok(c)
    }

    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let rest = &self.chars[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Log a delegate failure into the trace and hand it back unchanged.
pub(crate) fn traced<T>(record: &TraceRecord, result: io::Result<T>) -> io::Result<T> {
    result.map_err(|e| {
        record.log_error(&e);
        e
    })
}
