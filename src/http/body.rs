//! Traced `http_body::Body`.
//!
//! Wraps a request or response body and mirrors every data frame into the
//! exchange's trace record as it passes through. The content mode of each
//! direction is chosen once from its `Content-Type`.
//!
//! # Design Decisions
//! - Frames are forwarded untouched; tracing never alters the payload
//! - Textual bodies are decoded incrementally, so a multi-byte character
//!   split across frames is logged once, intact
//! - The end of the response body finalizes the record; dropping an
//!   unfinished response body (client gone, timeout) finalizes it too

use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, HeaderMap};
use bytes::Bytes;
use http_body::{Body as _, Frame, SizeHint};

use crate::trace::{Direction, TraceRecord};

const TEXTUAL_APPLICATION_TYPES: [&str; 5] = [
    "application/json",
    "application/xml",
    "application/javascript",
    "application/x-www-form-urlencoded",
    "application/x-ndjson",
];

/// How a body's content is rendered into the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    /// Hex/ASCII dump.
    Bytes,
    /// Escaped character transcript.
    Chars,
}

impl ContentMode {
    /// Character mode for textual media types, byte mode otherwise.
    pub fn for_headers(headers: &HeaderMap) -> Self {
        let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
            return ContentMode::Bytes;
        };
        let content_type = content_type.to_ascii_lowercase();
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        let textual = essence.starts_with("text/")
            || essence.ends_with("+json")
            || essence.ends_with("+xml")
            || TEXTUAL_APPLICATION_TYPES.contains(&essence)
            || (content_type.contains("charset=") && !is_binary(essence, &content_type));
        if textual {
            ContentMode::Chars
        } else {
            ContentMode::Bytes
        }
    }
}

/// Media types whose charset parameter says nothing about textual content.
fn is_binary(essence: &str, content_type: &str) -> bool {
    essence == "application/octet-stream"
        || ["image/", "audio/", "video/"].iter().any(|p| essence.starts_with(p))
        || content_type.contains("charset=binary")
}

/// Streaming UTF-8 decoder.
///
/// Holds back an incomplete trailing sequence until the next chunk. Invalid
/// sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    // from_utf8 vouched for this prefix
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush a sequence truncated by the end of the body.
    pub fn finish(&mut self) -> Option<char> {
        if self.pending.is_empty() {
            None
        } else {
            self.pending.clear();
            Some(char::REPLACEMENT_CHARACTER)
        }
    }
}

/// A body whose data frames are mirrored into a trace record.
pub struct TracedBody {
    inner: Body,
    record: Arc<TraceRecord>,
    direction: Direction,
    decoder: Option<Utf8Decoder>,
    accessed: bool,
    finished: bool,
}

impl TracedBody {
    pub fn new(inner: Body, record: Arc<TraceRecord>, direction: Direction, mode: ContentMode) -> Self {
        let decoder = match mode {
            ContentMode::Chars => Some(Utf8Decoder::default()),
            ContentMode::Bytes => None,
        };
        Self {
            inner,
            record,
            direction,
            decoder,
            accessed: false,
            finished: false,
        }
    }

    pub fn mode(&self) -> ContentMode {
        if self.decoder.is_some() {
            ContentMode::Chars
        } else {
            ContentMode::Bytes
        }
    }

    fn label(&self) -> &'static str {
        match self.direction {
            Direction::Request => "request body",
            Direction::Response => "response body",
        }
    }

    fn note_access(&mut self) {
        if self.accessed {
            return;
        }
        self.accessed = true;
        let accessor = match (self.direction, self.mode()) {
            (Direction::Request, ContentMode::Bytes) => "Get InputStream",
            (Direction::Request, ContentMode::Chars) => "Get Reader",
            (Direction::Response, ContentMode::Bytes) => "Get OutputStream",
            (Direction::Response, ContentMode::Chars) => "Get Writer",
        };
        self.record.log(accessor);
    }

    fn log_data(&mut self, data: &[u8]) {
        match (&mut self.decoder, self.direction) {
            (Some(decoder), Direction::Request) => self.record.log_request_content_str(&decoder.decode(data)),
            (Some(decoder), Direction::Response) => self.record.log_response_content_str(&decoder.decode(data)),
            (None, Direction::Request) => self.record.log_request_content_bytes(data),
            (None, Direction::Response) => self.record.log_response_content_bytes(data),
        }
    }

    fn log_truncated(&mut self) {
        let Some(c) = self.decoder.as_mut().and_then(Utf8Decoder::finish) else {
            return;
        };
        match self.direction {
            Direction::Request => self.record.log_request_content_char(c),
            Direction::Response => self.record.log_response_content_char(c),
        }
    }

    /// Body fully consumed.
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.log_truncated();
        match self.direction {
            Direction::Request => {
                self.record.log(format_args!("EOF reached on {}", self.label()));
                self.record.log_request_content_close();
            }
            Direction::Response => {
                self.record.log_response_content_close();
                self.record.log(format_args!("Closed: {}", self.label()));
                self.record.close();
            }
        }
    }
}

impl http_body::Body for TracedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        this.note_access();
        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.log_data(data);
                }
                // the server may stop polling once the size is satisfied
                if this.inner.is_end_stream() {
                    this.finish();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => {
                this.record.log_error(&e);
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.finish();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.finished || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for TracedBody {
    fn drop(&mut self) {
        if self.finished || self.direction != Direction::Response {
            return;
        }
        if self.inner.is_end_stream() {
            // never polled because there was nothing to send
            self.finish();
            return;
        }
        self.record.log("Response body abandoned before completion");
        self.finish();
    }
}
