//! Per-exchange trace record.
//!
//! # Responsibilities
//! - Own the trace sink and serialize every write to it
//! - Lazily create one formatter per direction and content mode
//! - Defer response header capture until finalization
//! - Finalize exactly once, in a fixed order
//!
//! # Design Decisions
//! - Logging is observational: write failures are swallowed, never returned
//! - Lock order is formatter → sink; the sink lock is never held while
//!   acquiring anything else
//! - Lifecycle diagnostics go to the span handed in at construction

use std::error::Error;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use tracing::Span;

use crate::error::TraceError;
use crate::exchange::{RequestHead, ResponseHead, ResponseMetadata};
use crate::observability::metrics;
use crate::trace::formatter::{group_thousands, ContentFormatter, ContentUnit, Direction};
use crate::trace::{lock, LINE_SEPARATOR};

type Slot<U> = OnceLock<Mutex<ContentFormatter<U>>>;

/// Formatter slots for one direction.
#[derive(Default)]
struct DirectionSlots {
    bytes: Slot<u8>,
    chars: Slot<char>,
}

/// The trace of a single request/response exchange.
///
/// Shared between the dispatcher and every stream wrapper of the exchange
/// via `Arc`. All methods take `&self` and are safe to call concurrently.
pub struct TraceRecord {
    path: PathBuf,
    sink: Mutex<Option<Box<dyn Write + Send>>>,
    started: Instant,
    request: DirectionSlots,
    response: DirectionSlots,
    response_meta: Mutex<Option<Arc<dyn ResponseMetadata>>>,
    finalized: AtomicBool,
    write_failed: AtomicBool,
    span: Span,
}

impl TraceRecord {
    /// Create the trace file at `path`. Fails if the file already exists or
    /// cannot be created.
    pub fn create(path: impl Into<PathBuf>, span: Span) -> Result<Self, TraceError> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| TraceError::Create {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(parent: &span, path = %path.display(), "Created trace");
        Ok(Self::with_sink(path, BufWriter::new(file), span))
    }

    /// Build a record over an arbitrary writer. `path` only names the trace.
    pub fn with_sink(path: impl Into<PathBuf>, sink: impl Write + Send + 'static, span: Span) -> Self {
        metrics::record_trace_started();
        Self {
            path: path.into(),
            sink: Mutex::new(Some(Box::new(sink))),
            started: Instant::now(),
            request: DirectionSlots::default(),
            response: DirectionSlots::default(),
            response_meta: Mutex::new(None),
            finalized: AtomicBool::new(false),
            write_failed: AtomicBool::new(false),
            span,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the trace, used as the correlation id.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }

    /// Append one timestamped line.
    pub fn log(&self, message: impl fmt::Display) {
        self.write_entry(std::iter::once(message));
    }

    /// Append an error entry: its message, then one line per cause.
    pub fn log_error(&self, err: &(dyn Error + 'static)) {
        let mut lines = vec![err.to_string()];
        let mut source = err.source();
        while let Some(cause) = source {
            lines.push(format!("  caused by: {}", cause));
            source = cause.source();
        }
        self.write_entry(lines);
    }

    /// Write the request header block. Reads nothing but `head`.
    pub fn log_request_headers(&self, head: &RequestHead) {
        let mut lines = vec![
            "Request Headers:".to_string(),
            format!("  (request method): {}", head.method),
        ];
        match &head.query {
            Some(query) => lines.push(format!("  (request url): {}?{}", head.url, query)),
            None => lines.push(format!("  (request url): {}", head.url)),
        }
        lines.push("  (request headers)".to_string());
        for (name, value) in &head.headers {
            lines.push(format!("  {}: {}", name, value));
        }
        if !head.parameters.is_empty() {
            lines.push("  (request parameters)".to_string());
            for (name, values) in &head.parameters {
                lines.push(format!("  {} = [{}]", name, values.join(", ")));
            }
        }
        self.write_entry(lines);
    }

    pub fn log_request_content_byte(&self, b: u8) {
        self.dump(&self.request.bytes, Direction::Request, [b]);
    }

    pub fn log_request_content_bytes(&self, bytes: &[u8]) {
        self.dump(&self.request.bytes, Direction::Request, bytes.iter().copied());
    }

    pub fn log_request_content_char(&self, c: char) {
        self.dump(&self.request.chars, Direction::Request, [c]);
    }

    pub fn log_request_content_chars(&self, chars: &[char]) {
        self.dump(&self.request.chars, Direction::Request, chars.iter().copied());
    }

    pub fn log_request_content_str(&self, s: &str) {
        self.dump(&self.request.chars, Direction::Request, s.chars());
    }

    pub fn log_response_content_byte(&self, b: u8) {
        self.dump(&self.response.bytes, Direction::Response, [b]);
    }

    pub fn log_response_content_bytes(&self, bytes: &[u8]) {
        self.dump(&self.response.bytes, Direction::Response, bytes.iter().copied());
    }

    pub fn log_response_content_char(&self, c: char) {
        self.dump(&self.response.chars, Direction::Response, [c]);
    }

    pub fn log_response_content_str(&self, s: &str) {
        self.dump(&self.response.chars, Direction::Response, s.chars());
    }

    /// Close the request formatters, if any content was seen.
    pub fn log_request_content_close(&self) {
        self.close_direction(&self.request);
    }

    /// Close the response formatters, if any content was seen.
    pub fn log_response_content_close(&self) {
        self.close_direction(&self.response);
    }

    /// Register the response whose headers are captured at close.
    pub fn set_response(&self, response: Arc<dyn ResponseMetadata>) {
        *lock(&self.response_meta) = Some(response);
    }

    /// Finalize the trace. Only the first call has any effect.
    pub fn close(&self) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }
        self.log_request_content_close();
        self.log_response_content_close();

        let response = lock(&self.response_meta).take();
        if let Some(response) = response {
            self.log_response_headers(&response.snapshot());
        }

        let elapsed = self.started.elapsed();
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.log(format_args!("Trace completed in {}ms", group_thousands(millis)));

        let sink = lock(&self.sink).take();
        if let Some(mut out) = sink {
            if let Err(e) = out.flush() {
                self.write_failure(&e);
            }
        }

        metrics::record_trace_completed(elapsed);
        tracing::debug!(parent: &self.span, elapsed_ms = millis, "Trace finalized");
    }

    fn log_response_headers(&self, head: &ResponseHead) {
        let mut lines = vec!["Response Headers:".to_string()];
        // only when the application set it
        if let Some(status) = head.status.filter(|s| *s >= 100) {
            lines.push(format!("  (response status code): {}", status));
        }
        for (name, value) in &head.headers {
            lines.push(format!("  {}: {}", name, value));
        }
        self.write_entry(lines);
    }

    fn slot<'a, U: ContentUnit>(&self, slot: &'a Slot<U>, direction: Direction) -> &'a Mutex<ContentFormatter<U>> {
        slot.get_or_init(|| {
            let formatter = ContentFormatter::new(direction);
            self.log(formatter.banner());
            Mutex::new(formatter)
        })
    }

    fn dump<U, I>(&self, slot: &Slot<U>, direction: Direction, units: I)
    where
        U: ContentUnit,
        I: IntoIterator<Item = U>,
    {
        let mut units = units.into_iter().peekable();
        // an empty write must not open a formatter
        if units.peek().is_none() {
            return;
        }
        let mut formatter = lock(self.slot(slot, direction));
        for unit in units {
            if let Some(line) = formatter.append(unit) {
                self.log(line);
            }
        }
    }

    fn close_direction(&self, slots: &DirectionSlots) {
        if let Some(formatter) = slots.bytes.get() {
            self.close_formatter(formatter);
        }
        if let Some(formatter) = slots.chars.get() {
            self.close_formatter(formatter);
        }
    }

    fn close_formatter<U: ContentUnit>(&self, formatter: &Mutex<ContentFormatter<U>>) {
        let mut formatter = lock(formatter);
        if let Some(lines) = formatter.close() {
            self.write_entry(lines);
        }
    }

    fn write_entry<I>(&self, lines: I)
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        let mut sink = lock(&self.sink);
        let Some(out) = sink.as_mut() else {
            return;
        };
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let result = lines
            .into_iter()
            .try_for_each(|line| write!(out, "{} - {}{}", stamp, line, LINE_SEPARATOR));
        drop(sink);
        if let Err(e) = result {
            self.write_failure(&e);
        }
    }

    fn write_failure(&self, err: &std::io::Error) {
        if !self.write_failed.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                parent: &self.span,
                path = %self.path.display(),
                error = %err,
                "Trace write failed; output may be incomplete"
            );
        }
    }
}

impl fmt::Debug for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceRecord")
            .field("path", &self.path)
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

impl Drop for TraceRecord {
    fn drop(&mut self) {
        if !self.is_finalized() {
            tracing::warn!(parent: &self.span, path = %self.path.display(), "Trace dropped before finalization");
            self.log("Trace abandoned before completion");
            self.close();
        }
    }
}
