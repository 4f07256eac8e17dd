//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use exchange_trace::config::TraceOutputConfig;
use exchange_trace::exchange::{ExchangeRequest, ExchangeResponse, RequestHead, ResponseMetadata, SharedResponseHead};
use exchange_trace::stream::{CharCursor, CharSink, CharSource, ContentSink, ContentSource};

/// Length of the `YYYY-MM-DD HH:MM:SS.mmm - ` prefix on every trace line.
pub const STAMP_LEN: usize = 26;

/// Trace output settings pointing at `dir`.
pub fn trace_config(dir: &Path) -> TraceOutputConfig {
    TraceOutputConfig {
        dir: dir.to_path_buf(),
        ..Default::default()
    }
}

/// Every trace file written into `dir`.
pub fn trace_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    files.sort();
    files
}

/// The single trace file in `dir`.
pub fn only_trace_file(dir: &Path) -> PathBuf {
    let files = trace_files(dir);
    assert_eq!(files.len(), 1, "expected one trace file, found {:?}", files);
    files.into_iter().next().unwrap()
}

/// Trace lines with the timestamp prefix removed.
pub fn messages(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| line[STAMP_LEN..].to_string())
        .collect()
}

/// In-memory request with a fixed body.
pub struct MemoryRequest {
    pub head: RequestHead,
    pub body: Vec<u8>,
}

impl MemoryRequest {
    pub fn get(url: &str) -> Self {
        Self::new("GET", url, Vec::new())
    }

    pub fn new(method: &str, url: &str, body: impl Into<Vec<u8>>) -> Self {
        let (url, query) = match url.split_once('?') {
            Some((url, query)) => (url.to_string(), Some(query.to_string())),
            None => (url.to_string(), None),
        };
        let parameters = query
            .as_deref()
            .map(exchange_trace::exchange::parse_parameters)
            .unwrap_or_default();
        Self {
            head: RequestHead {
                method: method.to_string(),
                url,
                query,
                headers: vec![("host".to_string(), "localhost".to_string())],
                parameters,
            },
            body: body.into(),
        }
    }
}

impl ExchangeRequest for MemoryRequest {
    fn head(&self) -> RequestHead {
        self.head.clone()
    }

    fn open_stream(&mut self) -> io::Result<Box<dyn ContentSource>> {
        Ok(Box::new(Cursor::new(std::mem::take(&mut self.body))))
    }

    fn open_reader(&mut self) -> io::Result<Box<dyn CharSource>> {
        let text = String::from_utf8_lossy(&self.body).into_owned();
        Ok(Box::new(CharCursor::new(&text)))
    }
}

/// Byte sink whose contents stay readable after it is handed out.
#[derive(Clone, Default)]
pub struct SharedBytes(pub Arc<Mutex<Vec<u8>>>);

impl Write for SharedBytes {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ContentSink for SharedBytes {}

/// Character sink whose contents stay readable after it is handed out.
#[derive(Clone, Default)]
pub struct SharedText(pub Arc<Mutex<String>>);

impl CharSink for SharedText {
    fn write_char(&mut self, c: char) -> io::Result<()> {
        self.0.lock().unwrap().push(c);
        Ok(())
    }
}

/// In-memory response recording what the application sent.
#[derive(Clone, Default)]
pub struct MemoryResponse {
    pub head: SharedResponseHead,
    pub bytes: SharedBytes,
    pub text: SharedText,
}

impl MemoryResponse {
    pub fn status(&self) -> Option<u16> {
        self.head.snapshot().status
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.head
            .snapshot()
            .headers
            .into_iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

impl ExchangeResponse for MemoryResponse {
    fn metadata(&self) -> Arc<dyn ResponseMetadata> {
        Arc::new(self.head.clone())
    }

    fn set_status(&mut self, status: u16) {
        self.head.set_status(status);
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.head.set_header(name, value);
    }

    fn open_stream(&mut self) -> io::Result<Box<dyn ContentSink>> {
        Ok(Box::new(self.bytes.clone()))
    }

    fn open_writer(&mut self) -> io::Result<Box<dyn CharSink>> {
        Ok(Box::new(self.text.clone()))
    }

    fn send_error(&mut self, status: u16, _message: Option<&str>) -> io::Result<()> {
        self.head.set_status(status);
        Ok(())
    }

    fn send_redirect(&mut self, location: &str) -> io::Result<()> {
        self.head.set_status(302);
        self.head.set_header("Location", location);
        Ok(())
    }
}
