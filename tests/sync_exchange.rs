//! Exchange tracing through the synchronous dispatcher.

use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use exchange_trace::exchange::{
    AsyncContext, AsyncListener, ChainOutcome, ExchangeRequest, RequestHead, TraceFilter,
};
use exchange_trace::stream::{CharSink, CharSource, ContentSource};
use exchange_trace::TraceError;

mod common;

use common::{messages, only_trace_file, trace_config, trace_files, MemoryRequest, MemoryResponse};

fn conflict(e: TraceError) -> io::Error {
    io::Error::other(e)
}

#[test]
fn test_hello_world_character_response() {
    let dir = tempfile::tempdir().unwrap();
    let filter = TraceFilter::new(&trace_config(dir.path())).unwrap();
    let response = MemoryResponse::default();

    filter
        .do_filter(MemoryRequest::get("http://localhost/hello"), response.clone(), |_req, mut resp| {
            resp.set_status(200);
            resp.set_header("Content-Type", "text/plain");
            let writer = resp.writer().map_err(conflict)?;
            writer.write_str("Hello World")?;
            writer.write_char('\n')?;
            Ok(ChainOutcome::Complete)
        })
        .unwrap();

    assert_eq!(*response.text.0.lock().unwrap(), "Hello World\n");

    let path = only_trace_file(dir.path());
    let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("tracer-") && file_name.ends_with(".log"));
    assert_eq!(response.header("X-TraceId").as_deref(), Some(file_name.as_str()));

    let lines = messages(&path);
    assert_eq!(
        lines[..11],
        [
            "Request Headers:".to_string(),
            "  (request method): GET".to_string(),
            "  (request url): http://localhost/hello".to_string(),
            "  (request headers)".to_string(),
            "  host: localhost".to_string(),
            "Get Writer".to_string(),
            "[Response] Character Based".to_string(),
            "[Response] Content:: Hello World\\n".to_string(),
            "[Response] Closed :: Seen 12 characters".to_string(),
            "Response Headers:".to_string(),
            "  (response status code): 200".to_string(),
        ]
    );
    assert_eq!(lines[11], format!("  X-TraceId: {}", file_name));
    assert_eq!(lines[12], "  Content-Type: text/plain");
    assert!(lines[13].starts_with("Trace completed in "));
    assert!(lines[13].ends_with("ms"));
    assert_eq!(lines.len(), 14);
}

#[test]
fn test_twenty_request_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let filter = TraceFilter::new(&trace_config(dir.path())).unwrap();
    let request = MemoryRequest::new("PUT", "http://localhost/upload", &b"ABCDEFGHIJKLMNOPQRST"[..]);

    filter
        .do_filter(request, MemoryResponse::default(), |mut req, _resp| {
            let stream = req.input_stream().map_err(conflict)?;
            let mut buf = [0u8; 64];
            assert_eq!(stream.read(&mut buf)?, 20);
            assert_eq!(stream.read(&mut buf)?, 0);
            Ok(ChainOutcome::Complete)
        })
        .unwrap();

    let lines = messages(&only_trace_file(dir.path()));
    assert_eq!(lines[5], "Get InputStream");
    assert_eq!(lines[6], "[Request] Byte Content");
    assert_eq!(
        lines[7],
        "[Request] Content:: 41 42 43 44 45 46 47 48  49 4A 4B 4C 4D 4E 4F 50  | ABCDEFGHIJKLMNOP"
    );
    assert_eq!(lines[8], "EOF reached on request input stream");
    assert!(lines[9].starts_with("[Request] Content:: 51 52 53 54 "));
    assert!(lines[9].ends_with(" | QRST"));
    assert_eq!(lines[10], "[Request] Closed :: Seen 20 bytes");
    assert_eq!(lines[11], "Response Headers:");
    // status was never set
    assert!(lines[12].starts_with("  X-TraceId: "));
    assert!(lines[13].starts_with("Trace completed in "));
}

#[test]
fn test_untouched_response_body() {
    let dir = tempfile::tempdir().unwrap();
    let filter = TraceFilter::new(&trace_config(dir.path())).unwrap();

    filter
        .do_filter(MemoryRequest::get("http://localhost/empty"), MemoryResponse::default(), |_req, mut resp| {
            resp.set_status(204);
            Ok(ChainOutcome::Complete)
        })
        .unwrap();

    let lines = messages(&only_trace_file(dir.path()));
    assert!(!lines.iter().any(|l| l.starts_with("[Response]")));
    let headers = lines.iter().position(|l| l == "Response Headers:").unwrap();
    assert_eq!(lines[headers + 1], "  (response status code): 204");
    assert!(lines.last().unwrap().starts_with("Trace completed in "));
}

/// Serves four bytes, then fails.
struct FlakySource {
    served: bool,
}

impl Read for FlakySource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.served {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"));
        }
        self.served = true;
        buf[..4].copy_from_slice(b"abcd");
        Ok(4)
    }
}

impl ContentSource for FlakySource {}

struct FlakyRequest;

impl ExchangeRequest for FlakyRequest {
    fn head(&self) -> RequestHead {
        RequestHead {
            method: "POST".into(),
            url: "http://localhost/flaky".into(),
            ..Default::default()
        }
    }

    fn open_stream(&mut self) -> io::Result<Box<dyn ContentSource>> {
        Ok(Box::new(FlakySource { served: false }))
    }

    fn open_reader(&mut self) -> io::Result<Box<dyn CharSource>> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "bytes only"))
    }
}

#[test]
fn test_read_failure_is_logged_and_propagated() {
    let dir = tempfile::tempdir().unwrap();
    let filter = TraceFilter::new(&trace_config(dir.path())).unwrap();

    let result = filter.do_filter(FlakyRequest, MemoryResponse::default(), |mut req, _resp| {
        let stream = req.input_stream().map_err(conflict)?;
        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf)?, 4);
        stream.read(&mut buf)?;
        Ok(ChainOutcome::Complete)
    });

    let Err(err) = result else {
        panic!("chain failure must propagate");
    };
    assert!(err.get_ref().is_some_and(|inner| !inner.is::<TraceError>()));
    assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    assert_eq!(err.to_string(), "peer went away");

    let lines = messages(&only_trace_file(dir.path()));
    assert!(lines.iter().any(|l| l == "peer went away"));
    assert!(lines.iter().any(|l| l == "[Request] Closed :: Seen 4 bytes"));
    assert!(lines.last().unwrap().starts_with("Trace completed in "));
}

#[test]
fn test_single_access_mode_per_direction() {
    let dir = tempfile::tempdir().unwrap();
    let filter = TraceFilter::new(&trace_config(dir.path())).unwrap();
    let request = MemoryRequest::new("POST", "http://localhost/form", "a=1");

    filter
        .do_filter(request, MemoryResponse::default(), |mut req, mut resp| {
            req.input_stream().unwrap();
            let err = req.reader().err().unwrap();
            assert!(matches!(err, TraceError::StateConflict(_)));
            assert_eq!(err.to_string(), "input_stream() previously called");
            // the chosen mode stays available
            assert!(req.input_stream().is_ok());

            resp.writer().unwrap();
            let err = resp.output_stream().err().unwrap();
            assert_eq!(err.to_string(), "writer() previously called");
            Ok(ChainOutcome::Complete)
        })
        .unwrap();

    let lines = messages(&only_trace_file(dir.path()));
    let accessors: Vec<_> = lines.iter().filter(|l| l.starts_with("Get ")).cloned().collect();
    assert_eq!(
        accessors,
        ["Get InputStream", "Get Reader", "Get InputStream", "Get Writer", "Get OutputStream"]
    );
}

#[test]
fn test_response_lifecycle_calls_are_logged() {
    let dir = tempfile::tempdir().unwrap();
    let filter = TraceFilter::new(&trace_config(dir.path())).unwrap();
    let response = MemoryResponse::default();

    filter
        .do_filter(MemoryRequest::get("http://localhost/old?x=1&x=2"), response.clone(), |_req, mut resp| {
            resp.reset_buffer();
            resp.send_redirect("/new").map_err(conflict)?;
            Ok(ChainOutcome::Complete)
        })
        .unwrap();

    assert_eq!(response.status(), Some(302));
    let lines = messages(&only_trace_file(dir.path()));
    assert!(lines.contains(&"  (request url): http://localhost/old?x=1&x=2".to_string()));
    assert!(lines.contains(&"  (request parameters)".to_string()));
    assert!(lines.contains(&"  x = [1, 2]".to_string()));
    assert!(lines.contains(&"Response.resetBuffer()".to_string()));
    assert!(lines.contains(&"Response.sendRedirect(/new)".to_string()));
    assert!(lines.contains(&"  (response status code): 302".to_string()));
    assert!(lines.contains(&"  Location: /new".to_string()));
}

#[test]
fn test_each_exchange_gets_its_own_file() {
    let dir = tempfile::tempdir().unwrap();
    let filter = TraceFilter::new(&trace_config(dir.path())).unwrap();
    for _ in 0..3 {
        filter
            .do_filter(MemoryRequest::get("http://localhost/"), MemoryResponse::default(), |_req, _resp| {
                Ok(ChainOutcome::Complete)
            })
            .unwrap();
    }
    assert_eq!(trace_files(dir.path()).len(), 3);
}

#[test]
fn test_missing_directory_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = trace_config(&dir.path().join("absent"));
    assert!(matches!(TraceFilter::new(&config), Err(TraceError::MissingDirectory(_))));
}

#[test]
fn test_trace_creation_failure_skips_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let filter = TraceFilter::new(&trace_config(dir.path())).unwrap();
    dir.close().unwrap();

    let mut ran = false;
    let err = filter
        .do_filter(MemoryRequest::get("http://localhost/"), MemoryResponse::default(), |_req, _resp| {
            ran = true;
            Ok(ChainOutcome::Complete)
        })
        .err()
        .unwrap();
    assert!(!ran);
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
    assert!(matches!(
        err.get_ref().and_then(|e| e.downcast_ref::<TraceError>()),
        Some(TraceError::Create { .. })
    ));
}

/// Async context driven by the test.
#[derive(Default)]
struct ManualContext {
    listeners: Mutex<Vec<Box<dyn AsyncListener>>>,
}

impl ManualContext {
    fn complete(&self) {
        self.listeners.lock().unwrap().iter().for_each(|l| l.on_complete());
    }

    fn time_out(&self) {
        self.listeners.lock().unwrap().iter().for_each(|l| l.on_timeout());
    }
}

impl AsyncContext for ManualContext {
    fn add_listener(&self, listener: Box<dyn AsyncListener>) {
        self.listeners.lock().unwrap().push(listener);
    }
}

fn run_async(filter: &TraceFilter, context: &Arc<ManualContext>) {
    let ctx: Arc<dyn AsyncContext> = context.clone();
    let outcome = filter
        .do_filter(MemoryRequest::get("http://localhost/slow"), MemoryResponse::default(), move |_req, mut resp| {
            resp.writer().map_err(conflict)?.write_str("partial")?;
            Ok(ChainOutcome::Async(ctx))
        })
        .unwrap();
    assert!(matches!(outcome, ChainOutcome::Async(_)));
}

fn completed(lines: &[String]) -> usize {
    lines.iter().filter(|l| l.starts_with("Trace completed in ")).count()
}

#[test]
fn test_async_completion_finalizes_later() {
    let dir = tempfile::tempdir().unwrap();
    let filter = TraceFilter::new(&trace_config(dir.path())).unwrap();
    let context = Arc::new(ManualContext::default());

    run_async(&filter, &context);
    let path = only_trace_file(dir.path());
    assert_eq!(completed(&messages(&path)), 0);

    context.complete();
    let lines = messages(&path);
    assert!(lines.contains(&"[Response] Content:: partial".to_string()));
    assert_eq!(completed(&lines), 1);

    // a late notification changes nothing
    context.complete();
    assert_eq!(messages(&path), lines);
}

#[test]
fn test_async_timeout_finalizes_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let filter = TraceFilter::new(&trace_config(dir.path())).unwrap();
    let context = Arc::new(ManualContext::default());

    run_async(&filter, &context);
    context.time_out();

    let lines = messages(&only_trace_file(dir.path()));
    let timeout = lines.iter().position(|l| l == "Async timeout").unwrap();
    assert!(lines[timeout + 1..].iter().any(|l| l.starts_with("Trace completed in ")));
}

#[test]
fn test_async_timeout_can_leave_trace_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = trace_config(dir.path());
    config.finalize_on_async_failure = false;
    let filter = TraceFilter::new(&config).unwrap();
    let context = Arc::new(ManualContext::default());

    run_async(&filter, &context);
    context.time_out();
    let path = only_trace_file(dir.path());
    assert_eq!(completed(&messages(&path)), 0);

    context.complete();
    let lines = messages(&path);
    assert!(lines.contains(&"Async timeout".to_string()));
    assert_eq!(completed(&lines), 1);
}
