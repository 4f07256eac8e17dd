//! Synchronous trace dispatch with asynchronous completion.

use std::error::Error;
use std::io;
use std::sync::Arc;

use axum::http::HeaderName;

use crate::config::TraceOutputConfig;
use crate::error::TraceError;
use crate::exchange::{ExchangeRequest, ExchangeResponse, TracedRequest, TracedResponse};
use crate::observability::metrics;
use crate::trace::{TraceFileAllocator, TraceRecord};

/// Name collisions tolerated before trace creation gives up.
const MAX_CREATE_ATTEMPTS: u32 = 8;

/// How the pipeline call ended.
pub enum ChainOutcome {
    /// The exchange is done; the trace can be finalized now.
    Complete,
    /// Processing continues asynchronously on the given context.
    Async(Arc<dyn AsyncContext>),
}

/// Asynchronous processing handle of the hosting pipeline.
pub trait AsyncContext: Send + Sync {
    fn add_listener(&self, listener: Box<dyn AsyncListener>);
}

/// Notifications for an asynchronously processed exchange.
pub trait AsyncListener: Send + Sync {
    fn on_complete(&self);

    fn on_timeout(&self);

    fn on_error(&self, err: &(dyn Error + 'static));

    fn on_start_async(&self) {}
}

/// Finalizes a trace when asynchronous processing ends.
pub struct TraceCompletion {
    record: Arc<TraceRecord>,
    finalize_on_failure: bool,
}

impl TraceCompletion {
    pub fn new(record: Arc<TraceRecord>, finalize_on_failure: bool) -> Self {
        Self {
            record,
            finalize_on_failure,
        }
    }

    fn failed(&self) {
        if self.finalize_on_failure {
            self.record.close();
        } else {
            tracing::warn!(
                parent: self.record.span(),
                path = %self.record.path().display(),
                "Async exchange failed; trace stays open until completion"
            );
        }
    }
}

impl AsyncListener for TraceCompletion {
    fn on_complete(&self) {
        self.record.close();
    }

    fn on_timeout(&self) {
        self.record.log("Async timeout");
        self.failed();
    }

    fn on_error(&self, err: &(dyn Error + 'static)) {
        self.record.log_error(err);
        self.failed();
    }
}

/// Decides where traces go and drives their lifecycle around a pipeline call.
#[derive(Debug, Clone)]
pub struct TraceFilter {
    files: TraceFileAllocator,
    trace_id_header: Option<HeaderName>,
    /// Configured spelling of `trace_id_header`, which `HeaderName` lowercases.
    trace_id_label: Option<String>,
    finalize_on_async_failure: bool,
}

impl TraceFilter {
    /// Fails when the trace directory does not exist.
    pub fn new(config: &TraceOutputConfig) -> Result<Self, TraceError> {
        if !config.dir.is_dir() {
            return Err(TraceError::MissingDirectory(config.dir.clone()));
        }
        let (trace_id_header, trace_id_label) = match config.trace_id_header.as_deref() {
            Some(name) => match HeaderName::from_bytes(name.as_bytes()) {
                Ok(header) => (Some(header), Some(name.to_string())),
                Err(e) => {
                    tracing::warn!(header = %name, error = %e, "Ignoring invalid trace id header");
                    (None, None)
                }
            },
            None => (None, None),
        };
        tracing::info!(dir = %config.dir.display(), "Trace filter ready");
        Ok(Self {
            files: TraceFileAllocator::from_config(config),
            trace_id_header,
            trace_id_label,
            finalize_on_async_failure: config.finalize_on_async_failure,
        })
    }

    /// Header carrying the trace file name on traced responses.
    pub fn trace_id_header(&self) -> Option<&HeaderName> {
        self.trace_id_header.as_ref()
    }

    /// Start a trace in a fresh file.
    pub fn begin(&self) -> Result<Arc<TraceRecord>, TraceError> {
        let mut attempts = 1;
        loop {
            let path = self.files.next_path();
            let span = tracing::debug_span!(
                "exchange_trace",
                file = %path.file_name().unwrap_or_default().to_string_lossy()
            );
            match TraceRecord::create(path, span) {
                Ok(record) => return Ok(Arc::new(record)),
                Err(e) if e.is_already_exists() && attempts < MAX_CREATE_ATTEMPTS => attempts += 1,
                Err(e) => {
                    metrics::record_trace_failed();
                    return Err(e);
                }
            }
        }
    }

    /// Listener that finalizes `record` once asynchronous processing ends.
    pub fn completion(&self, record: Arc<TraceRecord>) -> TraceCompletion {
        TraceCompletion::new(record, self.finalize_on_async_failure)
    }

    /// Trace one exchange around `chain`.
    ///
    /// The trace is finalized when `chain` returns `Complete` or fails, or
    /// later through the context's listener when it returns `Async`. A chain
    /// failure is returned unchanged; a trace creation failure is converted
    /// into an `io::Error` carrying the `TraceError`.
    pub fn do_filter<Req, Resp, F>(&self, request: Req, mut response: Resp, chain: F) -> io::Result<ChainOutcome>
    where
        Req: ExchangeRequest,
        Resp: ExchangeResponse,
        F: FnOnce(TracedRequest<Req>, TracedResponse<Resp>) -> io::Result<ChainOutcome>,
    {
        let record = self.begin()?;
        if let Some(name) = &self.trace_id_label {
            response.set_header(name, &record.file_name());
        }
        let traced_request = TracedRequest::new(request, Arc::clone(&record));
        let traced_response = TracedResponse::new(response, Arc::clone(&record));

        match chain(traced_request, traced_response) {
            Ok(ChainOutcome::Complete) => {
                record.close();
                Ok(ChainOutcome::Complete)
            }
            Ok(ChainOutcome::Async(context)) => {
                context.add_listener(Box::new(self.completion(record)));
                Ok(ChainOutcome::Async(context))
            }
            Err(e) => {
                record.log_error(&e);
                record.close();
                Err(e)
            }
        }
    }
}
