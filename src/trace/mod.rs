//! Trace recording core.
//!
//! # Data Flow
//! ```text
//! dispatch (exchange::filter / http::middleware)
//!     → file.rs allocates a fresh trace path
//!     → record.rs opens the sink, logs request headers
//!     → stream wrappers mirror content into record.rs
//!         → formatter.rs buffers units, renders dump lines
//!     → record.rs close(): request content → response content
//!       → response headers → elapsed time → sink closed
//! ```
//!
//! # Design Decisions
//! - One file per exchange, append-only, every line timestamped
//! - The sink mutex is the single point of mutual exclusion for output
//! - Formatter slots are created lazily and never replaced

pub mod file;
pub mod formatter;
pub mod record;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use file::TraceFileAllocator;
pub use formatter::{ContentFormatter, ContentUnit, Direction, BYTES_PER_LINE, CHARS_PER_LINE};
pub use record::TraceRecord;

/// Line terminator used in trace files and by `CharSink::write_line`.
#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";
/// Line terminator used in trace files and by `CharSink::write_line`.
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";

/// Tracing must keep working after a panic elsewhere poisoned a lock.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
