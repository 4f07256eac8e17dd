//! Error definitions shared by the tracing core and its integrations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by trace creation and the traced exchange objects.
///
/// Failures while *writing* trace lines never appear here: those are
/// observational and are swallowed by the record.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The trace file could not be created. No trace exists for the exchange.
    #[error("failed to create trace file {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configured trace directory is missing.
    #[error("trace directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    /// The content of one direction was already handed out in the other mode.
    #[error("{0}")]
    StateConflict(&'static str),

    /// Failure reported by a delegate (request, response or the chain).
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TraceError {
    /// True when trace creation collided with an existing file.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, TraceError::Create { source, .. } if source.kind() == io::ErrorKind::AlreadyExists)
    }
}

impl From<TraceError> for io::Error {
    fn from(err: TraceError) -> Self {
        if let TraceError::Io(e) = err {
            return e;
        }
        let kind = match &err {
            TraceError::Create { source, .. } => source.kind(),
            TraceError::MissingDirectory(_) => io::ErrorKind::NotFound,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
