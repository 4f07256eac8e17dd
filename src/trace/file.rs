//! Trace file naming.

use std::path::PathBuf;
use uuid::Uuid;

use crate::config::TraceOutputConfig;

/// Produces candidate trace paths under one directory.
///
/// Uniqueness is best-effort here; the record opens its file with
/// create-new semantics and the caller retries on collision.
#[derive(Debug, Clone)]
pub struct TraceFileAllocator {
    dir: PathBuf,
    prefix: String,
    suffix: String,
}

impl TraceFileAllocator {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn from_config(config: &TraceOutputConfig) -> Self {
        Self::new(&config.dir, &config.file_prefix, &config.file_suffix)
    }

    /// Next candidate path, e.g. `/tmp/tracer-3f2c…e1.log`.
    pub fn next_path(&self) -> PathBuf {
        let name = format!("{}{}{}", self.prefix, Uuid::new_v4().simple(), self.suffix);
        self.dir.join(name)
    }
}
