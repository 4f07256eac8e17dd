//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! default every field, so an empty file is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TraceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Where and how trace files are written.
    pub trace: TraceOutputConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Trace output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TraceOutputConfig {
    /// Directory receiving one file per traced exchange. Must exist.
    pub dir: PathBuf,

    /// File name prefix.
    pub file_prefix: String,

    /// File name suffix.
    pub file_suffix: String,

    /// Response header carrying the trace file name. `None` disables it.
    pub trace_id_header: Option<String>,

    /// Finalize traces when asynchronous processing times out or fails,
    /// instead of waiting for a completion that may never come.
    pub finalize_on_async_failure: bool,
}

impl Default for TraceOutputConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir(),
            file_prefix: "tracer-".to_string(),
            file_suffix: ".log".to_string(),
            trace_id_header: Some("X-TraceId".to_string()),
            finalize_on_async_failure: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
