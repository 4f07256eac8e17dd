//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Trace records and the HTTP layer produce:
//!     → logging.rs (structured log events, one span per trace)
//!     → metrics.rs (trace counters, duration histogram)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Trace files are the product; process logs only report on them
//! - Each trace record carries its own span so diagnostics correlate
//!   with the file they concern
//! - Metric updates go through the `metrics` facade and are no-ops until
//!   an exporter is installed

pub mod logging;
pub mod metrics;
