//! Exchange trace server.
//!
//! Serves the demonstration routes with every exchange traced to its own
//! file in the configured trace directory.
//!
//! ```text
//!     Client ──▶ TraceLayer ──▶ trace_exchange ──▶ TimeoutLayer ──▶ handler
//!                                     │
//!                                     ▼
//!                         <trace dir>/tracer-<id>.log
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use exchange_trace::config::{load_config, validate_config, TraceConfig};
use exchange_trace::http::{demo_routes, HttpServer};
use exchange_trace::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "exchange-trace")]
#[command(about = "HTTP server recording a trace file per exchange", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory receiving trace files (overrides the config file)
    #[arg(long)]
    trace_dir: Option<PathBuf>,

    /// Listen address (overrides the config file)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TraceConfig::default(),
    };
    if let Some(dir) = cli.trace_dir {
        config.trace.dir = dir;
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(exchange_trace::config::ConfigError::Validation)?;

    logging::init_logging(&config.observability);
    tracing::info!("exchange-trace v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        trace_dir = %config.trace.dir.display(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, demo_routes())?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
