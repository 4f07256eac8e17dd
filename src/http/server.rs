//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap an application Router with the exchange tracing middleware
//! - Wire up the request timeout and access logging
//! - Bind server to listener and shut down gracefully

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::TraceConfig;
use crate::error::TraceError;
use crate::exchange::TraceFilter;
use crate::http::middleware::trace_exchange;

/// HTTP server tracing every exchange of the wrapped application.
pub struct HttpServer {
    router: Router,
    config: TraceConfig,
}

impl HttpServer {
    /// Fails when the trace directory does not exist.
    pub fn new(config: TraceConfig, app: Router) -> Result<Self, TraceError> {
        let filter = Arc::new(TraceFilter::new(&config.trace)?);
        let router = Self::build_router(&config, app, filter);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Tracing sits outside the timeout so a timed-out exchange still has
    /// its response recorded.
    #[allow(deprecated)]
    fn build_router(config: &TraceConfig, app: Router, filter: Arc<TraceFilter>) -> Router {
        app.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(filter, trace_exchange))
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Run the server until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Run the server until `shutdown` resolves, then drain open connections.
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            trace_dir = %self.config.trace.dir.display(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
