//! HTTP Server - Metrics, Health and Root Endpoints
//!
//! Exposes `/metrics`, `/health` and `/` via axum 0.7. Each handler
//! logs the access with `endpoint`, `method` and `remote_addr`.
//! `/health` has no dependency on the background loops, so it stays 200
//! even when a worker has died.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use crate::adapters::metrics::MetricsRegistry;
use crate::adapters::metrics::registry::CONTENT_TYPE;

/// Axum-based server for the scrape and probe endpoints.
pub struct HttpServer {
    /// Registry rendered by `/metrics` and updated by `/`.
    metrics: Arc<MetricsRegistry>,
    /// Bind address, `host:port`.
    bind_address: String,
}

impl HttpServer {
    /// Create a new server for `metrics` on `bind_address`.
    pub fn new(metrics: Arc<MetricsRegistry>, bind_address: impl Into<String>) -> Self {
        Self {
            metrics,
            bind_address: bind_address.into(),
        }
    }

    /// Routes served by this server.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(Self::metrics))
            .route("/health", get(Self::health))
            .route("/", get(Self::index))
            .with_state(Arc::clone(&self.metrics))
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// # Errors
    /// Fails if the address cannot be bound or the server errors.
    #[instrument(skip(self, shutdown_rx), fields(bind_address = %self.bind_address))]
    pub async fn run(self, shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.bind_address).await?;
        self.serve(listener, shutdown_rx).await
    }

    /// Serve on an already bound listener until shutdown.
    ///
    /// # Errors
    /// Fails if the server errors while accepting connections.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let local_addr = listener.local_addr()?;
        info!(
            address = %local_addr,
            metrics_endpoint = %format!("http://{local_addr}/metrics"),
            health_endpoint = %format!("http://{local_addr}/health"),
            "HTTP server started"
        );

        let app = self.router();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Prometheus text exposition of every registered instrument.
    async fn metrics(
        State(metrics): State<Arc<MetricsRegistry>>,
        method: Method,
        remote: Option<ConnectInfo<SocketAddr>>,
    ) -> Response {
        info!(
            endpoint = "/metrics",
            method = %method,
            remote_addr = %remote_addr(remote.as_ref()),
            "Metrics endpoint accessed"
        );

        match metrics.render() {
            Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
            Err(e) => {
                error!(error = %e, endpoint = "/metrics", "Failed to render metrics");
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics").into_response()
            }
        }
    }

    /// Liveness probe: always 200 while the process serves HTTP.
    async fn health(method: Method, remote: Option<ConnectInfo<SocketAddr>>) -> impl IntoResponse {
        info!(
            endpoint = "/health",
            method = %method,
            remote_addr = %remote_addr(remote.as_ref()),
            status = "healthy",
            "Health check endpoint accessed"
        );
        (StatusCode::OK, Json(json!({ "status": "healthy" })))
    }

    async fn index(
        State(metrics): State<Arc<MetricsRegistry>>,
        method: Method,
        remote: Option<ConnectInfo<SocketAddr>>,
    ) -> impl IntoResponse {
        metrics.record_request("GET", "/", "200");
        info!(
            endpoint = "/",
            method = %method,
            remote_addr = %remote_addr(remote.as_ref()),
            "Root endpoint accessed"
        );
        (
            StatusCode::OK,
            Json(json!({
                "message": "Metrics Demo App",
                "metrics_endpoint": "/metrics",
                "health_endpoint": "/health",
            })),
        )
    }
}

fn remote_addr(remote: Option<&ConnectInfo<SocketAddr>>) -> String {
    remote.map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.ip().to_string())
}
