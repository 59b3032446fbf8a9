//! Trace Test App - Entry Point
//!
//! Synthetic telemetry generator: serves Prometheus metrics, emits one
//! nested trace per second over OTLP/HTTP and writes trace-correlated
//! JSON logs. Runs until SIGTERM or SIGINT.
//!
//! Wiring sequence:
//! 1. Load config (`APP_CONFIG`, default `config.toml`) + env overrides + validate
//! 2. Init tracing (correlated JSON logs with `k8s_node_name`)
//! 3. Build the telemetry context (OTLP batch export + metrics)
//! 4. Spawn the task supervisor (trace worker + system metrics updater)
//! 5. Spawn the HTTP server (/metrics, /health, /)
//! 6. Wait for a signal or a dead server → bounded shutdown (stop loops → flush spans)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::info;

use trace_test_app::adapters::http::HttpServer;
use trace_test_app::adapters::random::ThreadRandom;
use trace_test_app::config;
use trace_test_app::telemetry::logging::init_logging;
use trace_test_app::telemetry::{Telemetry, route_sdk_errors_to_logs};
use trace_test_app::usecases::{RunningApp, TaskSupervisor, shutdown_signal};

/// Env var naming the config file.
const ENV_CONFIG_PATH: &str = "APP_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path =
        std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    // ── 2. Initialize structured JSON logging ───────────────
    init_logging(&config.logging).context("Failed to initialize logging")?;
    route_sdk_errors_to_logs();

    info!(
        service = %config.service.name,
        version = %config.service.version,
        environment = %config.service.environment,
        metrics_endpoint = %format!("http://{}/metrics", config.server.bind_address),
        health_endpoint = %format!("http://{}/health", config.server.bind_address),
        "Starting metrics-demo application"
    );

    // ── 3. Telemetry context ────────────────────────────────
    let telemetry = Arc::new(
        Telemetry::from_config(&config).context("Failed to initialize telemetry")?,
    );
    info!(
        exporter_enabled = config.exporter.enabled,
        otlp_endpoint = %config.exporter.endpoint,
        "Tracer initialized"
    );

    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 4. Background loops ─────────────────────────────────
    let supervisor = TaskSupervisor::new(
        Arc::clone(&telemetry),
        Arc::new(ThreadRandom),
        &config.supervisor,
        shutdown_tx.clone(),
    );
    let loops = supervisor.spawn();

    // ── 5. HTTP server ──────────────────────────────────────
    let server = HttpServer::new(
        Arc::clone(&telemetry.metrics),
        config.server.bind_address.clone(),
    );
    let server = tokio::spawn(server.run(shutdown_tx.subscribe()));

    info!("All tasks spawned, application is running");

    // ── 6. Run until signalled, then shut down ──────────────
    let app = RunningApp {
        telemetry,
        loops,
        server,
        shutdown_tx,
    };
    app.run_until_shutdown(
        shutdown_signal(),
        Duration::from_millis(config.shutdown.grace_period_ms),
    )
    .await
}
