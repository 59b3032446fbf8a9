//! Process Lifecycle - Termination Signals and Bounded Shutdown
//!
//! `shutdown_signal` resolves on SIGTERM or SIGINT (Ctrl+C only off
//! unix). `RunningApp::run_until_shutdown` waits for that signal or for
//! the HTTP server to die, broadcasts shutdown, then drains the loops,
//! the server and the span pipeline against a single deadline `grace`
//! after the trigger.
//!
//! A server that dies on its own (bind failure, accept error) turns into
//! an `Err`, so the process exits non-zero.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, timeout_at};
use tracing::{error, info, warn};

use crate::telemetry::Telemetry;

/// Resolve when the process is asked to stop; returns the signal name.
#[cfg(unix)]
pub async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, "Failed to install signal handlers, listening for Ctrl+C only");
            ctrl_c().await
        }
    }
}

/// Resolve when the process is asked to stop; returns the signal name.
#[cfg(not(unix))]
pub async fn shutdown_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}

/// Everything `main` started, ready to be shut down.
pub struct RunningApp {
    /// Telemetry whose span pipeline is flushed last.
    pub telemetry: Arc<Telemetry>,
    /// Supervised background loops.
    pub loops: Vec<JoinHandle<()>>,
    /// HTTP server task.
    pub server: JoinHandle<Result<()>>,
    /// Broadcaster the loops and the server listen on.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl RunningApp {
    /// Run until `signal` resolves or the HTTP server exits, then shut
    /// everything down within `grace`.
    ///
    /// # Errors
    /// Returns the server's failure if it exited before `signal`.
    pub async fn run_until_shutdown(
        self,
        signal: impl Future<Output = &'static str>,
        grace: Duration,
    ) -> Result<()> {
        let Self {
            telemetry,
            loops,
            mut server,
            shutdown_tx,
        } = self;

        let server_exit = tokio::select! {
            name = signal => {
                info!(signal = name, "Application interrupted, initiating graceful shutdown");
                None
            }
            joined = &mut server => {
                let result = flatten(joined);
                if let Err(e) = &result {
                    error!(error = %format!("{e:#}"), "HTTP server failed, shutting down");
                } else {
                    warn!("HTTP server exited, shutting down");
                }
                Some(result)
            }
        };

        let deadline = Instant::now() + grace;
        let _ = shutdown_tx.send(());
        info!("Shutdown signal broadcast to all tasks");

        for handle in loops {
            if timeout_at(deadline, handle).await.is_err() {
                warn!(grace_ms = grace.as_millis(), "Background task did not stop within grace period");
            }
        }
        if server_exit.is_none() {
            match timeout_at(deadline, server).await {
                Ok(joined) => {
                    if let Err(e) = flatten(joined) {
                        warn!(error = %format!("{e:#}"), "HTTP server stopped with an error");
                    }
                }
                Err(_) => {
                    warn!(grace_ms = grace.as_millis(), "HTTP server did not stop within grace period");
                }
            }
        }

        info!(
            wait_ms = deadline.saturating_duration_since(Instant::now()).as_millis(),
            "Waiting for traces to be exported"
        );
        match telemetry.shutdown(deadline).await {
            Ok(()) => info!("Span pipeline flushed"),
            Err(e) => warn!(error = %e, "Span pipeline did not drain cleanly"),
        }

        info!(shutdown = "complete", "Application finished");

        match server_exit {
            None => Ok(()),
            Some(Ok(())) => Err(anyhow!("HTTP server exited before shutdown was requested")),
            Some(Err(e)) => Err(e.context("HTTP server failed")),
        }
    }
}

fn flatten(joined: Result<Result<()>, JoinError>) -> Result<()> {
    joined.map_err(anyhow::Error::from).and_then(|r| r)
}
