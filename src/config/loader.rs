//! Configuration Loader - File Loading, Env Overrides and Validation
//!
//! Handles loading `config.toml`, applying environment overrides, and
//! providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Env var holding the Kubernetes node name stamped on every log line.
pub const ENV_NODE_NAME: &str = "K8S_NODE_NAME";

/// Standard OpenTelemetry env var for the traces endpoint.
pub const ENV_TRACES_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT";

/// Load configuration from `path` (defaults if the file does not exist),
/// apply process environment overrides, and validate.
///
/// # Errors
/// Returns detailed error if:
/// - The file exists but can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
    let mut config = read_config_file(path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

/// Parse a config file, or return defaults when it does not exist.
fn read_config_file(path: &str) -> Result<AppConfig> {
    let path = Path::new(path);

    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parse configuration from TOML text. Missing sections take defaults.
pub fn parse_config(content: &str) -> Result<AppConfig> {
    Ok(toml::from_str(content)?)
}

/// Apply environment overrides through `lookup` (the process env in
/// production, a map in tests).
///
/// A set-but-empty `K8S_NODE_NAME` is kept as `""`; only an unset one
/// leaves the configured default. An empty endpoint counts as unset.
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(node) = lookup(ENV_NODE_NAME) {
        config.logging.node_name = node;
    }
    if let Some(endpoint) = lookup(ENV_TRACES_ENDPOINT).filter(|v| !v.is_empty()) {
        config.exporter.endpoint = endpoint;
    }
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Parseable bind address
/// - HTTP(S) exporter endpoint when export is enabled
/// - Positive queue, batch and timing parameters
/// - Batch size not larger than the queue
pub fn validate_config(config: &AppConfig) -> Result<()> {
    anyhow::ensure!(
        config.server.bind_address.parse::<std::net::SocketAddr>().is_ok(),
        "server.bind_address must be host:port, got {:?}",
        config.server.bind_address
    );

    anyhow::ensure!(
        !config.service.name.is_empty(),
        "service.name must not be empty"
    );

    // Exporter validation
    if config.exporter.enabled {
        anyhow::ensure!(
            config.exporter.endpoint.starts_with("http://")
                || config.exporter.endpoint.starts_with("https://"),
            "exporter.endpoint must be an http(s) URL, got {:?}",
            config.exporter.endpoint
        );
    }
    anyhow::ensure!(
        config.exporter.max_queue_size > 0,
        "exporter.max_queue_size must be positive"
    );
    anyhow::ensure!(
        config.exporter.max_export_batch_size > 0
            && config.exporter.max_export_batch_size <= config.exporter.max_queue_size,
        "exporter.max_export_batch_size must be in (0, max_queue_size], got {}",
        config.exporter.max_export_batch_size
    );
    anyhow::ensure!(
        config.exporter.timeout_ms > 0,
        "exporter.timeout_ms must be positive"
    );
    anyhow::ensure!(
        config.exporter.scheduled_delay_ms > 0,
        "exporter.scheduled_delay_ms must be positive"
    );

    anyhow::ensure!(
        config.shutdown.grace_period_ms > 0,
        "shutdown.grace_period_ms must be positive"
    );

    info!(
        bind_address = %config.server.bind_address,
        exporter_enabled = config.exporter.enabled,
        otlp_endpoint = %config.exporter.endpoint,
        restart_on_fault = config.supervisor.restart_on_fault,
        "Configuration validated"
    );

    Ok(())
}
