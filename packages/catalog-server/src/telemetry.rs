//! Logging and metrics setup for the binary.

use std::net::SocketAddr;

use anyhow::Context as _;
use clap::ValueEnum;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use tracing_subscriber::EnvFilter;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable, for terminals.
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_format: LogFormat,
    /// Address of the Prometheus scrape endpoint; `None` disables it.
    pub metrics_addr: Option<SocketAddr>,
}

/// Latency buckets for `catalog_command_duration_seconds`.
const DURATION_BUCKETS: &[f64] = &[
    0.000_5, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Installs the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Pretty => builder.with_target(false).try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Installs the Prometheus recorder and its HTTP scrape listener.
///
/// # Errors
///
/// Fails if the bucket configuration is rejected, the address cannot be
/// bound, or a recorder is already installed.
pub fn install_metrics_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("catalog_command_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )?
        .install()
        .context("failed to install Prometheus exporter")?;

    tracing::info!(%addr, "Prometheus metrics available at /metrics");
    Ok(())
}

/// Applies `config`: tracing always, metrics when an address is set.
///
/// # Errors
///
/// See [`init_tracing`] and [`install_metrics_exporter`].
pub fn init(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_tracing(config.log_format)?;
    if let Some(addr) = config.metrics_addr {
        install_metrics_exporter(addr)?;
    }
    Ok(())
}
