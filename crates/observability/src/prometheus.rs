//! Prometheus exporter for the `metrics` facade.

use std::net::SocketAddr;

use eyre::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus recorder globally and serve it over HTTP on `addr`.
///
/// The listener runs on the current tokio runtime, or on a background thread
/// when there is none.
pub fn install_prometheus_exporter(addr: SocketAddr) -> eyre::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install prometheus exporter")?;

    info!(%addr, "serving prometheus metrics");
    Ok(())
}

/// Install the Prometheus recorder globally without a listener.
///
/// The returned handle renders the current snapshot on demand.
pub fn install_prometheus_recorder() -> eyre::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install prometheus recorder")
}
