//! Prometheus metrics exporter.

use std::net::SocketAddr;

use eyre::{Result, WrapErr};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// Install the Prometheus recorder as the global metrics recorder and serve
/// it over HTTP at `addr`.
///
/// Must be called from within a tokio runtime.
pub fn install_prometheus_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .wrap_err_with(|| format!("failed to install metrics exporter on {addr}"))?;
    info!(%addr, "metrics endpoint listening");
    Ok(())
}
