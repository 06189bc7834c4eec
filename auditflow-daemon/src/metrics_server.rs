//! Prometheus metrics endpoint.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`.
//! Histogram buckets for batch duration come from `auditflow_core::metrics`.

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

use auditflow_core::config::MetricsConfig;
use auditflow_core::metrics as m;

/// Parse and check the listen address of the metrics endpoint.
pub fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is served",
            config.endpoint
        ));
    }

    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {e}"))
}

/// Install the global metrics recorder and start the HTTP listener.
///
/// Call once per process.
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = listen_addr(config)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(m::INGEST_BATCH_DURATION_SECONDS.to_owned()),
            &m::BATCH_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {e}"))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {e}"))?;

    m::describe_all();
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}
