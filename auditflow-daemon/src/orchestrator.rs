//! Daemon orchestration -- assembly, lifecycle and graceful shutdown.
//!
//! The [`Orchestrator`] connects to the event store (with startup backoff),
//! builds the notifier and the log pipeline, and runs until a shutdown signal.
//!
//! # Startup
//!
//! 1. Validate configuration
//! 2. Install the metrics recorder (if enabled)
//! 3. Connect to the store, retrying with exponential backoff
//! 4. Build the notifier and the pipeline (loads the checkpoint)
//!
//! # Shutdown
//!
//! The pipeline finishes its in-flight batch (commit and checkpoint) before
//! the store pool is closed and the PID file removed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;

use auditflow_core::config::AuditflowConfig;
use auditflow_core::metrics as m;
use auditflow_core::pipeline::{HealthStatus, Pipeline};
use auditflow_log_pipeline::notifier::{self, ChangeNotifier};
use auditflow_log_pipeline::{
    LogPipeline, LogPipelineBuilder, PipelineConfig, SqlEventStore, StatsSnapshot,
    connect_with_retry,
};

use crate::metrics_server;
use crate::pid_file::PidFile;

/// Interval between periodic health reports.
const HEALTH_REPORT_INTERVAL: Duration = Duration::from_secs(30);

type DaemonPipeline = LogPipeline<SqlEventStore, Arc<dyn ChangeNotifier>>;

/// Health report for the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    pub status: HealthStatus,
    pub uptime_secs: u64,
    pub checkpoint_offset: u64,
    pub events_stored: u64,
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    config: AuditflowConfig,
    store: SqlEventStore,
    pipeline: DaemonPipeline,
    start_time: Instant,
}

impl Orchestrator {
    /// Build from an already-loaded configuration.
    ///
    /// # Errors
    ///
    /// Fails if validation fails, the store stays unreachable after the
    /// configured number of attempts, or the checkpoint cannot be read.
    pub async fn build_from_config(config: AuditflowConfig) -> Result<Self> {
        config.validate().context("config validation failed")?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let store = connect_with_retry(&config.storage)
            .await
            .context("failed to connect to event store")?;

        let notifier =
            notifier::from_config(&config.notifier).context("failed to build notifier")?;
        if config.notifier.enabled {
            tracing::info!(
                endpoint = %config.notifier.endpoint,
                min_severity = %config.notifier.min_severity,
                "change notifier enabled"
            );
        }

        let pipeline = LogPipelineBuilder::new(store.clone())
            .config(PipelineConfig::from_core(&config))
            .notifier(notifier)
            .build()
            .await
            .context("failed to build log pipeline")?;

        tracing::info!(
            log_path = %config.ingest.log_path,
            state_path = %config.ingest.state_path,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            store,
            pipeline,
            start_time: Instant::now(),
        })
    }

    /// Drain the backlog once and return (`--once`).
    pub async fn run_once(&mut self) -> Result<StatsSnapshot> {
        let stats = self
            .pipeline
            .run_once()
            .await
            .context("backlog drain failed")?;
        tracing::info!(
            lines_read = stats.lines_read,
            events_stored = stats.events_stored,
            duplicates = stats.duplicates_skipped,
            dropped = stats.lines_dropped,
            offset = stats.checkpoint_offset,
            "backlog drained"
        );
        Ok(stats)
    }

    /// Start the pipeline and block until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        let _pid_file = match self.config.general.pid_file.as_str() {
            "" => None,
            path => Some(PidFile::create(path)?),
        };

        self.pipeline
            .start()
            .await
            .context("failed to start log pipeline")?;

        let shutdown = wait_for_shutdown_signal();
        tokio::pin!(shutdown);
        let mut health_tick = tokio::time::interval(HEALTH_REPORT_INTERVAL);

        tracing::info!("auditflow-daemon running");
        let signal = loop {
            tokio::select! {
                signal = &mut shutdown => break signal?,
                _ = health_tick.tick() => self.report_health().await,
            }
        };
        tracing::info!(signal, "shutdown signal received");

        let stopped = self.pipeline.stop().await;
        self.store.close().await;
        stopped.context("failed to stop log pipeline")?;

        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "auditflow-daemon shut down"
        );
        Ok(())
    }

    /// Current health of the daemon.
    pub async fn health(&self) -> DaemonHealth {
        let stats = self.pipeline.stats();
        DaemonHealth {
            status: self.pipeline.health_check().await,
            uptime_secs: self.start_time.elapsed().as_secs(),
            checkpoint_offset: stats.checkpoint_offset,
            events_stored: stats.events_stored,
        }
    }

    async fn report_health(&self) {
        let health = self.health().await;
        if self.config.metrics.enabled {
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(health.uptime_secs as f64);
        }
        match &health.status {
            HealthStatus::Healthy => tracing::debug!(
                offset = health.checkpoint_offset,
                events_stored = health.events_stored,
                "health check"
            ),
            status => tracing::warn!(status = %status, "pipeline not healthy"),
        }
    }

    /// Loaded configuration.
    pub fn config(&self) -> &AuditflowConfig {
        &self.config
    }

    /// Event store handle.
    pub fn store(&self) -> &SqlEventStore {
        &self.store
    }
}

/// Wait for SIGTERM or SIGINT and return the signal name.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl-C handler")?;
    Ok("CTRL-C")
}
