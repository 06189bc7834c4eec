//! CLI argument definitions for auditflow-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Settings are layered as defaults < config file < environment < CLI flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use auditflow_core::config::AuditflowConfig;
use auditflow_core::error::{AuditflowError, ConfigError};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/auditflow/auditflow.toml";

/// auditflow audit log ingestion daemon.
///
/// Tails the WAF audit log, classifies each transaction and persists
/// security events with at-least-once, duplicate-safe delivery.
#[derive(Parser, Debug)]
#[command(name = "auditflow-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to auditflow.toml configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Drain the current backlog once, then exit.
    #[arg(long)]
    pub once: bool,

    /// Override PID file path.
    #[arg(long)]
    pub pid_file: Option<String>,
}

impl DaemonCli {
    /// Load, override and validate the configuration.
    ///
    /// A missing file at the default location falls back to built-in defaults
    /// (plus environment overrides). A missing file at an explicit `--config`
    /// path is an error.
    pub async fn load_config(&self) -> Result<AuditflowConfig> {
        let mut config = match AuditflowConfig::from_file(&self.config).await {
            Ok(config) => config,
            Err(AuditflowError::Config(ConfigError::FileNotFound { .. }))
                if self.config.as_path() == Path::new(DEFAULT_CONFIG_PATH) =>
            {
                AuditflowConfig::default()
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to load config from {}", self.config.display())
                });
            }
        };

        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config.validate().context("config validation failed")?;
        Ok(config)
    }

    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut AuditflowConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::try_parse_from(["auditflow-daemon"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!cli.validate);
        assert!(!cli.once);
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn flags_override_config() {
        let cli = DaemonCli::try_parse_from([
            "auditflow-daemon",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--pid-file",
            "/run/auditflow.pid",
            "--once",
        ])
        .unwrap();

        let mut config = AuditflowConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.general.pid_file, "/run/auditflow.pid");
        assert!(cli.once);
    }
}
