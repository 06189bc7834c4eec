//! Logging initialization for auditflow-daemon.
//!
//! Configures `tracing-subscriber` from the `[general]` section.
//! `RUST_LOG` takes precedence over `general.log_level`.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use auditflow_core::config::GeneralConfig;

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
///
/// # Formats
///
/// * `"json"` - JSON lines (default for production)
/// * `"pretty"` - Human-readable output (for development)
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.log_format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        other => {
            return Err(anyhow::anyhow!(
                "unknown log format '{other}', expected 'json' or 'pretty'"
            ));
        }
    };

    result.map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_format() {
        let config = GeneralConfig {
            log_format: "xml".to_owned(),
            ..Default::default()
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("xml"));
    }
}
