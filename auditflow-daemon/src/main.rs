use anyhow::Result;
use clap::Parser;

use auditflow_daemon::cli::DaemonCli;
use auditflow_daemon::logging;
use auditflow_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = cli.load_config().await?;

    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        once = cli.once,
        "auditflow-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;

    if cli.once {
        let drained = orchestrator.run_once().await;
        orchestrator.store().close().await;
        drained?;
        return Ok(());
    }

    orchestrator.run().await
}
