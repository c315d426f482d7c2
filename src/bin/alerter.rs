use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use db_monitoring::{
    actors::monitor::MonitorHandle, alerts::AlertSink, config::read_config_file,
    storage::directory::DirectoryStore,
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Periodically evaluates the newest stored snapshot and alerts on it
#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = filter::Targets::new()
        .with_targets(vec![("db_monitoring", level), ("dbmon_alerter", level)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init(args.verbose);
    dotenv::dotenv().ok();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    let store = DirectoryStore::open(&config.storage.dir)
        .await
        .context("failed to open snapshot directory")?;

    let handle = MonitorHandle::spawn_alerting(
        Arc::new(store),
        AlertSink::from_config(&config),
        config.thresholds,
        Duration::from_secs(config.alert_interval),
    );
    info!(
        "evaluating snapshots in {} every {}s",
        config.storage.dir.display(),
        config.alert_interval
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("stopping alerter");

    handle.shutdown().await?;
    handle.wait_stopped().await?;

    Ok(())
}
