use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use db_monitoring::{
    actors::monitor::MonitorHandle, alerts::AlertSink, collector::MySqlCollector,
    config::read_config_file, storage::directory::DirectoryStore,
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Periodically collects MySQL health snapshots, stores them and alerts on them
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
    let filter = filter::Targets::new().with_targets(vec![
        ("db_monitoring", level),
        ("dbmon_collector", level),
    ]);
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

    let handle = MonitorHandle::spawn_collecting(
        Box::new(MySqlCollector::new(config.database.clone())),
        Arc::new(store),
        AlertSink::from_config(&config),
        config.thresholds,
        Duration::from_secs(config.collect_interval),
    );
    info!(
        "collecting from {}:{} every {}s",
        config.database.host, config.database.port, config.collect_interval
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("stopping collector");

    handle.shutdown().await?;
    handle.wait_stopped().await?;

    Ok(())
}
