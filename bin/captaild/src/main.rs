//! Captail daemon
//!
//! Tails the configured MongoDB capped collections and writes each
//! normalized event as a JSON line on stdout.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CAPTAIL_CONFIG` | unset | Path to a TOML config file |
//! | `CAPTAIL_SERVER` | `mongodb://localhost:27017` | MongoDB connection string |
//! | `CAPTAIL_COLLECTIONS` | unset | Comma-separated `[database/]collection` list |
//! | `CAPTAIL_INTERVAL` | `0.5` | Empty-poll backoff in seconds |
//! | `CAPTAIL_RAISE_ON_MISSING` | `true` | Whether a missing collection is fatal |
//! | `CAPTAIL_FILTER` | unset | JSON query filter applied to every cursor |
//! | `RUST_LOG` | `info` | Log level |

use anyhow::{Context, Result};
use captail::{
    resolve, stop_channel, ChannelSink, MongoStreamFactory, TailConfig, TailSupervisor,
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    captail::logging::init_logging();

    let config = TailConfig::load().context("invalid configuration")?;
    info!(server = %config.server, collections = ?config.collections, "Starting captaild");

    let client = mongodb::Client::with_uri_str(&config.server)
        .await
        .context("failed to create MongoDB client")?;

    let default_database = client.default_database().map(|db| db.name().to_string());
    let targets = resolve(&config.collections, default_database.as_deref())?;
    info!(targets = targets.len(), "Resolved tailing targets");

    let factory = Arc::new(MongoStreamFactory::new(client, config.parsed_filter()));

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(1024);
    let sink = Arc::new(ChannelSink::new(event_tx));

    // Writer task: drain normalized events to stdout as JSON lines.
    let writer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => error!("Failed to serialize event: {}", e),
            }
        }
    });

    let (stop_handle, stop_signal) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            stop_handle.stop();
        }
    });

    let supervisor = TailSupervisor::new(
        factory,
        sink,
        config.interval_duration(),
        config.raise_on_missing,
    );
    let reports = supervisor.run(targets, stop_signal).await;

    let fatal = reports
        .iter()
        .filter(|r| matches!(r.result, captail::WorkerResult::Fatal(_)))
        .count();

    drop(supervisor);
    writer.await.ok();

    if fatal > 0 && fatal == reports.len() {
        anyhow::bail!("all {} tailing workers failed", fatal);
    }
    info!("captaild stopped");
    Ok(())
}
