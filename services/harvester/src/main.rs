//! METAR harvester service.
//!
//! Harvests METARs from NOAA's hourly cycle files with:
//! - 24 cycle workers polling the FTP archive
//! - Deduplication against the previous snapshot of each cycle
//! - Batched feeding into the data API with selective retry
//! - Queue and dedup state persisted across restarts
//! - HTTP status API and Prometheus metrics for monitoring

mod config;
mod server;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::ApiClient;
use clap::Parser;
use ingestion::{CycleWorkerPool, Feeder, FtpConnector};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::Args;
use server::ServerState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present; it takes precedence over
    // variables already set
    config::load_env_file(Path::new(".env"));

    let args = Args::parse();

    // Initialize tracing; RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);
    if args.is_production() {
        tracing::subscriber::set_global_default(builder.with_thread_ids(true).json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.pretty().finish())?;
    }

    info!("Starting METAR harvester");
    debug!(config = ?args, "Loaded configuration");
    args.validate().context("invalid configuration")?;

    // Check the API key before touching any state
    let client = ApiClient::new(&args.api_address, &args.api_key, args.network_timeout())
        .context("could not create API client")?;
    let key_info = client
        .key_info()
        .await
        .context("could not retrieve API key information")?;
    key_info
        .validate(args.feed_metars)
        .context("API key cannot be used for harvesting")?;
    info!(address = %client.address(), "API key validated");

    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("could not install Prometheus recorder")?;

    // The feeder starts first so no forwarded report arrives before its
    // queue backup is restored.
    info!("Starting the METAR feeder");
    let feeder = Arc::new(Feeder::new(Arc::new(client), args.feeder_config()));
    feeder
        .start()
        .await
        .context("could not start the METAR feeder")?;

    let mut pool = CycleWorkerPool::new(
        args.worker_config(),
        Arc::new(FtpConnector::new(args.ftp_config())),
        feeder.clone(),
    );
    let running = pool.start().await;
    if running < metar_common::CYCLE_COUNT {
        warn!(
            running,
            "Not all cycle workers started; restart the harvester to retry"
        );
    }

    if !args.no_status_server {
        let state = Arc::new(ServerState {
            feeder: feeder.clone(),
            cycles: pool.status_board(),
            prometheus,
        });
        let status_port = args.status_port;
        tokio::spawn(async move {
            if let Err(e) = server::run_server(state, status_port).await {
                error!(error = %e, "Status server failed");
            }
        });
    }

    tokio::signal::ctrl_c()
        .await
        .context("could not listen for the shutdown signal")?;
    info!("Received shutdown signal");

    // Workers stop first so nothing is enqueued after the queue is backed up.
    pool.stop().await;
    feeder
        .stop()
        .await
        .context("could not back up the feeder queue")?;

    info!("METAR harvester stopped");
    Ok(())
}
