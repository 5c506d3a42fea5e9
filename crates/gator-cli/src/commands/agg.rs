use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use gator_core::{
    feed::FeedFetcher,
    scheduler::SchedulerService,
    storage::Database,
    AppConfig,
};

pub async fn run(db: Database, config: &AppConfig, time_between_reqs: Option<&str>) -> Result<()> {
    let time_between_reqs = time_between_reqs.unwrap_or(config.sync.default_interval.as_str());

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let fetcher = FeedFetcher::new(config)?;
    let scheduler = SchedulerService::new(Arc::new(db), fetcher);

    println!(
        "Collecting feeds every {}. Press Ctrl+C to stop.",
        time_between_reqs
    );

    // Blocks until shutdown
    scheduler.aggregate(time_between_reqs, shutdown_rx).await?;

    println!("Aggregator stopped.");
    Ok(())
}
