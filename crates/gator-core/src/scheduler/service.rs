use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::feed::{Feed, FeedFetcher};
use crate::ingest::{IngestStats, Ingestor};
use crate::interval::{ensure_min_interval, parse_interval};
use crate::shutdown::{is_shutdown, wait_for_shutdown};
use crate::storage::FeedStore;
use crate::{Error, Result};

/// Events emitted by the scheduler after every tick
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A feed was fetched and its items ingested
    TickCompleted {
        feed_id: Uuid,
        feed_name: String,
        stats: IngestStats,
    },
    /// No feed is registered, the tick did nothing
    NoFeeds,
    /// The tick ended early; `feed_id` is set once a feed was selected
    TickFailed {
        feed_id: Option<Uuid>,
        message: String,
    },
}

/// Result of a single tick
enum TickOutcome {
    Idle,
    Collected { feed: Feed, stats: IngestStats },
    Failed { feed_id: Option<Uuid>, error: Error },
}

/// Periodic collector: one feed per tick, stalest first
pub struct SchedulerService {
    store: Arc<dyn FeedStore>,
    fetcher: FeedFetcher,
    ingestor: Ingestor,
    event_tx: Option<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl SchedulerService {
    /// Create a new scheduler service
    pub fn new(store: Arc<dyn FeedStore>, fetcher: FeedFetcher) -> Self {
        Self {
            ingestor: Ingestor::new(store.clone()),
            store,
            fetcher,
            event_tx: None,
        }
    }

    /// Set the event sender for tick notifications
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, event: SchedulerEvent) {
        if let Some(ref tx) = self.event_tx {
            if tx.send(event).is_err() {
                warn!("Failed to send scheduler event: receiver dropped");
            }
        }
    }

    /// Parse `time_between_reqs` (e.g. `"1m"`) and collect feeds until shutdown
    pub async fn aggregate(
        self,
        time_between_reqs: &str,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let interval = parse_interval(time_between_reqs)?;
        self.run(interval, shutdown).await
    }

    /// Collect feeds every `interval` until `true` is published on `shutdown`.
    ///
    /// Fails before the first tick if `interval` is below
    /// [`MIN_INTERVAL`](crate::interval::MIN_INTERVAL).
    pub async fn run(self, interval: Duration, shutdown: watch::Receiver<bool>) -> Result<()> {
        ensure_min_interval(interval)?;

        info!("Collecting feeds every {:?}", interval);
        self.run_loop(interval, shutdown).await;
        info!("Scheduler stopped");

        Ok(())
    }

    async fn run_loop(&self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        if is_shutdown(&shutdown) {
            return;
        }

        // First tick completes immediately
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("Scheduler received shutdown signal");
                    break;
                }

                _ = ticker.tick() => {
                    let outcome = self.tick(&shutdown).await;
                    self.report(outcome);
                }
            }
        }
    }

    fn report(&self, outcome: TickOutcome) {
        match outcome {
            TickOutcome::Idle => {
                info!("No feeds to collect");
                self.send_event(SchedulerEvent::NoFeeds);
            }
            TickOutcome::Collected { feed, stats } => {
                info!(
                    "Collected '{}': {} new, {} already stored, {} failed",
                    feed.name, stats.created, stats.duplicates, stats.failed
                );
                self.send_event(SchedulerEvent::TickCompleted {
                    feed_id: feed.id,
                    feed_name: feed.name,
                    stats,
                });
            }
            TickOutcome::Failed { feed_id, error: Error::Cancelled } => {
                debug!("Tick cancelled by shutdown");
                self.send_event(SchedulerEvent::TickFailed {
                    feed_id,
                    message: Error::Cancelled.to_string(),
                });
            }
            TickOutcome::Failed { feed_id, error } => {
                match feed_id {
                    Some(id) => error!("Collecting feed {} failed: {}", id, error),
                    None => error!("Selecting the next feed failed: {}", error),
                }
                self.send_event(SchedulerEvent::TickFailed {
                    feed_id,
                    message: error.to_string(),
                });
            }
        }
    }

    /// Select, claim, fetch and ingest a single feed
    async fn tick(&self, shutdown: &watch::Receiver<bool>) -> TickOutcome {
        let feed = match self.store.next_feed_to_fetch().await {
            Ok(Some(feed)) => feed,
            Ok(None) => return TickOutcome::Idle,
            Err(error) => return TickOutcome::Failed { feed_id: None, error },
        };
        debug!("Selected feed '{}' ({})", feed.name, feed.url);

        if let Err(error) = self.store.mark_feed_fetched(feed.id).await {
            return TickOutcome::Failed {
                feed_id: Some(feed.id),
                error,
            };
        }

        let document = match self.fetcher.fetch(&feed.url, shutdown.clone()).await {
            Ok(document) => document,
            Err(error) => {
                return TickOutcome::Failed {
                    feed_id: Some(feed.id),
                    error,
                }
            }
        };
        debug!("Fetched {} items from '{}'", document.items.len(), feed.name);

        let stats = self.ingestor.ingest(feed.id, &document, shutdown).await;
        TickOutcome::Collected { feed, stats }
    }
}
