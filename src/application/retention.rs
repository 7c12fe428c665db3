//! Периодическая чистка истории цен.
//!
//! Events strictly older than the retention horizon are deleted in one
//! sweep per interval. A failed sweep is logged and retried on the next
//! tick, never sooner.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::sync::watch;
use tracing::{error, info};

use crate::domain::storage::Storage;
use crate::shared::metrics::Metrics;

pub struct RetentionWorker {
    storage: Arc<dyn Storage>,
    retention: Duration,
    interval: StdDuration,
    metrics: Arc<Metrics>,
}

impl RetentionWorker {
    pub fn new(
        storage: Arc<dyn Storage>,
        retention_days: i64,
        cleanup_interval_hours: u64,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            storage,
            retention: Duration::days(retention_days),
            interval: StdDuration::from_secs(cleanup_interval_hours * 3600),
            metrics,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "🧹 Retention worker started, horizon {} days, interval {:?}",
            self.retention.num_days(),
            self.interval
        );

        loop {
            self.sweep().await;

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            if *shutdown.borrow() {
                break;
            }
        }

        info!("Retention worker stopped");
    }

    pub async fn sweep(&self) {
        let cutoff = Utc::now() - self.retention;
        match self.storage.delete_events_before(cutoff).await {
            Ok(0) => {}
            Ok(deleted) => {
                self.metrics.record_events_deleted(deleted);
                info!("Deleted {} price events older than {}", deleted, cutoff);
            }
            Err(e) => {
                error!("Retention sweep failed: {}", e);
            }
        }
    }
}
