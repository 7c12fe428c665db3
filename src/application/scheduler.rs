//! Cron-driven trigger: on every fire, enqueue the complete set of tracked
//! items for a price check.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::application::queue::CheckQueue;
use crate::domain::storage::Storage;
use crate::shared::errors::AppError;

/// Backoff when no next occurrence can be computed.
const NO_OCCURRENCE_BACKOFF: Duration = Duration::from_secs(60);

pub struct CheckScheduler {
    schedule: Schedule,
    timezone: Tz,
    storage: Arc<dyn Storage>,
    queue: Arc<CheckQueue>,
}

impl CheckScheduler {
    pub fn new(
        cron_expr: &str,
        timezone: &str,
        storage: Arc<dyn Storage>,
        queue: Arc<CheckQueue>,
    ) -> Result<Self, AppError> {
        let schedule = parse_cron(cron_expr)
            .map_err(|e| AppError::ConfigError(format!("invalid cron expression '{}': {}", cron_expr, e)))?;
        let timezone: Tz = timezone
            .parse()
            .map_err(|e| AppError::ConfigError(format!("invalid timezone '{}': {}", timezone, e)))?;

        Ok(Self {
            schedule,
            timezone,
            storage,
            queue,
        })
    }

    /// Next fire time strictly after `now`, in the configured timezone.
    pub fn next_occurrence(&self, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
        self.schedule.after(&now.with_timezone(&self.timezone)).next()
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "⏰ Scheduler started. Timezone: {}, next check at {:?}",
            self.timezone,
            self.next_occurrence(Utc::now())
        );

        loop {
            // Always recompute from the current time, never from the previous
            // target: a missed tick (paused process) self-corrects.
            let now = Utc::now();
            let next = self.next_occurrence(now);

            let delay = match next {
                Some(next) => {
                    let delay = (next.with_timezone(&Utc) - now)
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    info!("Next scheduled check at {} (in {:?})", next, delay);
                    delay
                }
                None => {
                    warn!("No next occurrence found for cron expression, retrying in {:?}", NO_OCCURRENCE_BACKOFF);
                    NO_OCCURRENCE_BACKOFF
                }
            };

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            if *shutdown.borrow() {
                break;
            }

            if next.is_some() {
                self.enqueue_all_items().await;
            }
        }

        info!("Scheduler stopped");
    }

    async fn enqueue_all_items(&self) {
        match self.storage.list_item_ids().await {
            Ok(ids) => {
                info!("Enqueueing {} items for scheduled check", ids.len());
                self.queue.enqueue_many(ids);
            }
            Err(e) => {
                error!("Error enqueueing items: {}", e);
            }
        }
    }
}

/// Parse a cron expression, auto-prepending "0 " for 5-field expressions.
/// The `cron` crate wants 6 fields (sec min hr dom mon dow); configs are
/// usually written as classic 5-field cron.
fn parse_cron(expr: &str) -> Result<Schedule, cron::error::Error> {
    let parts: Vec<&str> = expr.split_whitespace().collect();
    if parts.len() == 5 {
        Schedule::from_str(&format!("0 {}", expr))
    } else {
        Schedule::from_str(expr)
    }
}
