//! Drain loop of the check queue: bounded-concurrency dispatch of per-item
//! price checks.
//!
//! One loop pulls ids; a counting semaphore caps how many checks run at a
//! time. The permit is acquired *before* spawning and moved into the task,
//! so it is released whenever the task ends. A failing check never affects
//! its siblings or the loop.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::notifications::NotificationService;
use crate::application::queue::CheckQueue;
use crate::domain::check::{decide, CheckDecision, FetchOutcome, NotificationKind};
use crate::domain::source::SourceResolver;
use crate::domain::storage::Storage;
use crate::infrastructure::rate_limiter::HostRateLimiter;
use crate::shared::errors::AppError;
use crate::shared::metrics::Metrics;
use crate::shared::types::ItemId;

#[derive(Clone)]
pub struct CheckWorker {
    storage: Arc<dyn Storage>,
    resolver: Arc<SourceResolver>,
    rate_limiter: Arc<HostRateLimiter>,
    notifications: Arc<NotificationService>,
    queue: Arc<CheckQueue>,
    semaphore: Arc<Semaphore>,
    metrics: Arc<Metrics>,
    max_parallel: usize,
}

impl CheckWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn Storage>,
        resolver: Arc<SourceResolver>,
        rate_limiter: Arc<HostRateLimiter>,
        notifications: Arc<NotificationService>,
        queue: Arc<CheckQueue>,
        max_parallel: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            storage,
            resolver,
            rate_limiter,
            notifications,
            queue,
            semaphore: Arc::new(Semaphore::new(max_parallel)),
            metrics,
            max_parallel,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("🚀 Worker started, max parallel checks: {}", self.max_parallel);

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                id = self.queue.dequeue() => {
                    let Some(id) = id else { break };

                    let permit = tokio::select! {
                        _ = shutdown.changed() => break,
                        permit = self.semaphore.clone().acquire_owned() => match permit {
                            Ok(p) => p,
                            Err(_) => break,
                        }
                    };

                    let worker = self.clone();
                    tasks.push(tokio::spawn(async move {
                        let _permit = permit;
                        worker.process_item(id).await;
                    }));

                    tasks.retain(|t| !t.is_finished());
                }
            }
        }

        if !tasks.is_empty() {
            info!("Worker draining {} in-flight checks", tasks.len());
        }
        futures::future::join_all(tasks).await;
        info!("Worker stopped");
    }

    async fn process_item(&self, id: ItemId) {
        if let Err(e) = self.try_process_item(id).await {
            error!("Error processing item {}: {}", id, e);
        }
    }

    async fn try_process_item(&self, id: ItemId) -> Result<(), AppError> {
        let Some(mut item) = self.storage.find_item(id).await? else {
            debug!("Item {} not found, skipping", id);
            return Ok(());
        };

        let Some(source) = self.resolver.resolve(&item.url) else {
            warn!("No source found for item {} URL: {}", id, item.url);
            return Ok(());
        };

        // Lease held across fetch and persistence, like the per-host lock
        // is meant to be: one in-flight interaction with a host at a time.
        let _lease = self.rate_limiter.acquire(&item.url).await;

        let started = Instant::now();
        let outcome = match source.fetch(&item.url).await {
            Ok(snapshot) => FetchOutcome::Success(snapshot),
            Err(e) => {
                warn!("Fetch failed for item {} ({}): {}", id, source.source_key(), e);
                FetchOutcome::Failed {
                    code: e.code().to_string(),
                    message: e.to_string(),
                }
            }
        };
        let failed = matches!(outcome, FetchOutcome::Failed { .. });

        // Read-then-decide-then-write; the same-item race is accepted.
        let now = Utc::now();
        let first_snapshot_today = match &outcome {
            FetchOutcome::Success(snapshot) if snapshot.has_price() => {
                !self.storage.has_snapshot_on(id, now.date_naive()).await?
            }
            _ => false,
        };

        let decision = decide(&item, &outcome, first_snapshot_today, now);
        decision.apply(&mut item, now);

        let CheckDecision { events, notification, .. } = decision;
        self.storage.persist_check(&item, &events).await?;

        if matches!(notification, Some(NotificationKind::PriceChange { .. })) {
            self.metrics.record_price_change();
        }
        if let Some(kind) = notification {
            self.notifications.notify(&item, kind).await;
        }

        self.metrics.record_check(failed);
        debug!(
            "Checked item {} in {:?}: state {:?}, price {:?}",
            id,
            started.elapsed(),
            item.state,
            item.last_known_price_minor
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::{ItemState, PriceEventKind, TrackedItem, User};
    use crate::domain::notify::NotificationSender;
    use crate::domain::source::ProductSource;
    use crate::infrastructure::storage::memory::MemoryStorage;
    use crate::shared::errors::{NotifyError, SourceError};
    use crate::shared::types::{Availability, ProductSnapshot};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeSource {
        price: Option<i64>,
        delay: Duration,
        concurrent: AtomicUsize,
        max_concurrent: AtomicUsize,
        fail: bool,
    }

    impl FakeSource {
        fn with_price(price: Option<i64>) -> Self {
            Self {
                price,
                delay: Duration::ZERO,
                concurrent: AtomicUsize::new(0),
                max_concurrent: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn slow(price: i64, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::with_price(Some(price))
            }
        }
    }

    #[async_trait]
    impl ProductSource for FakeSource {
        fn source_key(&self) -> &'static str {
            "fake"
        }

        fn can_handle(&self, url: &str) -> bool {
            url.starts_with("https://")
        }

        async fn fetch(&self, url: &str) -> Result<ProductSnapshot, SourceError> {
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(SourceError::Blocked);
            }
            Ok(ProductSnapshot {
                canonical_url: url.to_string(),
                title: "Fake".to_string(),
                price_minor: self.price,
                currency: "RUB".to_string(),
                availability: Availability::InStock,
                captured_at: Utc::now(),
            })
        }
    }

    struct NullSender;

    #[async_trait]
    impl NotificationSender for NullSender {
        async fn send(&self, _recipient: i64, _text: &str) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    async fn seed_items(storage: &MemoryStorage, count: i64) {
        storage
            .insert_user(User {
                id: 1,
                telegram_user_id: 1,
                created_at: Utc::now(),
            })
            .await;
        for id in 1..=count {
            // разные хосты, чтобы rate limiter не сериализовал проверки
            let url = format!("https://host{}.example.com/item", id);
            storage.insert_item(TrackedItem::new(id, 1, url, "fake")).await;
        }
    }

    fn build_worker(
        storage: Arc<MemoryStorage>,
        source: Arc<FakeSource>,
        queue: Arc<CheckQueue>,
        max_parallel: usize,
        metrics: Arc<Metrics>,
    ) -> CheckWorker {
        let resolver = Arc::new(SourceResolver::new(vec![source as Arc<dyn ProductSource>]));
        let rate_limiter = Arc::new(HostRateLimiter::new(0, 0));
        let notifications = Arc::new(NotificationService::new(
            storage.clone(),
            Some(Arc::new(NullSender)),
            6,
            metrics.clone(),
        ));
        CheckWorker::new(
            storage,
            resolver,
            rate_limiter,
            notifications,
            queue,
            max_parallel,
            metrics,
        )
    }

    async fn wait_for_checks(metrics: &Metrics, expected: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while metrics.summary().checks_total < expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("checks did not complete in time");
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_max_parallel() {
        let storage = Arc::new(MemoryStorage::new());
        seed_items(&storage, 12).await;
        let source = Arc::new(FakeSource::slow(1000, Duration::from_millis(30)));
        let queue = Arc::new(CheckQueue::new());
        let metrics = Arc::new(Metrics::new());
        let worker = build_worker(storage, source.clone(), queue.clone(), 3, metrics.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run(shutdown_rx).await })
        };

        queue.enqueue_many(1..=12);
        wait_for_checks(&metrics, 12).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(source.max_concurrent.load(Ordering::SeqCst) <= 3);
        assert_eq!(metrics.summary().checks_total, 12);
    }

    #[tokio::test]
    async fn test_check_pipeline_persists_state_and_events() {
        let storage = Arc::new(MemoryStorage::new());
        seed_items(&storage, 1).await;
        // товар уже знает цену 1000, источник вернёт 1100
        let mut item = storage.find_item(1).await.unwrap().unwrap();
        item.last_known_price_minor = Some(1000);
        storage.save_item(&item).await.unwrap();

        let source = Arc::new(FakeSource::with_price(Some(1100)));
        let queue = Arc::new(CheckQueue::new());
        let metrics = Arc::new(Metrics::new());
        let worker = build_worker(storage.clone(), source, queue.clone(), 2, metrics.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run(shutdown_rx).await })
        };

        queue.enqueue(1);
        wait_for_checks(&metrics, 1).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let item = storage.find_item(1).await.unwrap().unwrap();
        assert_eq!(item.state, ItemState::Ok);
        assert_eq!(item.last_known_price_minor, Some(1100));
        assert_eq!(item.title, "Fake");

        let kinds: Vec<PriceEventKind> = storage
            .events_for(1)
            .await
            .iter()
            .map(|e| e.kind)
            .collect();
        // Change + первый Snapshot дня
        assert_eq!(kinds, vec![PriceEventKind::Change, PriceEventKind::Snapshot]);
        assert_eq!(metrics.summary().price_changes_total, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_isolated() {
        let storage = Arc::new(MemoryStorage::new());
        seed_items(&storage, 2).await;
        let source = Arc::new(FakeSource {
            fail: true,
            ..FakeSource::with_price(None)
        });
        let queue = Arc::new(CheckQueue::new());
        let metrics = Arc::new(Metrics::new());
        let worker = build_worker(storage.clone(), source, queue.clone(), 2, metrics.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run(shutdown_rx).await })
        };

        queue.enqueue_many([1, 2]);
        wait_for_checks(&metrics, 2).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let summary = metrics.summary();
        assert_eq!(summary.checks_total, 2);
        assert_eq!(summary.checks_failed_total, 2);

        let item = storage.find_item(1).await.unwrap().unwrap();
        assert_eq!(item.state, ItemState::Failed);
        assert_eq!(item.last_error_code.as_deref(), Some("blocked"));
    }

    #[tokio::test]
    async fn test_unknown_item_and_unresolvable_url_are_skipped() {
        let storage = Arc::new(MemoryStorage::new());
        seed_items(&storage, 1).await;
        // URL, который FakeSource не обслуживает
        let mut item = storage.find_item(1).await.unwrap().unwrap();
        item.url = "ftp://old.example.com/file".to_string();
        storage.save_item(&item).await.unwrap();

        let source = Arc::new(FakeSource::with_price(Some(1000)));
        let queue = Arc::new(CheckQueue::new());
        let metrics = Arc::new(Metrics::new());
        let worker = build_worker(storage.clone(), source, queue.clone(), 2, metrics.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run(shutdown_rx).await })
        };

        queue.enqueue_many([1, 999]);
        // обе записи пропускаются без проверки; дождаться пустой очереди
        tokio::time::timeout(Duration::from_secs(2), async {
            while !queue.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(metrics.summary().checks_total, 0);
    }
}
