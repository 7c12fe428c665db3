// src/app.rs
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::application::notifications::NotificationService;
use crate::application::queue::CheckQueue;
use crate::application::retention::RetentionWorker;
use crate::application::scheduler::CheckScheduler;
use crate::application::worker::CheckWorker;
use crate::config::Config;
use crate::domain::item::{TrackedItem, User};
use crate::domain::notify::NotificationSender;
use crate::domain::source::{ProductSource, SourceResolver};
use crate::domain::storage::Storage;
use crate::infrastructure::rate_limiter::HostRateLimiter;
use crate::infrastructure::sources::ozon::OzonSource;
use crate::infrastructure::storage::memory::MemoryStorage;
use crate::infrastructure::telegram::TelegramSender;
use crate::shared::metrics::Metrics;

pub async fn run(config: Config) -> Result<()> {
    info!("🤖 PriceWatcher starting");

    let resolver = Arc::new(SourceResolver::new(vec![
        Arc::new(OzonSource::new()) as Arc<dyn ProductSource>,
    ]));

    let storage = Arc::new(MemoryStorage::new());
    seed_watchlist(&storage, &resolver, &config).await;

    let sender: Option<Arc<dyn NotificationSender>> = if config.notifications.bot_token.is_empty() {
        warn!("Bot token is empty, notifications are disabled");
        None
    } else {
        Some(Arc::new(TelegramSender::new(&config.notifications.bot_token)?))
    };

    let metrics = Arc::new(Metrics::new());
    let queue = Arc::new(CheckQueue::new());
    let rate_limiter = Arc::new(HostRateLimiter::new(
        config.worker.host_min_delay_ms,
        config.worker.host_jitter_ms,
    ));
    let notifications = Arc::new(NotificationService::new(
        storage.clone(),
        sender,
        config.notifications.error_cooldown_hours,
        metrics.clone(),
    ));

    let scheduler = Arc::new(CheckScheduler::new(
        &config.worker.check_cron,
        &config.worker.timezone,
        storage.clone(),
        queue.clone(),
    )?);
    let worker = Arc::new(CheckWorker::new(
        storage.clone(),
        resolver,
        rate_limiter,
        notifications,
        queue.clone(),
        config.worker.max_parallel,
        metrics.clone(),
    ));
    let retention = Arc::new(RetentionWorker::new(
        storage.clone(),
        config.retention.retention_days,
        config.retention.cleanup_interval_hours,
        metrics.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_task = {
        let scheduler = scheduler.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };
    let worker_task = {
        let worker = worker.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { worker.run(shutdown).await })
    };
    let retention_task = {
        let retention = retention.clone();
        let shutdown = shutdown_rx;
        tokio::spawn(async move { retention.run(shutdown).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = tokio::join!(scheduler_task, worker_task, retention_task);

    let summary = metrics.summary();
    info!(
        "Session summary: {} checks ({} failed), {} price changes, {} notifications",
        summary.checks_total,
        summary.checks_failed_total,
        summary.price_changes_total,
        summary.notifications_total
    );
    info!("👋 PriceWatcher stopped");

    Ok(())
}

/// Наполняет хранилище товарами из конфига.
async fn seed_watchlist(storage: &Arc<MemoryStorage>, resolver: &SourceResolver, config: &Config) {
    storage
        .insert_user(User {
            id: 1,
            telegram_user_id: config.notifications.chat_id,
            created_at: chrono::Utc::now(),
        })
        .await;

    let mut next_id = 1;
    for entry in &config.items {
        let url = resolver.normalize_url(&entry.url);
        let Some(source) = resolver.resolve(&url) else {
            warn!("No source can handle {}, skipping", entry.url);
            continue;
        };

        let mut item = TrackedItem::new(next_id, 1, url, source.source_key());
        item.title = entry.title.clone();
        storage.insert_item(item).await;
        next_id += 1;
    }

    if let Ok(ids) = storage.list_item_ids().await {
        info!("Watching {} items", ids.len());
    }
}
