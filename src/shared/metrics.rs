//! Process-wide counters for the worker subsystem.
//!
//! Constructed once at startup and passed down as `Arc<Metrics>` so the core
//! never reaches into a global. Exported only through the periodic summary
//! log for now.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    /// Всего выполнено проверок
    pub checks_total: AtomicU64,
    /// Проверки, завершившиеся ошибкой
    pub checks_failed_total: AtomicU64,
    /// Обнаруженные изменения цены
    pub price_changes_total: AtomicU64,
    /// Отправленные уведомления
    pub notifications_total: AtomicU64,
    /// Удалённые события истории (retention)
    pub events_deleted_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_check(&self, failed: bool) {
        self.checks_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.checks_failed_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_price_change(&self) {
        self.price_changes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self) {
        self.notifications_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events_deleted(&self, count: u64) {
        self.events_deleted_total.fetch_add(count, Ordering::Relaxed);
    }

    /// Snapshot for the summary log.
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            checks_total: self.checks_total.load(Ordering::Relaxed),
            checks_failed_total: self.checks_failed_total.load(Ordering::Relaxed),
            price_changes_total: self.price_changes_total.load(Ordering::Relaxed),
            notifications_total: self.notifications_total.load(Ordering::Relaxed),
            events_deleted_total: self.events_deleted_total.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSummary {
    pub checks_total: u64,
    pub checks_failed_total: u64,
    pub price_changes_total: u64,
    pub notifications_total: u64,
    pub events_deleted_total: u64,
}
