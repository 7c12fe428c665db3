//! Отправка уведомлений пользователям с защитой от спама.
//!
//! PriceChange / PriceMissing / PriceRecovered are best-effort: a delivery
//! failure is logged and dropped. CheckError goes through the cooldown gate
//! keyed on (item, error code) before it may fire.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info};

use crate::domain::check::NotificationKind;
use crate::domain::item::TrackedItem;
use crate::domain::notify::NotificationSender;
use crate::domain::storage::Storage;
use crate::infrastructure::parsing;
use crate::shared::metrics::Metrics;

pub struct NotificationService {
    storage: Arc<dyn Storage>,
    sender: Option<Arc<dyn NotificationSender>>,
    error_cooldown: Duration,
    metrics: Arc<Metrics>,
}

impl NotificationService {
    pub fn new(
        storage: Arc<dyn Storage>,
        sender: Option<Arc<dyn NotificationSender>>,
        error_cooldown_hours: i64,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            storage,
            sender,
            error_cooldown: Duration::hours(error_cooldown_hours),
            metrics,
        }
    }

    pub async fn notify(&self, item: &TrackedItem, kind: NotificationKind) {
        let Some(sender) = &self.sender else {
            return;
        };

        if let NotificationKind::CheckError { code, previous_code } = &kind {
            if self.is_on_cooldown(item, code, previous_code.as_deref()) {
                debug!("Skipping error notification for item {} due to cooldown", item.id);
                return;
            }
        }

        let user = match self.storage.find_user(item.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("Owner {} of item {} not found, dropping notification", item.user_id, item.id);
                return;
            }
            Err(e) => {
                error!("Failed to resolve owner of item {}: {}", item.id, e);
                return;
            }
        };

        let is_error = matches!(kind, NotificationKind::CheckError { .. });
        let label = kind_label(&kind);
        let text = self.format_message(item, &kind);

        match sender.send(user.telegram_user_id, &text).await {
            Ok(()) => {
                self.metrics.record_notification();
                info!(
                    "Sent {} notification to {} for item {}",
                    label, user.telegram_user_id, item.id
                );
                if is_error {
                    self.stamp_error_notified(item).await;
                }
            }
            Err(e) => {
                error!("Failed to send {} notification for item {}: {}", label, item.id, e);
            }
        }
    }

    /// Suppress when we already notified about this exact error code within
    /// the cooldown window. A different code on the same item resets it.
    fn is_on_cooldown(&self, item: &TrackedItem, code: &str, previous_code: Option<&str>) -> bool {
        match item.last_error_notified_at {
            Some(notified_at) => {
                previous_code == Some(code) && Utc::now() - notified_at < self.error_cooldown
            }
            None => false,
        }
    }

    async fn stamp_error_notified(&self, item: &TrackedItem) {
        let loaded = match self.storage.find_item(item.id).await {
            Ok(Some(loaded)) => loaded,
            Ok(None) => return,
            Err(e) => {
                error!("Failed to load item {} for cooldown stamp: {}", item.id, e);
                return;
            }
        };

        let mut updated = loaded;
        updated.last_error_notified_at = Some(Utc::now());
        if let Err(e) = self.storage.save_item(&updated).await {
            error!("Failed to stamp error notification time for item {}: {}", item.id, e);
        }
    }

    fn format_message(&self, item: &TrackedItem, kind: &NotificationKind) -> String {
        match kind {
            NotificationKind::PriceChange { old_price, new_price } => {
                let diff = new_price - old_price.unwrap_or(0);
                let emoji = if diff > 0 { "📈" } else { "📉" };
                let sign = if diff > 0 { "+" } else { "" };
                format!(
                    "{} Цена изменилась!\n\n📦 {}\n💰 {} → {}\n📊 Изменение: {}{:.0} ₽\n\n🔗 {}",
                    emoji,
                    item.title,
                    parsing::format_price(*old_price, "RUB"),
                    parsing::format_price(Some(*new_price), "RUB"),
                    sign,
                    diff as f64 / 100.0,
                    item.url
                )
            }
            NotificationKind::PriceMissing => format!(
                "⚠️ Цена недоступна\n\n📦 {}\n\nВозможно, товар закончился или страница изменилась.\n\n🔗 {}",
                item.title, item.url
            ),
            NotificationKind::PriceRecovered { price } => format!(
                "✅ Цена вернулась!\n\n📦 {}\n💰 Цена: {}\n\n🔗 {}",
                item.title,
                parsing::format_price(Some(*price), "RUB"),
                item.url
            ),
            NotificationKind::CheckError { .. } => format!(
                "❌ Ошибка проверки\n\n📦 {}\n\nНе удалось проверить цену. Бот попробует снова позже.\n\n🔗 {}",
                item.title, item.url
            ),
        }
    }
}

fn kind_label(kind: &NotificationKind) -> &'static str {
    match kind {
        NotificationKind::PriceChange { .. } => "price_change",
        NotificationKind::PriceMissing => "price_missing",
        NotificationKind::PriceRecovered { .. } => "price_recovered",
        NotificationKind::CheckError { .. } => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::User;
    use crate::infrastructure::storage::memory::MemoryStorage;
    use crate::shared::errors::NotifyError;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        async fn send(&self, recipient: i64, text: &str) -> Result<(), NotifyError> {
            self.sent.lock().await.push((recipient, text.to_string()));
            Ok(())
        }
    }

    async fn setup(item: TrackedItem) -> (NotificationService, Arc<RecordingSender>, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .insert_user(User {
                id: item.user_id,
                telegram_user_id: 4242,
                created_at: Utc::now(),
            })
            .await;
        storage.insert_item(item).await;

        let sender = Arc::new(RecordingSender::default());
        let service = NotificationService::new(
            storage.clone(),
            Some(sender.clone()),
            6,
            Arc::new(Metrics::new()),
        );
        (service, sender, storage)
    }

    fn failed_item() -> TrackedItem {
        let mut item = TrackedItem::new(1, 1, "https://www.ozon.ru/product/1", "ozon");
        item.title = "Чайник".to_string();
        item
    }

    #[tokio::test]
    async fn test_error_cooldown_suppresses_same_code() {
        let mut item = failed_item();
        item.last_error_notified_at = Some(Utc::now() - Duration::hours(1));
        let (service, sender, _storage) = setup(item.clone()).await;

        service
            .notify(
                &item,
                NotificationKind::CheckError {
                    code: "http".to_string(),
                    previous_code: Some("http".to_string()),
                },
            )
            .await;

        assert!(sender.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_error_with_new_code_resets_cooldown() {
        let mut item = failed_item();
        item.last_error_notified_at = Some(Utc::now() - Duration::hours(1));
        let (service, sender, storage) = setup(item.clone()).await;

        service
            .notify(
                &item,
                NotificationKind::CheckError {
                    code: "blocked".to_string(),
                    previous_code: Some("http".to_string()),
                },
            )
            .await;

        assert_eq!(sender.sent.lock().await.len(), 1);
        // stamp refreshed
        let stored = storage.find_item(item.id).await.unwrap().unwrap();
        assert!(stored.last_error_notified_at.unwrap() > item.last_error_notified_at.unwrap());
    }

    #[tokio::test]
    async fn test_error_after_cooldown_expiry_notifies_again() {
        let mut item = failed_item();
        item.last_error_notified_at = Some(Utc::now() - Duration::hours(7));
        let (service, sender, _storage) = setup(item.clone()).await;

        service
            .notify(
                &item,
                NotificationKind::CheckError {
                    code: "http".to_string(),
                    previous_code: Some("http".to_string()),
                },
            )
            .await;

        assert_eq!(sender.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_price_change_always_sends() {
        let item = failed_item();
        let (service, sender, _storage) = setup(item.clone()).await;

        service
            .notify(
                &item,
                NotificationKind::PriceChange {
                    old_price: Some(100000),
                    new_price: 120000,
                },
            )
            .await;

        let sent = sender.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 4242);
        assert!(sent[0].1.contains("Цена изменилась"));
        assert!(sent[0].1.contains("+200 ₽"));
    }

    #[tokio::test]
    async fn test_unresolvable_owner_drops_silently() {
        let mut item = failed_item();
        item.user_id = 999; // нет такого пользователя
        let (service, sender, _storage) = setup(failed_item()).await;

        service.notify(&item, NotificationKind::PriceMissing).await;

        assert!(sender.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_sender_is_noop() {
        let storage = Arc::new(MemoryStorage::new());
        let service =
            NotificationService::new(storage, None, 6, Arc::new(Metrics::new()));

        // ничего не должно падать
        service.notify(&failed_item(), NotificationKind::PriceMissing).await;
    }
}
