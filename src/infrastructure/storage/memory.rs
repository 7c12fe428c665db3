//! Хранилище в памяти. Одна RwLock-структура на всё состояние, так что
//! результат проверки (товар + события) пишется атомарно.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::item::{NewPriceEvent, PriceEvent, PriceEventKind, TrackedItem, User};
use crate::domain::storage::Storage;
use crate::shared::errors::StorageError;
use crate::shared::types::{ItemId, UserId};

#[derive(Default)]
struct Inner {
    items: HashMap<ItemId, TrackedItem>,
    events: Vec<PriceEvent>,
    users: HashMap<UserId, User>,
    next_event_id: i64,
}

#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_item(&self, item: TrackedItem) {
        let mut inner = self.inner.write().unwrap();
        inner.items.insert(item.id, item);
    }

    pub async fn insert_user(&self, user: User) {
        let mut inner = self.inner.write().unwrap();
        inner.users.insert(user.id, user);
    }

    /// История одного товара в порядке записи.
    pub async fn events_for(&self, id: ItemId) -> Vec<PriceEvent> {
        let inner = self.inner.read().unwrap();
        inner
            .events
            .iter()
            .filter(|e| e.item_id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn list_item_ids(&self) -> Result<Vec<ItemId>, StorageError> {
        let inner = self.inner.read().unwrap();
        let mut ids: Vec<ItemId> = inner.items.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<TrackedItem>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.items.get(&id).cloned())
    }

    async fn save_item(&self, item: &TrackedItem) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap();
        inner.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn persist_check(
        &self,
        item: &TrackedItem,
        events: &[NewPriceEvent],
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap();
        inner.items.insert(item.id, item.clone());
        for event in events {
            inner.next_event_id += 1;
            let id = inner.next_event_id;
            inner.events.push(PriceEvent {
                id,
                item_id: item.id,
                timestamp: event.timestamp,
                kind: event.kind,
                price_minor: event.price_minor,
                note: event.note.clone(),
            });
        }
        Ok(())
    }

    async fn has_snapshot_on(&self, id: ItemId, date: NaiveDate) -> Result<bool, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.events.iter().any(|e| {
            e.item_id == id
                && e.kind == PriceEventKind::Snapshot
                && e.timestamp.date_naive() == date
        }))
    }

    async fn delete_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut inner = self.inner.write().unwrap();
        let before = inner.events.len();
        inner.events.retain(|e| e.timestamp >= cutoff);
        Ok((before - inner.events.len()) as u64)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.users.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(id: ItemId) -> TrackedItem {
        TrackedItem::new(id, 1, format!("https://www.ozon.ru/product/{}", id), "ozon")
    }

    #[tokio::test]
    async fn test_persist_check_writes_item_and_events_together() {
        let storage = MemoryStorage::new();
        let mut tracked = item(1);
        tracked.last_known_price_minor = Some(5000);

        let now = Utc::now();
        let events = vec![
            NewPriceEvent::new(PriceEventKind::Change, Some(5000), now),
            NewPriceEvent::new(PriceEventKind::Snapshot, Some(5000), now),
        ];
        storage.persist_check(&tracked, &events).await.unwrap();

        let stored = storage.find_item(1).await.unwrap().unwrap();
        assert_eq!(stored.last_known_price_minor, Some(5000));

        let history = storage.events_for(1).await;
        assert_eq!(history.len(), 2);
        // ids монотонно растут
        assert!(history[0].id < history[1].id);
    }

    #[tokio::test]
    async fn test_has_snapshot_on_matches_utc_date_and_kind() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        let events = vec![
            NewPriceEvent::new(PriceEventKind::Change, Some(100), now),
            NewPriceEvent::new(PriceEventKind::Snapshot, Some(100), now - Duration::days(1)),
        ];
        storage.persist_check(&item(1), &events).await.unwrap();

        // сегодня есть только Change
        assert!(!storage.has_snapshot_on(1, now.date_naive()).await.unwrap());
        assert!(storage
            .has_snapshot_on(1, (now - Duration::days(1)).date_naive())
            .await
            .unwrap());
        // другой товар не учитывается
        assert!(!storage
            .has_snapshot_on(2, (now - Duration::days(1)).date_naive())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_delete_events_before_is_strictly_older() {
        let storage = MemoryStorage::new();
        let cutoff = Utc::now();
        let events = vec![
            NewPriceEvent::new(PriceEventKind::Snapshot, Some(1), cutoff - Duration::hours(1)),
            NewPriceEvent::new(PriceEventKind::Snapshot, Some(2), cutoff),
            NewPriceEvent::new(PriceEventKind::Snapshot, Some(3), cutoff + Duration::hours(1)),
        ];
        storage.persist_check(&item(1), &events).await.unwrap();

        let deleted = storage.delete_events_before(cutoff).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = storage.events_for(1).await;
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|e| e.timestamp >= cutoff));
    }

    #[tokio::test]
    async fn test_list_item_ids_sorted() {
        let storage = MemoryStorage::new();
        for id in [3, 1, 2] {
            storage.insert_item(item(id)).await;
        }
        assert_eq!(storage.list_item_ids().await.unwrap(), vec![1, 2, 3]);
    }
}
