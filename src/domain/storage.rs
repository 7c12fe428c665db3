//! Persistence contract consumed by the worker subsystem.
//!
//! The durable engine behind it (its schema, migrations, transactions) is a
//! collaborator; the core only relies on this read/write surface.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::item::{NewPriceEvent, TrackedItem, User};
use crate::shared::errors::StorageError;
use crate::shared::types::{ItemId, UserId};

#[async_trait]
pub trait Storage: Send + Sync {
    /// Ids of every tracked item, for a full scheduled batch.
    async fn list_item_ids(&self) -> Result<Vec<ItemId>, StorageError>;

    async fn find_item(&self, id: ItemId) -> Result<Option<TrackedItem>, StorageError>;

    async fn save_item(&self, item: &TrackedItem) -> Result<(), StorageError>;

    /// Persist the result of one check - the item's new fields plus its new
    /// history events - as a single atomic write. A check is never left
    /// half-applied.
    async fn persist_check(
        &self,
        item: &TrackedItem,
        events: &[NewPriceEvent],
    ) -> Result<(), StorageError>;

    /// Whether a Snapshot event already exists for the item on the given
    /// UTC calendar date.
    async fn has_snapshot_on(&self, id: ItemId, date: NaiveDate) -> Result<bool, StorageError>;

    /// Bulk-delete events strictly older than the cutoff. Returns the count.
    async fn delete_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StorageError>;
}
