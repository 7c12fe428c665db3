//! Tracked items, their price history, and owners

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::types::{ItemId, UserId};

/// Lifecycle state of a tracked item. The item keeps being rechecked from
/// any of these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemState {
    Ok,
    PriceMissing,
    Failed,
}

/// Товар, за ценой которого следит бот
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub id: ItemId,
    pub user_id: UserId,
    pub url: String,
    pub source_key: String,
    pub title: String,
    pub state: ItemState,
    pub last_known_price_minor: Option<i64>,
    pub last_check_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_code: Option<String>,
    pub last_error_notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackedItem {
    pub fn new(id: ItemId, user_id: UserId, url: impl Into<String>, source_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            url: url.into(),
            source_key: source_key.into(),
            title: String::new(),
            state: ItemState::Ok,
            last_known_price_minor: None,
            last_check_at: None,
            last_error: None,
            last_error_code: None,
            last_error_notified_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Kind of a history event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceEventKind {
    Change,
    Snapshot,
    Missing,
    Recovered,
    Failed,
}

/// Append-only history fact. Deleted only by the retention worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEvent {
    pub id: i64,
    pub item_id: ItemId,
    pub timestamp: DateTime<Utc>,
    pub kind: PriceEventKind,
    pub price_minor: Option<i64>,
    pub note: Option<String>,
}

/// Unsaved history event produced by the state machine; storage assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPriceEvent {
    pub kind: PriceEventKind,
    pub price_minor: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub note: Option<String>,
}

impl NewPriceEvent {
    pub fn new(kind: PriceEventKind, price_minor: Option<i64>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            price_minor,
            timestamp,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Owner of tracked items; `telegram_user_id` is the notification recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub telegram_user_id: i64,
    pub created_at: DateTime<Utc>,
}
