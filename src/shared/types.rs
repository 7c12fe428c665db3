//! Common types used across the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database identifier of a tracked item
pub type ItemId = i64;

/// Database identifier of a user
pub type UserId = i64;

/// Stock availability reported by a product page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Unknown,
    InStock,
    OutOfStock,
}

/// One observation of a product page: what the source saw at `captured_at`.
/// `price_minor` is `None` when the page loaded but no price was found on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub canonical_url: String,
    pub title: String,
    pub price_minor: Option<i64>,
    pub currency: String,
    pub availability: Availability,
    pub captured_at: DateTime<Utc>,
}

impl ProductSnapshot {
    pub fn has_price(&self) -> bool {
        self.price_minor.is_some()
    }
}
