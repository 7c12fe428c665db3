//! Check state machine - the single place where a fetch outcome is turned
//! into a state transition, history events and a notification request.
//!
//! Both the scheduled worker and the interactive "check now" path go through
//! [`decide`]; neither is allowed to re-implement these rules inline. The
//! function is pure: no storage, no clock, no I/O.

use chrono::{DateTime, Utc};

use crate::domain::item::{ItemState, NewPriceEvent, PriceEventKind, TrackedItem};
use crate::shared::types::ProductSnapshot;

/// Three-way result of fetching one item: a snapshot (price present or
/// absent) or a failure with a stable error code.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(ProductSnapshot),
    Failed { code: String, message: String },
}

/// Notification requested by the state machine. Dispatch (and the error
/// cooldown) is the NotificationService's business, not ours.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationKind {
    PriceChange { old_price: Option<i64>, new_price: i64 },
    PriceMissing,
    PriceRecovered { price: i64 },
    /// `previous_code` is the item's error code from *before* this check,
    /// so the cooldown can key on (item, code).
    CheckError { code: String, previous_code: Option<String> },
}

/// Everything one check decided: the field updates to apply to the item,
/// the history events to append, and the notification to fire (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct CheckDecision {
    pub new_state: ItemState,
    pub new_title: Option<String>,
    pub new_price: Option<i64>,
    pub last_check_at: DateTime<Utc>,
    /// `Some((code, message))` on failure; `None` clears both error fields.
    pub error: Option<(String, String)>,
    pub events: Vec<NewPriceEvent>,
    pub notification: Option<NotificationKind>,
}

impl CheckDecision {
    /// Apply the decided field updates to the item. Event persistence and
    /// notification dispatch stay with the caller.
    pub fn apply(&self, item: &mut TrackedItem, now: DateTime<Utc>) {
        item.state = self.new_state;
        if let Some(title) = &self.new_title {
            item.title = title.clone();
        }
        if let Some(price) = self.new_price {
            item.last_known_price_minor = Some(price);
        }
        item.last_check_at = Some(self.last_check_at);
        match &self.error {
            Some((code, message)) => {
                item.last_error = Some(message.clone());
                item.last_error_code = Some(code.clone());
            }
            None => {
                item.last_error = None;
                item.last_error_code = None;
            }
        }
        item.updated_at = now;
    }
}

/// Compute the transition for one fetch outcome.
///
/// `first_snapshot_today` must be evaluated against history *before* the
/// decision is persisted (read-then-decide-then-write). Two concurrent
/// checks of the same item can race on it; the queue does not dedup, that
/// race is accepted.
pub fn decide(
    item: &TrackedItem,
    outcome: &FetchOutcome,
    first_snapshot_today: bool,
    now: DateTime<Utc>,
) -> CheckDecision {
    match outcome {
        FetchOutcome::Failed { code, message } => CheckDecision {
            new_state: ItemState::Failed,
            new_title: None,
            new_price: None,
            last_check_at: now,
            error: Some((code.clone(), message.clone())),
            events: vec![
                NewPriceEvent::new(PriceEventKind::Failed, None, now).with_note(message.clone()),
            ],
            notification: Some(NotificationKind::CheckError {
                code: code.clone(),
                previous_code: item.last_error_code.clone(),
            }),
        },
        FetchOutcome::Success(snapshot) => match snapshot.price_minor {
            Some(price) => decide_price_present(item, snapshot, price, first_snapshot_today),
            None => decide_price_absent(item, snapshot),
        },
    }
}

fn decide_price_present(
    item: &TrackedItem,
    snapshot: &ProductSnapshot,
    price: i64,
    first_snapshot_today: bool,
) -> CheckDecision {
    let mut events = Vec::new();
    let mut notification = None;

    if item.state == ItemState::PriceMissing {
        // Цена вернулась
        events.push(NewPriceEvent::new(
            PriceEventKind::Recovered,
            Some(price),
            snapshot.captured_at,
        ));
        notification = Some(NotificationKind::PriceRecovered { price });
    } else if let Some(old_price) = item.last_known_price_minor {
        if old_price != price {
            events.push(NewPriceEvent::new(
                PriceEventKind::Change,
                Some(price),
                snapshot.captured_at,
            ));
            notification = Some(NotificationKind::PriceChange {
                old_price: Some(old_price),
                new_price: price,
            });
        }
    }

    // Daily snapshot: first successful check of the UTC calendar day
    if first_snapshot_today {
        events.push(NewPriceEvent::new(
            PriceEventKind::Snapshot,
            Some(price),
            snapshot.captured_at,
        ));
    }

    CheckDecision {
        new_state: ItemState::Ok,
        new_title: Some(snapshot.title.clone()),
        new_price: Some(price),
        last_check_at: snapshot.captured_at,
        error: None,
        events,
        notification,
    }
}

fn decide_price_absent(item: &TrackedItem, snapshot: &ProductSnapshot) -> CheckDecision {
    // Only an item that actually had a price announces its disappearance;
    // a Failed or already-missing item transitions silently.
    let price_just_vanished =
        item.state == ItemState::Ok && item.last_known_price_minor.is_some();

    CheckDecision {
        new_state: ItemState::PriceMissing,
        new_title: Some(snapshot.title.clone()),
        new_price: None,
        last_check_at: snapshot.captured_at,
        error: None,
        events: if price_just_vanished {
            vec![NewPriceEvent::new(
                PriceEventKind::Missing,
                None,
                snapshot.captured_at,
            )]
        } else {
            Vec::new()
        },
        notification: price_just_vanished.then_some(NotificationKind::PriceMissing),
    }
}
