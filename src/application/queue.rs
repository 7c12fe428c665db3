//! Очередь идентификаторов товаров на проверку.
//!
//! Unbounded, no dedup: a scheduled batch overlapping an in-flight one puts
//! the same id in twice, and both get checked. Backpressure lives on the
//! consumer side (the worker's semaphore), not here.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use crate::shared::types::ItemId;

pub struct CheckQueue {
    tx: UnboundedSender<ItemId>,
    rx: Mutex<UnboundedReceiver<ItemId>>,
    depth: AtomicUsize,
}

impl CheckQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            depth: AtomicUsize::new(0),
        }
    }

    pub fn enqueue(&self, id: ItemId) {
        if self.tx.send(id).is_ok() {
            self.depth.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn enqueue_many<I: IntoIterator<Item = ItemId>>(&self, ids: I) {
        for id in ids {
            self.enqueue(id);
        }
    }

    /// Wait for the next id. `None` means the queue was closed.
    pub async fn dequeue(&self) -> Option<ItemId> {
        let id = self.rx.lock().await.recv().await;
        if id.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        id
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CheckQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = CheckQueue::new();
        queue.enqueue_many([1, 2, 3]);

        assert_eq!(queue.dequeue().await, Some(1));
        assert_eq!(queue.dequeue().await, Some(2));
        assert_eq!(queue.dequeue().await, Some(3));
    }

    #[tokio::test]
    async fn test_no_dedup() {
        let queue = CheckQueue::new();
        queue.enqueue(7);
        queue.enqueue(7);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue().await, Some(7));
        assert_eq!(queue.dequeue().await, Some(7));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_depth_tracks_enqueue_dequeue() {
        let queue = CheckQueue::new();
        assert_eq!(queue.len(), 0);
        queue.enqueue_many([10, 20]);
        assert_eq!(queue.len(), 2);
        queue.dequeue().await;
        assert_eq!(queue.len(), 1);
    }
}
