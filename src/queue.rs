//! Fixed-capacity FIFO queues that evict the oldest entry on overflow.
//!
//! Every hand-off between components goes through one of these. Producers
//! never block: a full queue drops its oldest item to make room, favouring
//! fresh data over completeness. Consumers await [`DropOldestQueue::pop`],
//! which parks on a [`Notify`] instead of polling.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

/// Bounded multi-producer queue with drop-oldest overflow.
///
/// Intended for a single consumer; with several consumers every item is
/// still delivered exactly once, but wakeups may be spread unevenly.
pub struct DropOldestQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    notify: Notify,
    evicted: AtomicU64,
}

impl<T> DropOldestQueue<T> {
    /// Creates a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            evicted: AtomicU64::new(0),
        }
    }

    /// Appends `item`, evicting the oldest entry if the queue is full.
    ///
    /// Returns `true` if an entry was evicted to make room.
    pub fn push(&self, item: T) -> bool {
        let evicted = {
            let mut items = self.items.lock();
            let evicted = if items.len() >= self.capacity {
                items.pop_front();
                true
            } else {
                false
            };
            items.push_back(item);
            evicted
        };

        if evicted {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
        evicted
    }

    /// Removes the oldest item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Waits until an item is available and removes it.
    ///
    /// Cancel-safe: dropping the future never loses an item.
    pub async fn pop(&self) -> T {
        loop {
            if let Some(item) = self.try_pop() {
                return item;
            }
            // notify_one stores a permit when nobody is waiting, so a push
            // between try_pop and this await is not missed.
            self.notify.notified().await;
        }
    }

    /// Removes and returns everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Maximum number of items held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of items dropped due to overflow since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl<T> std::fmt::Debug for DropOldestQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropOldestQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("evicted", &self.evicted())
            .finish()
    }
}
