//! Admission slots: a fixed pool of permits bounding in-flight work.
//!
//! Acquiring blocks once `capacity` slots are outstanding; this is the only
//! backpressure in the system. A slot returns to the pool when its guard
//! drops, so release happens exactly once however the dispatched task ends.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};

/// Pool of admission permits, filled to capacity at construction.
pub struct SlotPool {
    available_rx: Mutex<mpsc::Receiver<()>>,
    available_tx: mpsc::Sender<()>,
    capacity: usize,
    available_count: Arc<AtomicUsize>,
}

impl SlotPool {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        let (tx, rx) = mpsc::channel(capacity);

        for _ in 0..capacity {
            if tx.try_send(()).is_err() {
                tracing::error!("failed to seed slot pool");
            }
        }

        Self {
            available_rx: Mutex::new(rx),
            available_tx: tx,
            capacity,
            available_count: Arc::new(AtomicUsize::new(capacity)),
        }
    }

    /// Take one slot, waiting while all of them are outstanding.
    pub async fn acquire(&self) -> Slot {
        let mut rx = self.available_rx.lock().await;
        // The pool owns a sender, so the channel can never close here.
        let _ = rx.recv().await;
        self.available_count.fetch_sub(1, Ordering::Release);

        Slot {
            pool_tx: self.available_tx.clone(),
            available_count: Arc::clone(&self.available_count),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.available_count.load(Ordering::Acquire)
    }
}

/// One admission token. Returns to the pool on drop.
#[must_use = "holding the slot is what bounds admission"]
pub struct Slot {
    pool_tx: mpsc::Sender<()>,
    available_count: Arc<AtomicUsize>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        if self.pool_tx.try_send(()).is_ok() {
            self.available_count.fetch_add(1, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn pool(capacity: usize) -> SlotPool {
        SlotPool::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[tokio::test]
    async fn acquire_up_to_capacity() {
        let pool = pool(2);
        assert_eq!(pool.available(), 2);

        let _a = pool.acquire().await;
        let _b = pool.acquire().await;
        assert_eq!(pool.available(), 0);

        // A third acquire must block while both slots are outstanding.
        assert!(pool.acquire().now_or_never().is_none());
    }

    #[tokio::test]
    async fn slot_returns_on_drop() {
        let pool = pool(1);

        {
            let _slot = pool.acquire().await;
            assert_eq!(pool.available(), 0);
        }

        assert_eq!(pool.available(), 1);
        let _slot = pool.acquire().await;
    }

    #[tokio::test]
    async fn blocked_acquire_resumes_after_release() {
        let pool = Arc::new(pool(1));
        let slot = pool.acquire().await;

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                let _slot = pool.acquire().await;
            })
        };

        drop(slot);
        waiter.await.unwrap();
    }
}
