//! Per-worker exclusion locks.
//!
//! Each worker owns one async mutex and holds it for the whole dispatch of a
//! single update. Registry mutations take every lock, always in ascending
//! index order, so they never observe a half-dispatched update and two
//! concurrent mutators cannot deadlock.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};

type WorkerLock = Arc<Mutex<()>>;

/// The set of worker exclusion locks.
#[derive(Debug, Default)]
pub(crate) struct LockBarrier {
    locks: RwLock<Vec<WorkerLock>>,
}

impl LockBarrier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replaces the lock set with `count` fresh locks and returns them in
    /// index order.
    pub(crate) fn install(&self, count: usize) -> Vec<WorkerLock> {
        let locks: Vec<WorkerLock> = (0..count).map(|_| Arc::new(Mutex::new(()))).collect();
        *self.locks.write() = locks.clone();
        locks
    }

    /// Drops every lock; mutators then proceed without waiting.
    pub(crate) fn reset(&self) {
        self.locks.write().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.locks.read().len()
    }

    /// Acquires every lock in ascending index order.
    ///
    /// All locks are released together when the guard is dropped.
    pub(crate) async fn acquire_all(&self) -> BarrierGuard {
        let locks = self.locks.read().clone();
        let mut guards = Vec::with_capacity(locks.len());
        for lock in locks {
            guards.push(lock.lock_owned().await);
        }
        BarrierGuard { _guards: guards }
    }
}

/// Proof that every worker is paused between updates.
#[must_use = "the barrier is released as soon as the guard is dropped"]
pub(crate) struct BarrierGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_waits_for_busy_worker() {
        let barrier = Arc::new(LockBarrier::new());
        let locks = barrier.install(3);
        assert_eq!(barrier.len(), 3);

        let busy = Arc::clone(&locks[1]).lock_owned().await;
        let waiter = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                let _guard = barrier.acquire_all().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        // lock 0 is already held by the waiter while it waits on lock 1
        assert!(locks[0].try_lock().is_err());

        drop(busy);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(locks[0].try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_empty_barrier_is_immediate() {
        let barrier = LockBarrier::new();
        barrier.install(2);
        barrier.reset();
        assert_eq!(barrier.len(), 0);
        let _guard = barrier.acquire_all().await;
    }
}
