//! Per-transaction mutual exclusion.
//!
//! Every reconciliation or refund cycle for a transaction must run serialized against every other cycle for the
//! same transaction, while unrelated transactions proceed in parallel. [`TransactionLocks`] keeps one async mutex
//! per `tran_id`; the guard is held across the outbound gateway call and the state transition, making the whole
//! cycle one critical section.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::OwnedMutexGuard;

use crate::db_types::TransactionId;

#[derive(Clone, Default)]
pub struct TransactionLocks {
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl TransactionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `tran_id`, waiting if another cycle for the same transaction holds it.
    pub async fn acquire(&self, tran_id: &TransactionId) -> OwnedMutexGuard<()> {
        let lock = {
            #[allow(clippy::expect_used)]
            let mut map = self.locks.lock().expect("transaction lock registry poisoned");
            // A strong count of 1 means nobody holds or waits on the mutex; evicting such entries keeps the
            // registry proportional to in-flight transactions, not all transactions ever seen.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(tran_id.as_str().to_string()).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))))
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;

    #[tokio::test]
    async fn same_transaction_is_serialized() {
        let locks = TransactionLocks::new();
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let in_section = in_section.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&TransactionId::from("T1")).await;
                let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn released_locks_are_evicted_from_the_registry() {
        let locks = TransactionLocks::new();
        for i in 0..100 {
            let _guard = locks.acquire(&TransactionId::from(format!("T{i}"))).await;
        }
        // Each acquire sweeps out the entries whose cycles have finished.
        let _guard = locks.acquire(&TransactionId::from("T100")).await;
        assert_eq!(locks.locks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn different_transactions_run_in_parallel() {
        let locks = TransactionLocks::new();
        let guard_a = locks.acquire(&TransactionId::from("A")).await;
        // Must not deadlock while A is held.
        let guard_b =
            tokio::time::timeout(Duration::from_millis(100), locks.acquire(&TransactionId::from("B"))).await;
        assert!(guard_b.is_ok());
        drop(guard_a);
    }
}
