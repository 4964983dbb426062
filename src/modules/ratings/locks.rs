use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tourdesk_core::DocumentId;

/// One async mutex per parent id. Entries exist only while some task holds
/// or awaits them.
#[derive(Debug, Default)]
pub struct ParentLocks {
    entries: Mutex<HashMap<DocumentId, Arc<AsyncMutex<()>>>>,
}

pub struct ParentLockGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    _claim: Claim<'a>,
}

/// A reference to a table entry. Dropping it, whether the lock was ever
/// granted or the waiting future was cancelled, prunes the entry once no
/// other claim remains.
struct Claim<'a> {
    table: &'a ParentLocks,
    key: DocumentId,
    entry: Option<Arc<AsyncMutex<()>>>,
}

impl ParentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: DocumentId) -> ParentLockGuard<'_> {
        let entry = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .clone();
        let claim = Claim {
            table: self,
            key,
            entry: Some(entry.clone()),
        };

        ParentLockGuard {
            guard: Some(entry.lock_owned().await),
            _claim: claim,
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ParentLockGuard<'_> {
    fn drop(&mut self) {
        // Release before the claim prunes.
        drop(self.guard.take());
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        drop(self.entry.take());

        let mut entries = self
            .table
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if entries
            .get(&self.key)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            entries.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_pruned_after_release() {
        let locks = ParentLocks::new();
        let key = DocumentId::new();
        {
            let _guard = locks.acquire(key).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(ParentLocks::new());
        let key = DocumentId::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let guard = locks.acquire(key).await;
        let waiter = {
            let (locks, order) = (locks.clone(), order.clone());
            tokio::spawn(async move {
                let _guard = locks.acquire(key).await;
                order.lock().unwrap().push("waiter");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        order.lock().unwrap().push("holder");
        drop(guard);
        waiter.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["holder", "waiter"]);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = ParentLocks::new();
        let _a = locks.acquire(DocumentId::new()).await;
        let _b = locks.acquire(DocumentId::new()).await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_leak_entry() {
        let locks = Arc::new(ParentLocks::new());
        let key = DocumentId::new();

        let guard = locks.acquire(key).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(key).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The holder releases while the waiter still counts as a user, then
        // the waiter is cancelled before it is polled again.
        drop(guard);
        waiter.abort();
        let _ = waiter.await;

        assert!(locks.is_empty());
        let _other = locks.acquire(DocumentId::new()).await;
        assert_eq!(locks.len(), 1);
    }
}
