//! In-memory implementation of the Store trait.
//!
//! All data is lost when the store is dropped. Thread-safe via RwLock;
//! waiters for a missing key park on a per-key [`Notify`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use peerkv_core::ValueRecord;

use crate::error::{Result, StoreError};
use crate::traits::{InsertResult, Store, ValueSet};

/// In-memory store implementation.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Value sets indexed by key.
    entries: HashMap<String, ValueSet>,

    /// Tasks waiting for a key's entry to be created.
    waiters: HashMap<String, Waiters>,
}

/// Wake-up handle shared by the tasks waiting on one key.
struct Waiters {
    notify: Arc<Notify>,
    /// Tasks still parked on `notify`; maintained under the write lock.
    count: usize,
}

impl MemoryStoreInner {
    /// Get the entry for `key`, creating it and releasing its waiters if absent.
    ///
    /// Woken waiters re-read the map only after the caller drops the write
    /// lock, so they always observe the new entry.
    fn entry_mut(&mut self, key: &str) -> &mut ValueSet {
        if !self.entries.contains_key(key) {
            if let Some(waiters) = self.waiters.remove(key) {
                waiters.notify.notify_waiters();
            }
        }
        self.entries.entry(key.to_string()).or_default()
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }

    fn snapshot(&self, key: &str) -> Result<Option<ValueSet>> {
        Ok(self.read()?.entries.get(key).cloned())
    }

    /// Give up one task's place in the waiter slot for `key`, dropping the
    /// slot once nobody is left in it.
    fn release_waiter(&self, key: &str, notify: &Arc<Notify>) -> Result<()> {
        let mut inner = self.write()?;
        let Some(waiters) = inner.waiters.get_mut(key) else {
            return Ok(());
        };
        if !Arc::ptr_eq(&waiters.notify, notify) {
            return Ok(());
        }
        waiters.count = waiters.count.saturating_sub(1);
        if waiters.count == 0 {
            inner.waiters.remove(key);
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, key: &str, value: ValueRecord) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if inner.entry_mut(key).insert(value) {
            Ok(InsertResult::Inserted)
        } else {
            Ok(InsertResult::AlreadyExists)
        }
    }

    async fn merge(&self, key: &str, values: Vec<ValueRecord>) -> Result<usize> {
        let mut inner = self.write()?;
        let set = inner.entry_mut(key);
        Ok(values.into_iter().map(|v| set.insert(v)).filter(|new| *new).count())
    }

    async fn ensure_entry(&self, key: &str) -> Result<bool> {
        let mut inner = self.write()?;
        let created = !inner.entries.contains_key(key);
        inner.entry_mut(key);
        Ok(created)
    }

    async fn get(&self, key: &str) -> Result<Option<ValueSet>> {
        self.snapshot(key)
    }

    async fn wait_for_entry(&self, key: &str, timeout: Duration) -> Result<Option<ValueSet>> {
        let deadline = Instant::now() + timeout;

        let notify = {
            let mut inner = self.write()?;
            if let Some(set) = inner.entries.get(key) {
                return Ok(Some(set.clone()));
            }
            let waiters = inner
                .waiters
                .entry(key.to_string())
                .or_insert_with(|| Waiters {
                    notify: Arc::new(Notify::new()),
                    count: 0,
                });
            waiters.count += 1;
            Arc::clone(&waiters.notify)
        };

        loop {
            let notified = notify.notified();
            tokio::pin!(notified);
            // Register before re-checking so a concurrent insert cannot slip
            // between the check and the wait.
            notified.as_mut().enable();

            if let Some(set) = self.snapshot(key)? {
                return Ok(Some(set));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                tracing::debug!(key, "wait for entry timed out");
                self.release_waiter(key, &notify)?;
                return self.snapshot(key);
            }
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let inner = self.read()?;
        let mut keys: Vec<String> = inner.entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
