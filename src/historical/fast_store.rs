use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::errors::StoreError;

/// Key-value store with hash fields and entry-level TTL
///
/// The historical average tier only needs these hash operations. A write replaces the whole hash
/// for the key and restarts its TTL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FastStore: Send + Sync {
    /// Read one field of a hash; `None` if the key or field is absent or expired
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Read every field of a hash
    async fn hgetall(&self, key: &str) -> Result<Option<HashMap<String, String>>, StoreError>;

    /// Replace the hash stored under `key` in one batch and set its TTL
    async fn hset_all(&self, key: &str, fields: Vec<(String, String)>, ttl: Duration) -> Result<(), StoreError>;

    /// Remove expired entries, returning how many were dropped
    async fn purge_expired(&self) -> Result<usize, StoreError>;

    /// Release the store. Later calls fail with `StoreError::Closed`.
    async fn close(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    fields: HashMap<String, String>,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process fast store with lazy expiry
#[derive(Default)]
pub struct MemoryFastStore {
    entries: DashMap<String, MemoryEntry>,
    closed: AtomicBool,
}

impl MemoryFastStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Live entry for `key`, evicting it if it has expired
    fn live_entry(&self, key: &str) -> Option<dashmap::mapref::one::Ref<'_, String, MemoryEntry>> {
        let now = Instant::now();
        let entry = self.entries.get(key)?;
        if !entry.is_expired(now) {
            return Some(entry);
        }
        drop(entry);
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        debug!(key, "Expired fast store entry evicted on read");
        None
    }
}

#[async_trait]
impl FastStore for MemoryFastStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.ensure_open()?;
        Ok(self.live_entry(key).and_then(|entry| entry.fields.get(field).cloned()))
    }

    async fn hgetall(&self, key: &str) -> Result<Option<HashMap<String, String>>, StoreError> {
        self.ensure_open()?;
        Ok(self.live_entry(key).map(|entry| entry.fields.clone()))
    }

    async fn hset_all(&self, key: &str, fields: Vec<(String, String)>, ttl: Duration) -> Result<(), StoreError> {
        self.ensure_open()?;
        let entry = MemoryEntry {
            fields: fields.into_iter().collect(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.ensure_open()?;
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before.saturating_sub(self.entries.len()))
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        self.entries.clear();
        Ok(())
    }
}
