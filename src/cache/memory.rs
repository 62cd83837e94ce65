//! In-memory cache backend.

use super::backend::{expires_at, validate_default_ttl, validate_key, CacheBackend, DEFAULT_TTL};
use super::error::CacheResult;
use crate::types::CachedResponse;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
struct CacheEntry {
    response: CachedResponse,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Map-backed cache held for the lifetime of the process.
///
/// There is no background reaper. Expired entries are dropped when their key
/// is read, or in bulk by [`CacheBackend::size`] and
/// [`CacheBackend::purge_expired`].
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl MemoryCache {
    pub fn new(default_ttl: Duration) -> CacheResult<Self> {
        validate_default_ttl(default_ttl)?;
        Ok(Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        })
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned guard is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn purge_locked(entries: &mut HashMap<String, CacheEntry>, now: DateTime<Utc>) -> usize {
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired_at(now));
        before - entries.len()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl: DEFAULT_TTL,
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Option<CachedResponse> {
        let mut entries = self.lock();
        let entry = entries.get(key)?;
        if entry.is_expired_at(Utc::now()) {
            debug!(key, "memory cache entry expired");
            entries.remove(key);
            return None;
        }
        Some(entry.response.clone())
    }

    async fn set(
        &self,
        key: &str,
        response: &CachedResponse,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        validate_key(key)?;
        let expires_at = expires_at(Utc::now(), ttl, self.default_ttl)?;
        self.lock().insert(
            key.to_string(),
            CacheEntry {
                response: response.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    async fn clear(&self) {
        self.lock().clear();
    }

    async fn size(&self) -> usize {
        let mut entries = self.lock();
        Self::purge_locked(&mut entries, Utc::now());
        entries.len()
    }

    async fn purge_expired(&self) -> usize {
        let removed = Self::purge_locked(&mut self.lock(), Utc::now());
        if removed > 0 {
            debug!(removed, "purged expired memory cache entries");
        }
        removed
    }

    fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
