//! Cache backend contract and the validation rules every backend shares.

use super::error::{CacheError, CacheResult};
use crate::types::{CachedResponse, ChatResponse, EmbeddingResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::time::Duration;

/// Default time-to-live for entries: one hour.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Storage strategy for cached LLM responses.
///
/// Lookups never fail: a missing, expired or unreadable entry is simply a
/// miss. Only `set` reports errors, and only for invalid input or a failed
/// write.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Return the live entry for `key`, removing it if it has expired.
    async fn get(&self, key: &str) -> Option<CachedResponse>;

    /// Store `response` under `key` for `ttl` (or the backend default).
    async fn set(
        &self,
        key: &str,
        response: &CachedResponse,
        ttl: Option<Duration>,
    ) -> CacheResult<()>;

    /// Remove a single entry. Returns whether something was removed.
    async fn delete(&self, key: &str) -> bool;

    /// Remove every entry.
    async fn clear(&self);

    /// Number of live entries. Expired entries are reaped first.
    async fn size(&self) -> usize;

    /// Reap expired (and, for persistent backends, unreadable) entries.
    /// Returns how many were removed.
    async fn purge_expired(&self) -> usize;

    fn default_ttl(&self) -> Duration;

    fn name(&self) -> &'static str;
}

/// Store a value whose concrete type is only known at runtime.
///
/// This is the entry point for callers holding type-erased values: `None`
/// yields [`CacheError::NullResponse`], anything other than a chat or
/// embedding response yields [`CacheError::UnsupportedType`]. The key is
/// checked before the value.
pub async fn set_dynamic<T: Any + Sync>(
    cache: &dyn CacheBackend,
    key: &str,
    value: Option<&T>,
    ttl: Option<Duration>,
) -> CacheResult<()> {
    validate_key(key)?;
    let response = to_cached_response(value)?;
    cache.set(key, &response, ttl).await
}

/// Convert a type-erased value into a cacheable response.
pub fn to_cached_response<T: Any>(value: Option<&T>) -> CacheResult<CachedResponse> {
    let value = value.ok_or(CacheError::NullResponse)?;
    let any = value as &dyn Any;
    if let Some(r) = any.downcast_ref::<ChatResponse>() {
        return Ok(CachedResponse::Chat(r.clone()));
    }
    if let Some(r) = any.downcast_ref::<EmbeddingResponse>() {
        return Ok(CachedResponse::Embedding(r.clone()));
    }
    if let Some(r) = any.downcast_ref::<CachedResponse>() {
        return Ok(r.clone());
    }
    Err(CacheError::UnsupportedType {
        type_name: std::any::type_name::<T>().to_string(),
    })
}

pub(crate) fn validate_key(key: &str) -> CacheResult<()> {
    if key.trim().is_empty() {
        return Err(CacheError::InvalidKey);
    }
    Ok(())
}

pub(crate) fn validate_default_ttl(ttl: Duration) -> CacheResult<()> {
    if ttl.is_zero() {
        return Err(CacheError::invalid_config(
            "default_ttl",
            "TTL must be positive",
        ));
    }
    Ok(())
}

/// Expiry instant for an entry written at `now`.
pub(crate) fn expires_at(
    now: DateTime<Utc>,
    ttl: Option<Duration>,
    default_ttl: Duration,
) -> CacheResult<DateTime<Utc>> {
    let ttl = ttl.unwrap_or(default_ttl);
    if ttl.is_zero() {
        return Err(CacheError::invalid_config("ttl", "TTL must be positive"));
    }
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| CacheError::invalid_config("ttl", "TTL is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(matches!(validate_key(""), Err(CacheError::InvalidKey)));
        assert!(matches!(validate_key(" \t\n"), Err(CacheError::InvalidKey)));
        assert!(validate_key("k").is_ok());
    }

    #[test]
    fn test_to_cached_response_dispatch() {
        let chat = ChatResponse::new("a", "m");
        assert_eq!(
            to_cached_response(Some(&chat)).unwrap(),
            CachedResponse::Chat(chat.clone())
        );
        let emb = EmbeddingResponse::new(vec![vec![1.0]], "e");
        assert!(matches!(
            to_cached_response(Some(&emb)).unwrap(),
            CachedResponse::Embedding(_)
        ));
        let tagged = CachedResponse::from(chat);
        assert_eq!(to_cached_response(Some(&tagged)).unwrap(), tagged);
    }

    #[test]
    fn test_to_cached_response_rejects_other_types() {
        assert!(matches!(
            to_cached_response::<ChatResponse>(None),
            Err(CacheError::NullResponse)
        ));
        match to_cached_response(Some(&"just a string")) {
            Err(CacheError::UnsupportedType { type_name }) => assert!(type_name.contains("str")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_expires_at() {
        let now = Utc::now();
        let at = expires_at(now, None, DEFAULT_TTL).unwrap();
        assert_eq!((at - now).num_seconds(), 3600);
        let at = expires_at(now, Some(Duration::from_millis(100)), DEFAULT_TTL).unwrap();
        assert_eq!((at - now).num_milliseconds(), 100);
        assert!(matches!(
            expires_at(now, Some(Duration::ZERO), DEFAULT_TTL),
            Err(CacheError::InvalidConfiguration { field: "ttl", .. })
        ));
    }

    #[test]
    fn test_zero_default_ttl_rejected() {
        assert!(validate_default_ttl(Duration::ZERO).is_err());
        assert!(validate_default_ttl(Duration::from_secs(1)).is_ok());
    }
}
