//! 响应缓存模块：以请求指纹为键缓存 LLM 响应，支持内存与文件两种后端。
//!
//! # Response Caching Module
//!
//! Maps a deterministic request fingerprint to a previously computed chat or
//! embedding response, so repeated requests skip the provider round trip.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheBackend`] | Trait every storage strategy implements |
//! | [`MemoryCache`] | Map-backed store with per-entry expiry |
//! | [`FileCache`] | One JSON file per key, with a size cap |
//! | [`CacheKeyGenerator`] | Fingerprints `(request, config)` pairs |
//! | [`CacheError`] | Validation and write failures |
//!
//! ## Semantics shared by all backends
//!
//! - An entry whose expiry is at or before now is never returned; it is
//!   removed the next time it is touched.
//! - `size()` reaps expired entries before counting.
//! - Reads never fail. A file that cannot be parsed is deleted and treated
//!   as a miss.
//!
//! ## Example
//!
//! ```rust
//! use mce_llm::cache::{CacheBackend, MemoryCache};
//! use mce_llm::types::{CachedResponse, ChatResponse};
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), mce_llm::cache::CacheError> {
//! let cache = MemoryCache::new(Duration::from_secs(3600))?;
//! let response: CachedResponse = ChatResponse::new("42", "mock-model").into();
//! cache.set("question", &response, None).await?;
//! assert_eq!(cache.get("question").await, Some(response));
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod file;
mod key;
mod memory;

pub use backend::{set_dynamic, to_cached_response, CacheBackend, DEFAULT_TTL};
pub use error::{CacheError, CacheResult};
pub use file::{sanitize_key, FileCache, DEFAULT_MAX_FILE_SIZE};
pub use key::{CacheKey, CacheKeyGenerator, DEFAULT_TIME_BUCKET};
pub use memory::MemoryCache;
