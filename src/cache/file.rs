//! File-backed cache: one JSON document per key under a single directory.
//!
//! On-disk layout of `<cache_dir>/<sanitized key>.json`:
//!
//! ```json
//! {
//!   "response": { "response_type": "ChatResponse", "content": "...", "model": "..." },
//!   "expires_at": "2024-05-01T12:00:00Z"
//! }
//! ```
//!
//! Writes go to a hidden temporary file first and are renamed into place, so
//! a reader never observes a half-written entry. Any file that fails to parse
//! is deleted on sight and reported as a miss.

use super::backend::{expires_at, validate_default_ttl, validate_key, CacheBackend};
use super::error::{CacheError, CacheResult};
use crate::types::CachedResponse;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-entry size cap: 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const CACHE_FILE_EXTENSION: &str = "json";

static UNSAFE_KEY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("static pattern"));

/// Replace characters that are not allowed in file names with `_`.
pub fn sanitize_key(key: &str) -> String {
    UNSAFE_KEY_CHARS.replace_all(key, "_").into_owned()
}

#[derive(Serialize)]
struct DiskEntryRef<'a> {
    response: &'a CachedResponse,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct DiskEntry {
    response: CachedResponse,
    expires_at: DateTime<Utc>,
}

enum ReadOutcome {
    Missing,
    Corrupt,
    Expired,
    Live(CachedResponse),
}

pub struct FileCache {
    dir: PathBuf,
    default_ttl: Duration,
    max_file_size: u64,
}

impl FileCache {
    /// Open (creating if needed) a cache rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>, default_ttl: Duration, max_file_size: u64) -> CacheResult<Self> {
        validate_default_ttl(default_ttl)?;
        if max_file_size == 0 {
            return Err(CacheError::invalid_config(
                "max_file_size",
                "max file size must be positive",
            ));
        }
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::WriteFailed {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            default_ttl,
            max_file_size,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Path of the file holding `key`.
    pub fn path_for_key(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", sanitize_key(key), CACHE_FILE_EXTENSION))
    }

    // Staging files end in `.tmp`, so the extension alone tells them apart
    // from entries, including entries whose key starts with a dot.
    fn is_cache_file(path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some(CACHE_FILE_EXTENSION)
    }

    async fn cache_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(d) => d,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "cache directory not readable");
                return files;
            }
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && Self::is_cache_file(&path) {
                files.push(path);
            }
        }
        files
    }

    async fn read_entry(path: &Path, now: DateTime<Utc>) -> ReadOutcome {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return ReadOutcome::Missing,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable cache file");
                return ReadOutcome::Corrupt;
            }
        };
        match serde_json::from_slice::<DiskEntry>(&bytes) {
            Ok(entry) if entry.expires_at <= now => ReadOutcome::Expired,
            Ok(entry) => ReadOutcome::Live(entry.response),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupted cache file");
                ReadOutcome::Corrupt
            }
        }
    }

    async fn remove_quietly(path: &Path) -> bool {
        match tokio::fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "failed to remove cache file");
                false
            }
        }
    }

    async fn write_atomic(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("entry");
        let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&tmp, data).await {
            Self::remove_quietly(&tmp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            Self::remove_quietly(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FileCache {
    async fn get(&self, key: &str) -> Option<CachedResponse> {
        let path = self.path_for_key(key);
        match Self::read_entry(&path, Utc::now()).await {
            ReadOutcome::Missing => None,
            ReadOutcome::Live(response) => Some(response),
            ReadOutcome::Expired => {
                debug!(key, "file cache entry expired");
                Self::remove_quietly(&path).await;
                None
            }
            ReadOutcome::Corrupt => {
                Self::remove_quietly(&path).await;
                None
            }
        }
    }

    async fn set(
        &self,
        key: &str,
        response: &CachedResponse,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        validate_key(key)?;
        let entry = DiskEntryRef {
            response,
            expires_at: expires_at(Utc::now(), ttl, self.default_ttl)?,
        };
        let data = serde_json::to_vec_pretty(&entry)?;
        if data.len() as u64 > self.max_file_size {
            return Err(CacheError::ResponseTooLarge {
                size: data.len(),
                max: self.max_file_size,
            });
        }
        let path = self.path_for_key(key);
        self.write_atomic(&path, &data)
            .await
            .map_err(|source| CacheError::WriteFailed {
                path: path.clone(),
                source,
            })?;
        debug!(key, bytes = data.len(), kind = response.kind(), "wrote file cache entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> bool {
        Self::remove_quietly(&self.path_for_key(key)).await
    }

    async fn clear(&self) {
        for path in self.cache_files().await {
            Self::remove_quietly(&path).await;
        }
    }

    async fn size(&self) -> usize {
        self.purge_expired().await;
        self.cache_files().await.len()
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        for path in self.cache_files().await {
            match Self::read_entry(&path, now).await {
                ReadOutcome::Expired | ReadOutcome::Corrupt => {
                    if Self::remove_quietly(&path).await {
                        removed += 1;
                    }
                }
                ReadOutcome::Missing | ReadOutcome::Live(_) => {}
            }
        }
        if removed > 0 {
            debug!(removed, dir = %self.dir.display(), "purged file cache entries");
        }
        removed
    }

    fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
