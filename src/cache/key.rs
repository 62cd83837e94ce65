//! Cache key generation.
//!
//! A key is the SHA-256 of a canonical JSON document
//! `{"config": .., "data": .., "time_bucket": ..}` whose object keys are
//! sorted at every level, so the encoding does not depend on field order in
//! the source structures.

use crate::types::{ChatMessage, EmbeddingConfig, ModelConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Width of the time bucket when bucketing is enabled without an explicit width.
pub const DEFAULT_TIME_BUCKET: Duration = Duration::from_secs(3600);

/// A request fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub hash: String,
    pub model: Option<String>,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.hash
    }
}

/// Derives cache keys from request payloads and their model configuration.
///
/// With a time bucket configured, identical requests made in different
/// buckets (e.g. different wall-clock hours) produce different keys.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyGenerator {
    time_bucket: Option<Duration>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a wall-clock bucket of `width` into every key. A zero width
    /// disables bucketing.
    pub fn with_time_bucket(mut self, width: Duration) -> Self {
        self.time_bucket = (!width.is_zero()).then_some(width);
        self
    }

    pub fn time_bucket(&self) -> Option<Duration> {
        self.time_bucket
    }

    pub fn chat_key(&self, messages: &[ChatMessage], config: &ModelConfig) -> CacheKey {
        self.chat_key_at(messages, config, Utc::now())
    }

    pub fn chat_key_at(
        &self,
        messages: &[ChatMessage],
        config: &ModelConfig,
        now: DateTime<Utc>,
    ) -> CacheKey {
        self.generate_at(messages, config, now)
            .with_model(config.model_name.clone())
    }

    pub fn embedding_key(&self, texts: &[String], config: &EmbeddingConfig) -> CacheKey {
        self.embedding_key_at(texts, config, Utc::now())
    }

    pub fn embedding_key_at(
        &self,
        texts: &[String],
        config: &EmbeddingConfig,
        now: DateTime<Utc>,
    ) -> CacheKey {
        self.generate_at(texts, config, now)
            .with_model(config.model_name.clone())
    }

    /// Fingerprint arbitrary serializable request data and configuration.
    pub fn generate_at<D, C>(&self, data: &D, config: &C, now: DateTime<Utc>) -> CacheKey
    where
        D: Serialize + ?Sized,
        C: Serialize + ?Sized,
    {
        let bucket = self
            .time_bucket
            .map(|w| now.timestamp().div_euclid(w.as_secs().max(1) as i64));
        let canonical = sort_keys(json!({
            "data": to_canonical(data),
            "config": to_canonical(config),
            "time_bucket": bucket,
        }));
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        CacheKey::new(hash)
    }
}

// Plain data types always serialize; a failure here would mean a custom
// Serialize impl rejected its own value, and hashing `null` still yields a
// deterministic key.
fn to_canonical<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(String, Value)> = map.into_iter().collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(fields.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_same_request_same_key() {
        let keygen = CacheKeyGenerator::new();
        let msgs = vec![ChatMessage::user("hello")];
        let cfg = ModelConfig::new("gpt-4o");
        let a = keygen.chat_key(&msgs, &cfg);
        let b = keygen.chat_key(&msgs.clone(), &cfg.clone());
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_different_inputs_different_keys() {
        let keygen = CacheKeyGenerator::new();
        let cfg = ModelConfig::new("gpt-4o");
        let a = keygen.chat_key(&[ChatMessage::user("hello")], &cfg);
        let b = keygen.chat_key(&[ChatMessage::user("hello!")], &cfg);
        let c = keygen.chat_key(&[ChatMessage::user("hello")], &cfg.clone().temperature(0.0));
        let d = keygen.chat_key(&[ChatMessage::system("hello")], &cfg);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_embedding_key_depends_on_text_order() {
        let keygen = CacheKeyGenerator::new();
        let cfg = EmbeddingConfig::new("text-embedding-3-small");
        let ab = keygen.embedding_key(&["a".to_string(), "b".to_string()], &cfg);
        let ba = keygen.embedding_key(&["b".to_string(), "a".to_string()], &cfg);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_without_bucket_time_is_ignored() {
        let keygen = CacheKeyGenerator::new();
        let msgs = [ChatMessage::user("q")];
        let cfg = ModelConfig::new("m");
        assert_eq!(
            keygen.chat_key_at(&msgs, &cfg, at(1, 0)),
            keygen.chat_key_at(&msgs, &cfg, at(9, 30))
        );
    }

    #[test]
    fn test_hour_bucket_splits_keys_across_hours() {
        let keygen = CacheKeyGenerator::new().with_time_bucket(DEFAULT_TIME_BUCKET);
        let msgs = [ChatMessage::user("q")];
        let cfg = ModelConfig::new("m");
        assert_eq!(
            keygen.chat_key_at(&msgs, &cfg, at(10, 1)),
            keygen.chat_key_at(&msgs, &cfg, at(10, 59))
        );
        assert_ne!(
            keygen.chat_key_at(&msgs, &cfg, at(10, 59)),
            keygen.chat_key_at(&msgs, &cfg, at(11, 0))
        );
    }

    #[test]
    fn test_zero_width_disables_bucket() {
        let keygen = CacheKeyGenerator::new().with_time_bucket(Duration::ZERO);
        assert!(keygen.time_bucket().is_none());
    }

    #[test]
    fn test_key_is_independent_of_struct_field_order() {
        #[derive(Serialize)]
        struct Ab {
            a: u8,
            b: u8,
        }
        #[derive(Serialize)]
        struct Ba {
            b: u8,
            a: u8,
        }
        let keygen = CacheKeyGenerator::new();
        let now = at(0, 0);
        assert_eq!(
            keygen.generate_at(&Ab { a: 1, b: 2 }, "cfg", now),
            keygen.generate_at(&Ba { b: 2, a: 1 }, "cfg", now)
        );
    }
}
