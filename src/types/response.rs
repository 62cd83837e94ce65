//! Provider responses and the tagged form they take inside a cache.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token accounting reported by a provider, keyed by category
/// (`prompt_tokens`, `completion_tokens`, `total_tokens`, ...).
pub type Usage = BTreeMap<String, u64>;

/// Response from a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ChatResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            usage: None,
            finish_reason: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }

    pub fn total_tokens(&self) -> Option<u64> {
        self.usage.as_ref()?.get("total_tokens").copied()
    }
}

/// Response from an embedding request. `embeddings[i]` belongs to input text `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl EmbeddingResponse {
    pub fn new(embeddings: Vec<Vec<f32>>, model: impl Into<String>) -> Self {
        Self {
            embeddings,
            model: model.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Dimensionality of the first vector, if any.
    pub fn dimensions(&self) -> Option<usize> {
        self.embeddings.first().map(Vec::len)
    }
}

/// Any response a cache backend can hold.
///
/// Serialized with an explicit `response_type` discriminant so a persisted
/// entry can be turned back into the right concrete type. An unknown
/// discriminant fails deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response_type")]
pub enum CachedResponse {
    #[serde(rename = "ChatResponse")]
    Chat(ChatResponse),
    #[serde(rename = "EmbeddingResponse")]
    Embedding(EmbeddingResponse),
}

impl CachedResponse {
    /// Discriminant as written to disk.
    pub fn kind(&self) -> &'static str {
        match self {
            CachedResponse::Chat(_) => "ChatResponse",
            CachedResponse::Embedding(_) => "EmbeddingResponse",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            CachedResponse::Chat(r) => &r.model,
            CachedResponse::Embedding(r) => &r.model,
        }
    }

    pub fn into_chat(self) -> Option<ChatResponse> {
        match self {
            CachedResponse::Chat(r) => Some(r),
            CachedResponse::Embedding(_) => None,
        }
    }

    pub fn into_embedding(self) -> Option<EmbeddingResponse> {
        match self {
            CachedResponse::Embedding(r) => Some(r),
            CachedResponse::Chat(_) => None,
        }
    }
}

impl From<ChatResponse> for CachedResponse {
    fn from(r: ChatResponse) -> Self {
        CachedResponse::Chat(r)
    }
}

impl From<EmbeddingResponse> for CachedResponse {
    fn from(r: EmbeddingResponse) -> Self {
        CachedResponse::Embedding(r)
    }
}
