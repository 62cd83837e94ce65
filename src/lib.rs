//! # mce-llm
//!
//! 元数据抽取器的 LLM 访问层：统一的客户端门面、可插拔的提供方适配器，以及内存/文件两种响应缓存。
//!
//! LLM access layer for the metadata code extractor: a client facade over
//! pluggable provider adapters, with a response cache so repeated prompts and
//! embedding requests are answered without a provider round trip.
//!
//! ## Request flow
//!
//! 1. Reject empty requests and invalid model parameters.
//! 2. Fail fast when no provider is configured or it reports itself unavailable.
//! 3. Derive a deterministic key from the request and its configuration.
//! 4. Return a live cached entry, or call the provider and store the result.
//!
//! Provider failures surface as [`Error::Provider`] unchanged; cache write
//! failures surface as [`Error::Cache`].
//!
//! ## Quick Start
//!
//! ```rust
//! use mce_llm::cache::MemoryCache;
//! use mce_llm::provider::MockAdapter;
//! use mce_llm::types::{ChatMessage, ModelConfig};
//! use mce_llm::LlmClient;
//! use std::sync::Arc;
//!
//! # async fn demo() -> mce_llm::Result<()> {
//! let client = LlmClient::builder()
//!     .provider(Arc::new(MockAdapter::new()))
//!     .cache(Arc::new(MemoryCache::default()))
//!     .build()?;
//!
//! let messages = vec![ChatMessage::user("Which tables does this query read?")];
//! let config = ModelConfig::new("mock-model");
//! let first = client.chat_completion(&messages, &config).await?;
//! let again = client.chat_completion(&messages, &config).await?;
//! assert_eq!(first, again);
//! assert_eq!(client.stats().provider_calls, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Cache backends and key derivation |
//! | [`client`] | Caching client facade and builder |
//! | [`config`] | YAML + environment configuration |
//! | [`provider`] | Provider adapter trait, OpenAI-compatible and mock adapters |
//! | [`types`] | Messages, model parameters and responses |
//! | [`logging`] | Subscriber setup |

pub mod cache;
pub mod client;
pub mod config;
pub mod logging;
pub mod provider;
pub mod types;

pub use client::{CacheStatsSnapshot, LlmClient, LlmClientBuilder};
pub use config::{AppConfig, ConfigLoader, LlmSettings};
pub use provider::{ProviderAdapter, ProviderError};
pub use types::{
    CachedResponse, ChatMessage, ChatResponse, EmbeddingConfig, EmbeddingResponse, MessageRole,
    ModelConfig,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
