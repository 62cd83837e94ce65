//! Provider adapters: the boundary between the client and a concrete LLM API.
//!
//! | Adapter | Description |
//! |---------|-------------|
//! | [`OpenAiAdapter`] | OpenAI and OpenAI-compatible endpoints (OpenRouter, local gateways) |
//! | [`MockAdapter`] | Deterministic offline responses for tests and development |

mod mock;
mod openai;

pub use mock::{MockAdapter, MOCK_EMBEDDING_DIMENSIONS};
pub use openai::{OpenAiAdapter, OpenAiAdapterBuilder, DEFAULT_OPENAI_BASE_URL};

use crate::config::ProviderSettings;
use crate::types::{ChatMessage, ChatResponse, EmbeddingConfig, EmbeddingResponse, ModelConfig};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a provider, carrying the underlying cause message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{provider}: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Translates generic requests into calls against one LLM API.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        config: &ModelConfig,
    ) -> ProviderResult<ChatResponse>;

    async fn generate_embeddings(
        &self,
        texts: &[String],
        config: &EmbeddingConfig,
    ) -> ProviderResult<EmbeddingResponse>;

    async fn is_available(&self) -> ProviderResult<bool>;

    /// Provider id used in logs and errors.
    fn name(&self) -> &str;
}

/// Build the adapter registered under `provider` (`openai` or `mock`).
pub fn create_adapter(
    provider: &str,
    settings: &ProviderSettings,
) -> Result<Arc<dyn ProviderAdapter>> {
    match provider.trim().to_ascii_lowercase().as_str() {
        "openai" => {
            let mut builder = OpenAiAdapter::builder().timeout_secs(settings.timeout_secs);
            if let Some(key) = &settings.api_key {
                builder = builder.api_key(key.clone());
            }
            if let Some(url) = &settings.base_url {
                builder = builder.base_url(url.as_str());
            }
            Ok(Arc::new(builder.build()?))
        }
        "mock" => Ok(Arc::new(MockAdapter::new())),
        other => Err(Error::configuration_with_context(
            format!("Unknown provider: {}", other),
            ErrorContext::new()
                .with_field_path("llm.default_provider")
                .with_details("supported providers: openai, mock")
                .with_source("provider_factory"),
        )),
    }
}
