use crate::cache::{CacheBackend, CacheKey, CacheKeyGenerator};
use crate::client::builder::LlmClientBuilder;
use crate::client::stats::{CacheStats, CacheStatsSnapshot};
use crate::config::LlmSettings;
use crate::provider::{create_adapter, ProviderAdapter};
use crate::types::{
    CachedResponse, ChatMessage, ChatResponse, EmbeddingConfig, EmbeddingResponse, ModelConfig,
};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Caching facade over a provider adapter.
pub struct LlmClient {
    pub(crate) provider: Option<Arc<dyn ProviderAdapter>>,
    pub(crate) cache: Option<Arc<dyn CacheBackend>>,
    pub(crate) key_generator: CacheKeyGenerator,
    pub(crate) cache_ttl: Option<Duration>,
    pub(crate) stats: Arc<CacheStats>,
}

impl LlmClient {
    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::new()
    }

    /// Wire the default provider and, when enabled, the configured cache.
    pub fn from_config(settings: &LlmSettings) -> Result<Self> {
        settings.validate()?;
        let provider_name = settings.default_provider.as_str();
        let provider = create_adapter(provider_name, &settings.provider_settings(provider_name))?;
        let mut builder = Self::builder()
            .provider(provider)
            .key_generator(settings.cache.key_generator());
        if settings.cache_enabled {
            builder = builder.cache(settings.cache.build_backend()?);
        }
        let client = builder.build()?;
        info!(
            provider = provider_name,
            cache = client.cache.as_ref().map(|c| c.name()).unwrap_or("disabled"),
            "LLM client initialized"
        );
        Ok(client)
    }

    pub fn provider(&self) -> Option<&Arc<dyn ProviderAdapter>> {
        self.provider.as_ref()
    }

    pub fn cache(&self) -> Option<&Arc<dyn CacheBackend>> {
        self.cache.as_ref()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        config: &ModelConfig,
    ) -> Result<ChatResponse> {
        if messages.is_empty() {
            return Err(Error::EmptyRequest { what: "messages" });
        }
        config.validate()?;
        let provider = self.available_provider().await?;

        let key = self.cache.as_ref().map(|_| self.key_generator.chat_key(messages, config));
        if let Some(hit) = self.lookup(key.as_ref(), CachedResponse::into_chat).await {
            return Ok(hit);
        }

        self.stats.record_provider_call();
        debug!(provider = provider.name(), model = %config.model_name, "calling provider for chat completion");
        let response = provider.chat_completion(messages, config).await?;
        self.store(key.as_ref(), CachedResponse::Chat(response.clone()))
            .await?;
        Ok(response)
    }

    /// Single-prompt convenience over [`Self::chat_completion`].
    pub async fn generate_text(&self, prompt: &str, config: &ModelConfig) -> Result<ChatResponse> {
        if prompt.trim().is_empty() {
            return Err(Error::EmptyRequest { what: "prompt" });
        }
        self.chat_completion(&[ChatMessage::user(prompt)], config)
            .await
    }

    pub async fn generate_embeddings(
        &self,
        texts: &[String],
        config: &EmbeddingConfig,
    ) -> Result<EmbeddingResponse> {
        if texts.is_empty() {
            return Err(Error::EmptyRequest { what: "texts" });
        }
        config.validate()?;
        let provider = self.available_provider().await?;

        let key = self
            .cache
            .as_ref()
            .map(|_| self.key_generator.embedding_key(texts, config));
        if let Some(hit) = self
            .lookup(key.as_ref(), CachedResponse::into_embedding)
            .await
        {
            return Ok(hit);
        }

        self.stats.record_provider_call();
        debug!(provider = provider.name(), model = %config.model_name, texts = texts.len(), "calling provider for embeddings");
        let response = provider.generate_embeddings(texts, config).await?;
        self.store(key.as_ref(), CachedResponse::Embedding(response.clone()))
            .await?;
        Ok(response)
    }

    async fn available_provider(&self) -> Result<&Arc<dyn ProviderAdapter>> {
        let provider = self.provider.as_ref().ok_or(Error::ProviderNotConfigured)?;
        if !provider.is_available().await? {
            return Err(Error::ProviderUnavailable {
                provider: provider.name().to_string(),
            });
        }
        Ok(provider)
    }

    // A stored entry of the other kind counts as a miss.
    async fn lookup<T>(
        &self,
        key: Option<&CacheKey>,
        extract: fn(CachedResponse) -> Option<T>,
    ) -> Option<T> {
        let (cache, key) = (self.cache.as_ref()?, key?);
        let found = cache.get(key.as_str()).await;
        let kind = found.as_ref().map(CachedResponse::kind);
        match found.and_then(extract) {
            Some(hit) => {
                self.stats.record_hit();
                debug!(key = %key, kind, "cache hit");
                Some(hit)
            }
            None => {
                self.stats.record_miss();
                debug!(key = %key, stored_kind = kind, "cache miss");
                None
            }
        }
    }

    async fn store(&self, key: Option<&CacheKey>, response: CachedResponse) -> Result<()> {
        let (Some(cache), Some(key)) = (self.cache.as_ref(), key) else {
            return Ok(());
        };
        cache.set(key.as_str(), &response, self.cache_ttl).await?;
        self.stats.record_store();
        Ok(())
    }
}
