use crate::cache::{CacheBackend, CacheError, CacheKeyGenerator};
use crate::client::core::LlmClient;
use crate::client::stats::CacheStats;
use crate::provider::ProviderAdapter;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`LlmClient`].
///
/// A client without a provider can be built; its requests then fail with
/// [`crate::Error::ProviderNotConfigured`]. Without a cache every request
/// goes to the provider.
#[derive(Default)]
pub struct LlmClientBuilder {
    provider: Option<Arc<dyn ProviderAdapter>>,
    cache: Option<Arc<dyn CacheBackend>>,
    key_generator: CacheKeyGenerator,
    cache_ttl: Option<Duration>,
}

impl LlmClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn key_generator(mut self, key_generator: CacheKeyGenerator) -> Self {
        self.key_generator = key_generator;
        self
    }

    /// TTL for entries this client stores. Defaults to the backend's own.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn build(self) -> Result<LlmClient> {
        if self.cache_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::InvalidConfiguration {
                field: "ttl",
                message: "TTL must be positive".to_string(),
            }
            .into());
        }
        Ok(LlmClient {
            provider: self.provider,
            cache: self.cache,
            key_generator: self.key_generator,
            cache_ttl: self.cache_ttl,
            stats: Arc::new(CacheStats::default()),
        })
    }
}
