//! Client facade wired to real cache backends and a scripted provider.

use async_trait::async_trait;
use mce_llm::cache::{CacheBackend, CacheKeyGenerator, FileCache, MemoryCache};
use mce_llm::provider::{MockAdapter, ProviderAdapter, ProviderError, ProviderResult};
use mce_llm::types::{
    ChatMessage, ChatResponse, EmbeddingConfig, EmbeddingResponse, ModelConfig,
};
use mce_llm::{Error, LlmClient};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Provider that counts calls and can be told to fail or go offline.
#[derive(Default)]
struct CountingAdapter {
    chat_calls: AtomicUsize,
    embedding_calls: AtomicUsize,
    fail: AtomicBool,
    offline: AtomicBool,
}

impl CountingAdapter {
    fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    fn embedding_calls(&self) -> usize {
        self.embedding_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for CountingAdapter {
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        config: &ModelConfig,
    ) -> ProviderResult<ChatResponse> {
        let n = self.chat_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::new("counting", "HTTP 503 from upstream"));
        }
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        Ok(ChatResponse::new(format!("reply #{n} to {last}"), &config.model_name))
    }

    async fn generate_embeddings(
        &self,
        texts: &[String],
        config: &EmbeddingConfig,
    ) -> ProviderResult<EmbeddingResponse> {
        self.embedding_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::new("counting", "quota exceeded"));
        }
        let vectors = texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect();
        Ok(EmbeddingResponse::new(vectors, &config.model_name))
    }

    async fn is_available(&self) -> ProviderResult<bool> {
        Ok(!self.offline.load(Ordering::SeqCst))
    }

    fn name(&self) -> &str {
        "counting"
    }
}

fn client(adapter: Arc<CountingAdapter>, cache: Option<Arc<dyn CacheBackend>>) -> LlmClient {
    let mut builder = LlmClient::builder().provider(adapter);
    if let Some(cache) = cache {
        builder = builder.cache(cache);
    }
    builder.build().unwrap()
}

fn messages(text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You extract metadata."),
        ChatMessage::user(text),
    ]
}

#[tokio::test]
async fn identical_chat_requests_hit_the_provider_once() {
    let adapter = Arc::new(CountingAdapter::default());
    let llm = client(adapter.clone(), Some(Arc::new(MemoryCache::default())));
    let config = ModelConfig::new("gpt-4o-mini");

    let first = llm.chat_completion(&messages("Hello"), &config).await.unwrap();
    let second = llm.chat_completion(&messages("Hello"), &config).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(adapter.chat_calls(), 1);
    assert_eq!(llm.stats().provider_calls, 1);
    assert_eq!(llm.stats().hits, 1);
}

#[tokio::test]
async fn different_messages_are_cached_separately() {
    let adapter = Arc::new(CountingAdapter::default());
    let llm = client(adapter.clone(), Some(Arc::new(MemoryCache::default())));
    let config = ModelConfig::new("gpt-4o-mini");

    let a = llm.chat_completion(&messages("Hello"), &config).await.unwrap();
    let b = llm.chat_completion(&messages("Goodbye"), &config).await.unwrap();

    assert_ne!(a, b);
    assert_eq!(adapter.chat_calls(), 2);
    assert_eq!(llm.cache().unwrap().size().await, 2);
}

#[tokio::test]
async fn config_change_misses_the_cache() {
    let adapter = Arc::new(CountingAdapter::default());
    let llm = client(adapter.clone(), Some(Arc::new(MemoryCache::default())));
    let msgs = messages("Hello");

    llm.chat_completion(&msgs, &ModelConfig::new("gpt-4o-mini"))
        .await
        .unwrap();
    llm.chat_completion(&msgs, &ModelConfig::new("gpt-4o-mini").temperature(0.0))
        .await
        .unwrap();
    assert_eq!(adapter.chat_calls(), 2);
}

#[tokio::test]
async fn embeddings_are_cached() {
    let adapter = Arc::new(CountingAdapter::default());
    let llm = client(adapter.clone(), Some(Arc::new(MemoryCache::default())));
    let config = EmbeddingConfig::new("text-embedding-3-small");
    let texts = vec!["users table".to_string(), "orders table".to_string()];

    let first = llm.generate_embeddings(&texts, &config).await.unwrap();
    let second = llm.generate_embeddings(&texts, &config).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(adapter.embedding_calls(), 1);
}

#[tokio::test]
async fn file_cache_is_shared_across_clients() {
    let dir = TempDir::new().unwrap();
    let cache: Arc<dyn CacheBackend> =
        Arc::new(FileCache::new(dir.path(), Duration::from_secs(60), 1 << 20).unwrap());
    let config = ModelConfig::new("gpt-4o-mini");

    let adapter = Arc::new(CountingAdapter::default());
    let first = client(adapter.clone(), Some(cache.clone()))
        .chat_completion(&messages("persist me"), &config)
        .await
        .unwrap();

    let fresh_adapter = Arc::new(CountingAdapter::default());
    let reopened: Arc<dyn CacheBackend> =
        Arc::new(FileCache::new(dir.path(), Duration::from_secs(60), 1 << 20).unwrap());
    let second = client(fresh_adapter.clone(), Some(reopened))
        .chat_completion(&messages("persist me"), &config)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(fresh_adapter.chat_calls(), 0);
}

#[tokio::test]
async fn empty_requests_are_rejected() {
    let adapter = Arc::new(CountingAdapter::default());
    let llm = client(adapter.clone(), Some(Arc::new(MemoryCache::default())));

    let err = llm
        .chat_completion(&[], &ModelConfig::new("m"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyRequest { what: "messages" }));
    let err = llm
        .generate_embeddings(&[], &EmbeddingConfig::new("e"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyRequest { what: "texts" }));
    assert_eq!(adapter.chat_calls() + adapter.embedding_calls(), 0);
}

#[tokio::test]
async fn missing_provider_is_reported() {
    let llm = LlmClient::builder()
        .cache(Arc::new(MemoryCache::default()))
        .build()
        .unwrap();
    let err = llm
        .chat_completion(&messages("hi"), &ModelConfig::new("m"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProviderNotConfigured));
}

#[tokio::test]
async fn unavailable_provider_skips_the_cache() {
    let adapter = Arc::new(CountingAdapter::default());
    let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::default());
    let llm = client(adapter.clone(), Some(cache.clone()));
    let config = ModelConfig::new("m");

    llm.chat_completion(&messages("hi"), &config).await.unwrap();
    adapter.offline.store(true, Ordering::SeqCst);

    let err = llm.chat_completion(&messages("hi"), &config).await.unwrap_err();
    match err {
        Error::ProviderUnavailable { provider } => assert_eq!(provider, "counting"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(llm.stats().hits, 0);
}

#[tokio::test]
async fn provider_errors_pass_through_and_are_not_cached() {
    let adapter = Arc::new(CountingAdapter::default());
    let llm = client(adapter.clone(), Some(Arc::new(MemoryCache::default())));
    let config = ModelConfig::new("m");
    adapter.fail.store(true, Ordering::SeqCst);

    let err = llm.chat_completion(&messages("hi"), &config).await.unwrap_err();
    match &err {
        Error::Provider(e) => {
            assert_eq!(e.provider, "counting");
            assert_eq!(e.message, "HTTP 503 from upstream");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(llm.cache().unwrap().size().await, 0);

    adapter.fail.store(false, Ordering::SeqCst);
    llm.chat_completion(&messages("hi"), &config).await.unwrap();
    assert_eq!(adapter.chat_calls(), 2);
}

#[tokio::test]
async fn cache_write_failures_are_surfaced() {
    let dir = TempDir::new().unwrap();
    let cache: Arc<dyn CacheBackend> =
        Arc::new(FileCache::new(dir.path(), Duration::from_secs(60), 64).unwrap());
    let adapter = Arc::new(CountingAdapter::default());
    let llm = client(adapter.clone(), Some(cache));

    let err = llm
        .chat_completion(&messages("this reply will not fit in 64 bytes"), &ModelConfig::new("m"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cache(_)));
    assert_eq!(adapter.chat_calls(), 1);
}

#[tokio::test]
async fn without_cache_every_call_reaches_the_provider() {
    let adapter = Arc::new(CountingAdapter::default());
    let llm = client(adapter.clone(), None);
    let config = ModelConfig::new("m");
    for _ in 0..3 {
        llm.chat_completion(&messages("hi"), &config).await.unwrap();
    }
    assert_eq!(adapter.chat_calls(), 3);
}

#[tokio::test]
async fn client_ttl_applies_to_stored_entries() {
    let adapter = Arc::new(CountingAdapter::default());
    let llm = LlmClient::builder()
        .provider(adapter.clone())
        .cache(Arc::new(MemoryCache::default()))
        .cache_ttl(Duration::from_millis(100))
        .build()
        .unwrap();
    let config = ModelConfig::new("m");

    llm.chat_completion(&messages("hi"), &config).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    llm.chat_completion(&messages("hi"), &config).await.unwrap();
    assert_eq!(adapter.chat_calls(), 2);

    assert!(LlmClient::builder().cache_ttl(Duration::ZERO).build().is_err());
}

#[tokio::test]
async fn time_bucketed_keys_still_hit_within_a_bucket() {
    let mock = Arc::new(MockAdapter::new());
    let llm = LlmClient::builder()
        .provider(mock.clone())
        .cache(Arc::new(MemoryCache::default()))
        .key_generator(CacheKeyGenerator::new().with_time_bucket(Duration::from_secs(86_400)))
        .build()
        .unwrap();
    let prompt = "Summarise the schema";
    let config = ModelConfig::new("mock-model");

    let a = llm.generate_text(prompt, &config).await.unwrap();
    let b = llm.generate_text(prompt, &config).await.unwrap();
    assert_eq!(a.content, "Mock response for: Summarise the schema");
    assert_eq!(a, b);
    assert_eq!(mock.call_count(), 1);
}
