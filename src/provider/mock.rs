//! Offline adapter with deterministic output.

use super::{ProviderAdapter, ProviderError, ProviderResult};
use crate::types::{
    ChatMessage, ChatResponse, EmbeddingConfig, EmbeddingResponse, MessageRole, ModelConfig, Usage,
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Length of every vector returned by [`MockAdapter::generate_embeddings`].
pub const MOCK_EMBEDDING_DIMENSIONS: usize = 384;

/// Adapter that answers without network access.
///
/// Chat replies echo the last user message; embeddings are derived from a
/// hash of each text, so equal texts always map to equal vectors.
pub struct MockAdapter {
    response_delay: Duration,
    available: AtomicBool,
    fail_with: Option<String>,
    calls: AtomicU64,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            response_delay: Duration::ZERO,
            available: AtomicBool::new(true),
            fail_with: None,
            calls: AtomicU64::new(0),
        }
    }

    /// Simulated latency before every response.
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// Make every chat/embedding call fail with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of chat and embedding calls served so far (including failures).
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn simulate(&self) -> ProviderResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.response_delay.is_zero() {
            tokio::time::sleep(self.response_delay).await;
        }
        match &self.fail_with {
            Some(msg) => Err(ProviderError::new("mock", msg.clone())),
            None => Ok(()),
        }
    }

    fn embed(text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        digest
            .iter()
            .cycle()
            .take(MOCK_EMBEDDING_DIMENSIONS)
            .map(|b| f32::from(*b) / 255.0)
            .collect()
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn usage(pairs: &[(&str, u64)]) -> Usage {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        config: &ModelConfig,
    ) -> ProviderResult<ChatResponse> {
        self.simulate().await?;
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("No user message");
        Ok(
            ChatResponse::new(format!("Mock response for: {}", last_user), &config.model_name)
                .with_usage(usage(&[
                    ("prompt_tokens", 10),
                    ("completion_tokens", 20),
                    ("total_tokens", 30),
                ]))
                .with_finish_reason("stop"),
        )
    }

    async fn generate_embeddings(
        &self,
        texts: &[String],
        config: &EmbeddingConfig,
    ) -> ProviderResult<EmbeddingResponse> {
        self.simulate().await?;
        let embeddings = texts.iter().map(|t| Self::embed(t)).collect();
        Ok(EmbeddingResponse::new(embeddings, &config.model_name)
            .with_usage(usage(&[("prompt_tokens", 5), ("total_tokens", 5)])))
    }

    async fn is_available(&self) -> ProviderResult<bool> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chat_echoes_last_user_message() {
        let adapter = MockAdapter::new();
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("first"),
            ChatMessage::assistant("ok"),
            ChatMessage::user("second"),
        ];
        let resp = adapter
            .chat_completion(&messages, &ModelConfig::new("mock-model"))
            .await
            .unwrap();
        assert_eq!(resp.content, "Mock response for: second");
        assert_eq!(resp.model, "mock-model");
        assert_eq!(resp.total_tokens(), Some(30));
        assert_eq!(adapter.call_count(), 1);
    }

    #[tokio::test]
    async fn test_embeddings_are_deterministic() {
        let adapter = MockAdapter::new();
        let cfg = EmbeddingConfig::new("mock-embedding-model");
        let texts = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let resp = adapter.generate_embeddings(&texts, &cfg).await.unwrap();
        assert_eq!(resp.len(), 3);
        assert_eq!(resp.dimensions(), Some(MOCK_EMBEDDING_DIMENSIONS));
        assert_eq!(resp.embeddings[0], resp.embeddings[2]);
        assert_ne!(resp.embeddings[0], resp.embeddings[1]);
        assert!(resp.embeddings[1].iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[tokio::test]
    async fn test_failure_and_availability() {
        let adapter = MockAdapter::new().failing("Simulated failure");
        let err = adapter
            .chat_completion(&[ChatMessage::user("x")], &ModelConfig::new("m"))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::new("mock", "Simulated failure"));

        assert!(adapter.is_available().await.unwrap());
        adapter.set_available(false);
        assert!(!adapter.is_available().await.unwrap());
    }
}
