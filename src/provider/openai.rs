//! OpenAI-compatible HTTP adapter.

use super::{ProviderAdapter, ProviderError, ProviderResult};
use crate::types::{
    ChatMessage, ChatResponse, EmbeddingConfig, EmbeddingResponse, ModelConfig, Usage,
};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const PROVIDER: &str = "openai";

pub struct OpenAiAdapter {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiAdapter {
    pub fn builder() -> OpenAiAdapterBuilder {
        OpenAiAdapterBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json(&self, path: &str, body: &Value) -> ProviderResult<Value> {
        let endpoint = self.endpoint(path);
        let response = self
            .http_client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| provider_error(format!("request to {} failed: {}", endpoint, e)))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| provider_error(format!("failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(provider_error(format!(
                "OpenAI API error ({}): {}",
                status,
                api_error_message(&text)
            )));
        }
        serde_json::from_str(&text)
            .map_err(|e| provider_error(format!("invalid JSON in response: {}", e)))
    }
}

fn provider_error(message: impl Into<String>) -> ProviderError {
    ProviderError::new(PROVIDER, message)
}

// Prefer `{"error": {"message": ..}}` when the body has it.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn parse_usage(value: &Value) -> Option<Usage> {
    let obj = value.as_object()?;
    let usage: Usage = obj
        .iter()
        .filter_map(|(k, v)| v.as_u64().map(|n| (k.clone(), n)))
        .collect();
    (!usage.is_empty()).then_some(usage)
}

fn chat_request_body(messages: &[ChatMessage], config: &ModelConfig) -> Value {
    let mut body = json!({
        "model": config.model_name,
        "messages": messages,
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
    });
    let optional = [
        ("top_p", config.top_p.map(Value::from)),
        ("frequency_penalty", config.frequency_penalty.map(Value::from)),
        ("presence_penalty", config.presence_penalty.map(Value::from)),
        (
            "stop",
            config
                .stop
                .as_ref()
                .and_then(|s| serde_json::to_value(s).ok()),
        ),
    ];
    for (name, value) in optional {
        if let Some(v) = value {
            body[name] = v;
        }
    }
    body
}

fn parse_chat_response(data: &Value) -> ProviderResult<ChatResponse> {
    let choice = data["choices"]
        .get(0)
        .ok_or_else(|| provider_error("response has no choices"))?;
    let content = choice["message"]["content"].as_str().unwrap_or_default();
    let model = data["model"].as_str().unwrap_or("unknown");
    let mut response = ChatResponse::new(content, model);
    response.usage = parse_usage(&data["usage"]);
    response.finish_reason = choice["finish_reason"].as_str().map(str::to_string);
    Ok(response)
}

fn decode_vector(value: &Value) -> ProviderResult<Vec<f32>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| provider_error("non-numeric embedding component"))
            })
            .collect(),
        // base64 of little-endian f32 components
        Value::String(encoded) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| provider_error(format!("invalid base64 embedding: {}", e)))?;
            if bytes.len() % 4 != 0 {
                return Err(provider_error("base64 embedding length is not a multiple of 4"));
            }
            Ok(bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect())
        }
        _ => Err(provider_error("missing embedding vector")),
    }
}

fn parse_embedding_response(data: &Value, expected: usize) -> ProviderResult<EmbeddingResponse> {
    let items = data["data"]
        .as_array()
        .ok_or_else(|| provider_error("missing 'data' array"))?;
    let mut indexed = items
        .iter()
        .enumerate()
        .map(|(pos, item)| {
            let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(pos);
            decode_vector(&item["embedding"]).map(|v| (index, v))
        })
        .collect::<ProviderResult<Vec<_>>>()?;
    indexed.sort_by_key(|(i, _)| *i);
    if indexed.len() != expected {
        return Err(provider_error(format!(
            "expected {} embeddings, got {}",
            expected,
            indexed.len()
        )));
    }
    if !indexed.iter().enumerate().all(|(pos, (index, _))| pos == *index) {
        return Err(provider_error(format!(
            "embedding indices do not cover 0..{}",
            expected
        )));
    }
    let model = data["model"].as_str().unwrap_or("unknown");
    let mut response =
        EmbeddingResponse::new(indexed.into_iter().map(|(_, v)| v).collect(), model);
    response.usage = parse_usage(&data["usage"]);
    Ok(response)
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        config: &ModelConfig,
    ) -> ProviderResult<ChatResponse> {
        debug!(model = %config.model_name, messages = messages.len(), "openai chat completion");
        let data = self
            .post_json("chat/completions", &chat_request_body(messages, config))
            .await?;
        parse_chat_response(&data)
    }

    async fn generate_embeddings(
        &self,
        texts: &[String],
        config: &EmbeddingConfig,
    ) -> ProviderResult<EmbeddingResponse> {
        debug!(model = %config.model_name, texts = texts.len(), "openai embeddings");
        let mut body = json!({
            "model": config.model_name,
            "input": texts,
            "encoding_format": config.encoding_format.as_str(),
        });
        if let Some(dims) = config.dimensions {
            body["dimensions"] = json!(dims);
        }
        let data = self.post_json("embeddings", &body).await?;
        parse_embedding_response(&data, texts.len())
    }

    async fn is_available(&self) -> ProviderResult<bool> {
        let endpoint = self.endpoint("models");
        match self
            .http_client
            .get(&endpoint)
            .bearer_auth(&self.api_key)
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "openai availability probe failed");
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

pub struct OpenAiAdapterBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: u64,
}

impl OpenAiAdapterBuilder {
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout_secs: 60,
        }
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Falls back to `OPENAI_API_KEY` when no key was given.
    pub fn build(self) -> Result<OpenAiAdapter> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::configuration("API key required for the openai provider"))?;
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {}", e)))?;
        Ok(OpenAiAdapter {
            http_client,
            base_url,
            api_key,
        })
    }
}

impl Default for OpenAiAdapterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
