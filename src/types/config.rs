//! Per-request model parameters.
//!
//! These structures take part in cache key derivation, so every field that
//! changes the provider's answer must live here and be serialized.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};

/// Stop sequence(s) for chat completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequence {
    Single(String),
    Many(Vec<String>),
}

/// Parameters for a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequence>,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl ModelConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop: None,
        }
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn stop(mut self, stop: StopSequence) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Check parameter ranges accepted by OpenAI-compatible APIs.
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(invalid("model_name", "must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature", "must be between 0.0 and 2.0"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("max_tokens", "must be positive"));
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(invalid("top_p", "must be between 0.0 and 1.0"));
            }
        }
        for (field, value) in [
            ("frequency_penalty", self.frequency_penalty),
            ("presence_penalty", self.presence_penalty),
        ] {
            if let Some(v) = value {
                if !(-2.0..=2.0).contains(&v) {
                    return Err(invalid(field, "must be between -2.0 and 2.0"));
                }
            }
        }
        Ok(())
    }
}

/// Wire encoding requested for embedding vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    #[default]
    Float,
    Base64,
}

impl EncodingFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingFormat::Float => "float",
            EncodingFormat::Base64 => "base64",
        }
    }
}

/// Parameters for an embedding request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
    #[serde(default)]
    pub encoding_format: EncodingFormat,
}

impl EmbeddingConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            dimensions: None,
            encoding_format: EncodingFormat::Float,
        }
    }

    pub fn with_dimensions(mut self, dimensions: u32) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_encoding_format(mut self, format: EncodingFormat) -> Self {
        self.encoding_format = format;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(invalid("model_name", "must not be empty"));
        }
        if self.dimensions == Some(0) {
            return Err(invalid("dimensions", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &str, details: &str) -> Error {
    Error::validation_with_context(
        format!("invalid value for '{}'", field),
        ErrorContext::new()
            .with_field_path(format!("config.{}", field))
            .with_details(details)
            .with_source("model_config"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_defaults() {
        let cfg: ModelConfig = serde_json::from_str(r#"{"model_name":"gpt-4o"}"#).unwrap();
        assert_eq!(cfg, ModelConfig::new("gpt-4o"));
        assert_eq!(cfg.temperature, 0.7);
        assert_eq!(cfg.max_tokens, 1024);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_model_config_rejects_unknown_fields() {
        let res: std::result::Result<ModelConfig, _> =
            serde_json::from_str(r#"{"model_name":"m","seed":3}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_model_config_range_checks() {
        assert!(ModelConfig::new("m").temperature(2.5).validate().is_err());
        assert!(ModelConfig::new("m").max_tokens(0).validate().is_err());
        assert!(ModelConfig::new("m").top_p(1.5).validate().is_err());
        assert!(ModelConfig::new("  ").validate().is_err());

        let mut cfg = ModelConfig::new("m");
        cfg.presence_penalty = Some(-3.0);
        let err = cfg.validate().unwrap_err();
        let ctx = err.context().unwrap();
        assert_eq!(ctx.field_path.as_deref(), Some("config.presence_penalty"));
    }

    #[test]
    fn test_stop_sequence_accepts_string_or_list() {
        let one: StopSequence = serde_json::from_str(r#""END""#).unwrap();
        let many: StopSequence = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(one, StopSequence::Single("END".into()));
        assert_eq!(many, StopSequence::Many(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_embedding_config_validation() {
        assert!(EmbeddingConfig::new("e").validate().is_ok());
        assert!(EmbeddingConfig::new("e").with_dimensions(0).validate().is_err());
        let cfg: EmbeddingConfig =
            serde_json::from_str(r#"{"model_name":"e","encoding_format":"base64"}"#).unwrap();
        assert_eq!(cfg.encoding_format, EncodingFormat::Base64);
    }
}
