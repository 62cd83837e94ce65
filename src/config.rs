//! Application configuration.
//!
//! Sources are layered in this order, later ones winning:
//!
//! 1. built-in defaults
//! 2. a YAML file (a missing file only logs a warning)
//! 3. `MCE_`-prefixed environment variables
//!
//! The merged result is validated before it is returned.

use crate::cache::{CacheBackend, CacheKeyGenerator, FileCache, MemoryCache};
use crate::types::{EmbeddingConfig, ModelConfig};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const ENV_PREFIX: &str = "MCE_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            log_level: "INFO".to_string(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        crate::logging::parse_level(&self.log_level)?;
        self.llm.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub default_provider: String,
    pub default_model_name: String,
    pub default_embedding_model_name: String,
    pub providers: BTreeMap<String, ProviderSettings>,
    pub model_params: ModelParams,
    pub cache_enabled: bool,
    pub cache: CacheSettings,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            default_provider: "mock".to_string(),
            default_model_name: "mock-model".to_string(),
            default_embedding_model_name: "mock-embedding-model".to_string(),
            providers: BTreeMap::from([("mock".to_string(), ProviderSettings::default())]),
            model_params: ModelParams::default(),
            cache_enabled: true,
            cache: CacheSettings::default(),
        }
    }
}

impl LlmSettings {
    /// Settings for `name`, or defaults when the provider has no entry.
    pub fn provider_settings(&self, name: &str) -> ProviderSettings {
        self.providers.get(name).cloned().unwrap_or_default()
    }

    /// Chat parameters built from the defaults in this section.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::new(self.default_model_name.clone())
            .temperature(self.model_params.temperature)
            .max_tokens(self.model_params.max_tokens)
    }

    pub fn embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig::new(self.default_embedding_model_name.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_provider.trim().is_empty() {
            return Err(invalid("llm.default_provider", "must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.model_params.temperature) {
            return Err(invalid(
                "llm.model_params.temperature",
                "must be between 0.0 and 2.0",
            ));
        }
        if self.model_params.max_tokens == 0 {
            return Err(invalid("llm.model_params.max_tokens", "must be positive"));
        }
        self.cache.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: Option<Url>,
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    File,
}

impl FromStr for CacheBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => Err(invalid(
                "llm.cache.backend",
                format!("unknown backend '{}', expected memory or file", other),
            )),
        }
    }
}

/// Cache section of the configuration.
///
/// Sizes and TTLs are signed so that a negative value in YAML or the
/// environment is reported as invalid instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    pub default_ttl_secs: i64,
    pub cache_dir: PathBuf,
    pub max_file_size: i64,
    pub include_time_bucket: bool,
    pub time_bucket_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            default_ttl_secs: 3600,
            cache_dir: PathBuf::from(".mce_cache/llm"),
            max_file_size: 10 * 1024 * 1024,
            include_time_bucket: false,
            time_bucket_secs: 3600,
        }
    }
}

impl CacheSettings {
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl_secs <= 0 {
            return Err(invalid("llm.cache.default_ttl_secs", "TTL must be positive"));
        }
        if self.max_file_size <= 0 {
            return Err(invalid(
                "llm.cache.max_file_size",
                "max file size must be positive",
            ));
        }
        if self.include_time_bucket && self.time_bucket_secs == 0 {
            return Err(invalid(
                "llm.cache.time_bucket_secs",
                "bucket width must be positive when bucketing is enabled",
            ));
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs.max(0) as u64)
    }

    /// Construct the configured backend.
    pub fn build_backend(&self) -> Result<Arc<dyn CacheBackend>> {
        self.validate()?;
        let backend: Arc<dyn CacheBackend> = match self.backend {
            CacheBackendKind::Memory => Arc::new(MemoryCache::new(self.default_ttl())?),
            CacheBackendKind::File => Arc::new(FileCache::new(
                &self.cache_dir,
                self.default_ttl(),
                self.max_file_size as u64,
            )?),
        };
        debug!(backend = backend.name(), ttl_secs = self.default_ttl_secs, "cache backend ready");
        Ok(backend)
    }

    pub fn key_generator(&self) -> CacheKeyGenerator {
        let keygen = CacheKeyGenerator::new();
        if self.include_time_bucket {
            keygen.with_time_bucket(Duration::from_secs(self.time_bucket_secs))
        } else {
            keygen
        }
    }
}

fn invalid(field: &str, details: impl Into<String>) -> Error {
    Error::configuration_with_context(
        format!("invalid value for '{}'", field),
        ErrorContext::new()
            .with_field_path(field)
            .with_details(details)
            .with_source("config_loader"),
    )
}

/// Loads [`AppConfig`] from a YAML file and an environment snapshot.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    env: BTreeMap<String, String>,
}

impl ConfigLoader {
    /// Loader reading `MCE_*` variables from the process environment.
    pub fn from_process_env() -> Self {
        Self::with_env(std::env::vars())
    }

    /// Loader over an explicit set of variables. Names without the
    /// `MCE_` prefix are ignored.
    pub fn with_env<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect();
        Self { env }
    }

    pub fn load(&self, path: Option<&Path>) -> Result<AppConfig> {
        let mut config = match path {
            Some(p) if p.exists() => Self::load_file(p)?,
            Some(p) => {
                warn!(path = %p.display(), "config file not found, using defaults");
                AppConfig::default()
            }
            None => AppConfig::default(),
        };
        self.apply_env(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        let config = serde_yaml::from_str(&content)?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    fn apply_env(&self, config: &mut AppConfig) -> Result<()> {
        for (name, value) in &self.env {
            let key = &name[ENV_PREFIX.len()..];
            let llm = &mut config.llm;
            match key {
                "LOG_LEVEL" => config.log_level = value.clone(),
                "LLM_DEFAULT_PROVIDER" => llm.default_provider = value.clone(),
                "LLM_DEFAULT_MODEL_NAME" => llm.default_model_name = value.clone(),
                "LLM_DEFAULT_EMBEDDING_MODEL_NAME" => {
                    llm.default_embedding_model_name = value.clone()
                }
                "LLM_CACHE_ENABLED" => llm.cache_enabled = parse_env(name, value)?,
                "LLM_MODEL_PARAMS_TEMPERATURE" => {
                    llm.model_params.temperature = parse_env(name, value)?
                }
                "LLM_MODEL_PARAMS_MAX_TOKENS" => {
                    llm.model_params.max_tokens = parse_env(name, value)?
                }
                "LLM_CACHE_BACKEND" => llm.cache.backend = value.parse()?,
                "LLM_CACHE_DEFAULT_TTL_SECS" => {
                    llm.cache.default_ttl_secs = parse_env(name, value)?
                }
                "LLM_CACHE_DIR" => llm.cache.cache_dir = PathBuf::from(value),
                "LLM_CACHE_MAX_FILE_SIZE" => llm.cache.max_file_size = parse_env(name, value)?,
                "LLM_CACHE_INCLUDE_TIME_BUCKET" => {
                    llm.cache.include_time_bucket = parse_env(name, value)?
                }
                "LLM_CACHE_TIME_BUCKET_SECS" => {
                    llm.cache.time_bucket_secs = parse_env(name, value)?
                }
                _ => {
                    if let Some(rest) = key.strip_prefix("LLM_PROVIDERS_") {
                        apply_provider_env(llm, name, rest, value)?;
                    } else {
                        debug!(var = %name, "ignoring unknown config variable");
                    }
                }
            }
        }
        Ok(())
    }
}

// `<NAME>_API_KEY`, `<NAME>_BASE_URL`, `<NAME>_TIMEOUT_SECS`
fn apply_provider_env(llm: &mut LlmSettings, var: &str, rest: &str, value: &str) -> Result<()> {
    const FIELDS: [&str; 3] = ["_API_KEY", "_BASE_URL", "_TIMEOUT_SECS"];
    let Some((provider, field)) = FIELDS.iter().find_map(|f| {
        rest.strip_suffix(f)
            .filter(|p| !p.is_empty())
            .map(|p| (p.to_ascii_lowercase(), *f))
    }) else {
        debug!(var = %var, "ignoring unknown provider variable");
        return Ok(());
    };
    let settings = llm.providers.entry(provider).or_default();
    match field {
        "_API_KEY" => settings.api_key = Some(value.to_string()),
        "_BASE_URL" => settings.base_url = Some(parse_env(var, value)?),
        _ => settings.timeout_secs = parse_env(var, value)?,
    }
    Ok(())
}

fn parse_env<T>(var: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        Error::configuration_with_context(
            format!("cannot parse environment variable {}", var),
            ErrorContext::new()
                .with_field_path(var)
                .with_details(format!("value '{}': {}", value, e))
                .with_source("config_loader"),
        )
    })
}
