//! Core data types for LLM requests and responses.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChatMessage`] | Chat message with role and content |
//! | [`ModelConfig`] | Chat completion parameters |
//! | [`EmbeddingConfig`] | Embedding parameters |
//! | [`ChatResponse`] | Completion text, model and usage |
//! | [`EmbeddingResponse`] | One vector per input text |
//! | [`CachedResponse`] | Tagged union stored by cache backends |
//!
//! ## Example
//!
//! ```rust
//! use mce_llm::types::{ChatMessage, ModelConfig};
//!
//! let messages = vec![
//!     ChatMessage::system("You extract metadata from source code."),
//!     ChatMessage::user("List the tables referenced in this query."),
//! ];
//! let config = ModelConfig::new("gpt-4o-mini").temperature(0.0);
//! assert!(config.validate().is_ok());
//! # let _ = messages;
//! ```

pub mod config;
pub mod message;
pub mod response;

pub use config::{EmbeddingConfig, EncodingFormat, ModelConfig, StopSequence};
pub use message::{ChatMessage, MessageRole};
pub use response::{CachedResponse, ChatResponse, EmbeddingResponse, Usage};
