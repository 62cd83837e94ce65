//! LLM client facade.
//!
//! Every request goes through the same steps: validate the input, check that
//! the provider is reachable, consult the cache, call the provider on a miss,
//! then store the fresh response. Implementation details are split into
//! submodules under `src/client/`.

pub mod builder;
pub mod core;
pub mod stats;

pub use builder::LlmClientBuilder;
pub use core::LlmClient;
pub use stats::{CacheStats, CacheStatsSnapshot};
