//! Embedding/result cache configuration.

use serde::{Deserialize, Serialize};

const fn default_embedding_capacity() -> usize {
    500
}

const fn default_embedding_ttl_secs() -> u64 {
    300
}

const fn default_result_capacity() -> usize {
    200
}

const fn default_result_ttl_secs() -> u64 {
    60
}

const fn default_cleaner_interval_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Query-text → embedding cache entries.
    #[serde(default = "default_embedding_capacity")]
    pub embedding_capacity: usize,

    #[serde(default = "default_embedding_ttl_secs")]
    pub embedding_ttl_secs: u64,

    /// (query, filter, k) → results cache entries.
    #[serde(default = "default_result_capacity")]
    pub result_capacity: usize,

    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,

    /// Background expiry sweep interval.
    #[serde(default = "default_cleaner_interval_secs")]
    pub cleaner_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            embedding_capacity: default_embedding_capacity(),
            embedding_ttl_secs: default_embedding_ttl_secs(),
            result_capacity: default_result_capacity(),
            result_ttl_secs: default_result_ttl_secs(),
            cleaner_interval_secs: default_cleaner_interval_secs(),
        }
    }
}
