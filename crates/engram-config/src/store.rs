//! Vector store configuration.

use serde::{Deserialize, Serialize};

fn default_backend() -> String {
    "duckdb".to_string()
}

fn default_db_path() -> String {
    ".engram/vectors.duckdb".to_string()
}

const fn default_bulk_cooldown_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Backend variant: `duckdb` (on-disk or `:memory:`) or `memory`
    /// (process-local brute force, mainly for tests).
    #[serde(default = "default_backend")]
    pub backend: String,

    /// DuckDB database path; `:memory:` for an ephemeral store.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Minimum seconds between bulk-import runs.
    #[serde(default = "default_bulk_cooldown_secs")]
    pub bulk_cooldown_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            db_path: default_db_path(),
            bulk_cooldown_secs: default_bulk_cooldown_secs(),
        }
    }
}
