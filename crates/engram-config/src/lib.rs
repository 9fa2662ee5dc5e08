//! # engram-config
//!
//! Layered configuration loading for Engram using figment.
//!
//! Configuration sources (in priority order):
//! 1. Environment variables (`ENGRAM_*`, `__`-separated nesting)
//! 2. Project-level `.engram/config.toml`
//! 3. User-level `~/.config/engram/config.toml`
//! 4. Built-in defaults

pub mod cache;
pub mod embedding;
pub mod error;
pub mod expansion;
pub mod general;
pub mod openai;
pub mod rerank;
pub mod scoring;
pub mod session;
pub mod store;

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

pub use cache::CacheConfig;
pub use embedding::EmbeddingConfig;
pub use error::ConfigError;
pub use expansion::{ExpansionConfig, VocabTermSpec};
pub use general::GeneralConfig;
pub use openai::OpenAiConfig;
pub use rerank::RerankConfig;
pub use scoring::ScoringConfig;
pub use session::SessionConfig;
pub use store::StoreConfig;

/// Root configuration for the whole workspace.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngramConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub expansion: ExpansionConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// User-level config file path (`~/.config/engram/config.toml`).
#[must_use]
pub fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("engram")
        .join("config.toml")
}

/// Load configuration for a project rooted at `project_root`.
///
/// # Errors
///
/// Returns [`ConfigError::Figment`] when a source fails to parse or the
/// merged figure cannot be extracted.
pub fn load_from(project_root: &Path) -> Result<EngramConfig, ConfigError> {
    let config = Figment::from(Serialized::defaults(EngramConfig::default()))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(project_root.join(".engram").join("config.toml")))
        .merge(Env::prefixed("ENGRAM_").split("__"))
        .extract()?;
    Ok(config)
}

/// Load configuration from the current working directory.
///
/// # Errors
///
/// Same as [`load_from`].
pub fn load() -> Result<EngramConfig, ConfigError> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    load_from(&cwd)
}
