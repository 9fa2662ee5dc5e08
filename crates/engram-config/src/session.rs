//! Session orchestrator configuration.

use serde::{Deserialize, Serialize};

const fn default_session_timeout_secs() -> u64 {
    1800
}

const fn default_cleanup_interval_secs() -> u64 {
    300
}

const fn default_sync_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Idle age after which a session with no pending work is evicted.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    /// How often the background cleanup task runs.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Upper bound on a fire-and-forget vector sync triggered by a session.
    #[serde(default = "default_sync_timeout_secs")]
    pub sync_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: default_session_timeout_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            sync_timeout_secs: default_sync_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SessionConfig::default();
        assert_eq!(config.session_timeout_secs, 1800);
        assert_eq!(config.cleanup_interval_secs, 300);
        assert_eq!(config.sync_timeout_secs, 60);
    }
}
