//! Session management configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::SessionLimit;

/// Session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum concurrent live sessions per principal. `0` means unlimited.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
    /// Days a session row is kept after its refresh expiry before the
    /// retention sweep deletes it.
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    /// Deadline applied to every session-store call, in milliseconds.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,
    /// Serialize issuance per principal inside this process.
    #[serde(default = "default_true")]
    pub serialize_issuance: bool,
}

impl SessionConfig {
    /// The configured concurrent-session limit.
    pub fn limit(&self) -> SessionLimit {
        SessionLimit::from(self.max_concurrent)
    }

    /// The store deadline as a `Duration`.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// The retention grace window as a `Duration`.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            retention_days: default_retention_days(),
            store_timeout_ms: default_store_timeout(),
            serialize_issuance: default_true(),
        }
    }
}

fn default_max_concurrent() -> u32 {
    5
}

fn default_retention_days() -> u64 {
    7
}

fn default_store_timeout() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}
