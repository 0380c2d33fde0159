//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Scheduled maintenance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the scheduler is started.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron expression (with seconds) for the session retention sweep.
    #[serde(default = "default_purge_cron")]
    pub session_purge_cron: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            session_purge_cron: default_purge_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_purge_cron() -> String {
    "0 0 * * * *".to_string()
}
