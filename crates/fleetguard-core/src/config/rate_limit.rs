//! Rate limiter configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Rate limiter, rule synchronization, and audit queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether admission control is applied at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between rule reload / counter sweep ticks.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,
    /// Counters whose window ended longer ago than this are swept.
    #[serde(default = "default_sweep_grace")]
    pub sweep_grace_seconds: u64,
    /// Capacity of the bounded audit event queue.
    #[serde(default = "default_queue_capacity")]
    pub audit_queue_capacity: usize,
    /// What to do with an audit event when the queue is full.
    #[serde(default)]
    pub audit_backlog_policy: AuditBacklogPolicy,
    /// Deadline for rule loads, in milliseconds.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,
}

impl RateLimitConfig {
    /// The sync tick interval as a `Duration`.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_seconds)
    }

    /// The sweep grace period as a `Duration`.
    pub fn sweep_grace(&self) -> Duration {
        Duration::from_secs(self.sweep_grace_seconds)
    }

    /// The rule-load deadline as a `Duration`.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            sync_interval_seconds: default_sync_interval(),
            sweep_grace_seconds: default_sweep_grace(),
            audit_queue_capacity: default_queue_capacity(),
            audit_backlog_policy: AuditBacklogPolicy::default(),
            store_timeout_ms: default_store_timeout(),
        }
    }
}

/// Backlog policy for the audit queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditBacklogPolicy {
    /// Discard the new event and count it.
    #[default]
    Drop,
    /// Wait for queue capacity.
    Block,
}

impl std::fmt::Display for AuditBacklogPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Drop => write!(f, "drop"),
            Self::Block => write!(f, "block"),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sync_interval() -> u64 {
    300
}

fn default_sweep_grace() -> u64 {
    3600
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_store_timeout() -> u64 {
    2000
}
