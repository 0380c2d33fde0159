//! Concurrent session limit type.

use serde::{Deserialize, Serialize};

/// Maximum number of live sessions a principal may hold at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionLimit {
    /// A fixed maximum number of concurrent sessions.
    Fixed(u32),
    /// No per-principal limit.
    Unlimited,
}

impl SessionLimit {
    /// Check whether a principal holding `live_count` sessions must evict
    /// before another session can be added.
    pub fn is_reached_by(&self, live_count: usize) -> bool {
        match self {
            Self::Fixed(max) => live_count >= *max as usize,
            Self::Unlimited => false,
        }
    }

    /// Number of existing sessions that must go so that, after one more
    /// insertion, the principal holds at most the limit.
    pub fn overflow_for(&self, live_count: usize) -> usize {
        match self {
            Self::Fixed(max) => (live_count + 1).saturating_sub(*max as usize),
            Self::Unlimited => 0,
        }
    }

    /// Return the numeric limit, or `None` for unlimited.
    pub fn as_max(&self) -> Option<u32> {
        match self {
            Self::Fixed(max) => Some(*max),
            Self::Unlimited => None,
        }
    }
}

impl From<u32> for SessionLimit {
    /// Convert a `u32` to a `SessionLimit`. `0` means unlimited.
    fn from(value: u32) -> Self {
        if value == 0 {
            Self::Unlimited
        } else {
            Self::Fixed(value)
        }
    }
}
