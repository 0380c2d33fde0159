//! Concurrent-session limit enforcement.
//!
//! Counting and eviction are separate store calls, so concurrent issuance
//! across processes can overshoot the limit until the next issuance
//! catches up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use fleetguard_core::deadline::with_deadline;
use fleetguard_core::result::AppResult;
use fleetguard_core::types::SessionLimit;
use fleetguard_entity::{RevocationReason, Session};

use super::store::SessionStore;

/// Outcome of a limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitCheck {
    /// Whether a new session fits without evicting anything.
    pub allowed: bool,
    /// Oldest sessions to revoke so the post-insert count is within the limit.
    pub to_evict: Vec<Uuid>,
}

/// Picks the sessions to evict from `live`.
///
/// Oldest created-at first; ties go to the lower session id.
pub fn select_evictions(live: &[Session], limit: SessionLimit) -> LimitCheck {
    if !limit.is_reached_by(live.len()) {
        return LimitCheck {
            allowed: true,
            to_evict: Vec::new(),
        };
    }

    let mut ordered: Vec<&Session> = live.iter().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    LimitCheck {
        allowed: false,
        to_evict: ordered
            .into_iter()
            .take(limit.overflow_for(live.len()))
            .map(|s| s.id)
            .collect(),
    }
}

/// Enforces "at most N live sessions per principal".
#[derive(Clone)]
pub struct SessionLimiter {
    store: Arc<dyn SessionStore>,
    store_timeout: Duration,
}

impl std::fmt::Debug for SessionLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLimiter")
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl SessionLimiter {
    /// Creates a limiter over `store`.
    pub fn new(store: Arc<dyn SessionStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Counts the principal's live sessions against `limit`.
    pub async fn check_session_limit(
        &self,
        principal_id: Uuid,
        limit: SessionLimit,
    ) -> AppResult<LimitCheck> {
        if limit == SessionLimit::Unlimited {
            return Ok(LimitCheck {
                allowed: true,
                to_evict: Vec::new(),
            });
        }

        let live = with_deadline(
            self.store_timeout,
            "find_live_by_principal",
            self.store.find_live_by_principal(principal_id, Utc::now()),
        )
        .await?;

        Ok(select_evictions(&live, limit))
    }

    /// Bulk-revokes `ids`. Failures are logged and reported as zero.
    pub async fn revoke_oldest_sessions(
        &self,
        principal_id: Uuid,
        ids: &[Uuid],
        reason: RevocationReason,
    ) -> u64 {
        if ids.is_empty() {
            return 0;
        }

        match with_deadline(
            self.store_timeout,
            "revoke_sessions",
            self.store.revoke(ids, reason, Utc::now()),
        )
        .await
        {
            Ok(count) => {
                info!(
                    principal_id = %principal_id,
                    evicted = count,
                    reason = %reason,
                    "Evicted sessions over the concurrent limit"
                );
                count
            }
            Err(e) => {
                warn!(
                    principal_id = %principal_id,
                    requested = ids.len(),
                    error = %e,
                    "Failed to evict sessions; continuing"
                );
                0
            }
        }
    }

    /// Checks the limit and evicts as needed before a new session is added.
    ///
    /// Never fails: a principal mid-issuance keeps getting a session even
    /// if cleanup of old ones does not work.
    pub async fn enforce(&self, principal_id: Uuid, limit: SessionLimit) -> u64 {
        match self.check_session_limit(principal_id, limit).await {
            Ok(check) if check.allowed => 0,
            Ok(check) => {
                self.revoke_oldest_sessions(
                    principal_id,
                    &check.to_evict,
                    RevocationReason::SessionLimitExceeded,
                )
                .await
            }
            Err(e) => {
                warn!(
                    principal_id = %principal_id,
                    error = %e,
                    "Session limit check failed; issuing without eviction"
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration as ChronoDuration};
    use fleetguard_entity::NewSession;

    use super::*;
    use crate::session::MemorySessionStore;

    fn session_at(principal_id: Uuid, created_at: DateTime<Utc>) -> NewSession {
        NewSession {
            id: Uuid::now_v7(),
            principal_id,
            access_token_hash: Uuid::new_v4().simple().to_string(),
            refresh_token_hash: Uuid::new_v4().simple().to_string(),
            client_ip: None,
            user_agent: None,
            access_expires_at: created_at + ChronoDuration::minutes(15),
            refresh_expires_at: created_at + ChronoDuration::days(1),
            created_at,
        }
    }

    #[test]
    fn test_select_evictions_ties_break_on_id() {
        let principal = Uuid::new_v4();
        let at = Utc::now();
        let a = Session::from_new(session_at(principal, at));
        let b = Session::from_new(session_at(principal, at));
        let (low, high) = if a.id < b.id { (a, b) } else { (b, a) };

        let check = select_evictions(&[high, low.clone()], SessionLimit::Fixed(2));
        assert!(!check.allowed);
        assert_eq!(check.to_evict, vec![low.id]);
    }

    #[tokio::test]
    async fn test_under_limit_is_allowed() {
        let store = Arc::new(MemorySessionStore::new());
        let principal = Uuid::new_v4();
        store.create(session_at(principal, Utc::now())).await.unwrap();

        let limiter = SessionLimiter::new(store, std::time::Duration::from_secs(1));
        let check = limiter
            .check_session_limit(principal, SessionLimit::Fixed(2))
            .await
            .unwrap();
        assert!(check.allowed);
        assert!(check.to_evict.is_empty());
    }

    #[tokio::test]
    async fn test_over_limit_evicts_oldest() {
        let store = Arc::new(MemorySessionStore::new());
        let principal = Uuid::new_v4();
        let now = Utc::now();
        let mut created = Vec::new();
        for minutes_ago in [30, 20, 10, 5] {
            let s = store
                .create(session_at(principal, now - ChronoDuration::minutes(minutes_ago)))
                .await
                .unwrap();
            created.push(s.id);
        }

        let limiter = SessionLimiter::new(store.clone(), std::time::Duration::from_secs(1));
        let check = limiter
            .check_session_limit(principal, SessionLimit::Fixed(3))
            .await
            .unwrap();
        assert_eq!(check.to_evict, vec![created[0], created[1]]);

        let evicted = limiter.enforce(principal, SessionLimit::Fixed(3)).await;
        assert_eq!(evicted, 2);
        let live = store.find_live_by_principal(principal, now).await.unwrap();
        assert_eq!(live.len(), 2);
        let first = store.get(created[0]).await.unwrap();
        assert_eq!(
            first.revoked_reason.as_deref(),
            Some("session_limit_exceeded")
        );
    }

    #[tokio::test]
    async fn test_unlimited_skips_store() {
        let store = Arc::new(MemorySessionStore::new());
        let principal = Uuid::new_v4();
        for _ in 0..10 {
            store.create(session_at(principal, Utc::now())).await.unwrap();
        }
        let limiter = SessionLimiter::new(store, std::time::Duration::from_secs(1));
        let check = limiter
            .check_session_limit(principal, SessionLimit::Unlimited)
            .await
            .unwrap();
        assert!(check.allowed);
    }

    #[tokio::test]
    async fn test_revoke_empty_list_is_noop() {
        let store = Arc::new(MemorySessionStore::new());
        let limiter = SessionLimiter::new(store, std::time::Duration::from_secs(1));
        let count = limiter
            .revoke_oldest_sessions(Uuid::new_v4(), &[], RevocationReason::SessionLimitExceeded)
            .await;
        assert_eq!(count, 0);
    }
}
