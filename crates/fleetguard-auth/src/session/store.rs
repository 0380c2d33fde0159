//! Durable session persistence contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use fleetguard_core::result::AppResult;
use fleetguard_entity::{NewSession, RevocationReason, Session};

/// Storage for session rows, looked up by token hash.
///
/// Implementations must make `revoke` conditional: only rows that are
/// still live flip, and the returned count is how many did. Refresh
/// rotation relies on that count to detect a lost race.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Persists a new, live session.
    async fn create(&self, new: NewSession) -> AppResult<Session>;

    /// Finds the session whose access token hashes to `hash`.
    async fn find_by_access_hash(&self, hash: &str) -> AppResult<Option<Session>>;

    /// Finds the session whose refresh token hashes to `hash` and belongs
    /// to `principal_id`.
    async fn find_by_refresh_hash(
        &self,
        hash: &str,
        principal_id: Uuid,
    ) -> AppResult<Option<Session>>;

    /// Non-revoked sessions whose refresh expiry is after `now`, oldest
    /// first (created-at, then id).
    async fn find_live_by_principal(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Session>>;

    /// Revokes the listed sessions that are not yet revoked.
    async fn revoke(
        &self,
        ids: &[Uuid],
        reason: RevocationReason,
        at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Revokes every non-revoked session of a principal.
    async fn revoke_all_for_principal(
        &self,
        principal_id: Uuid,
        reason: RevocationReason,
        at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Deletes rows whose refresh expiry is before `cutoff`.
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}
