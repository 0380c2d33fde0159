//! In-memory session store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use fleetguard_core::error::AppError;
use fleetguard_core::result::AppResult;
use fleetguard_entity::{NewSession, RevocationReason, Session};

use super::store::SessionStore;

/// Session store backed by a `HashMap`, for tests and single-node runs.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches a session by id.
    pub async fn get(&self, id: Uuid) -> Option<Session> {
        self.sessions.lock().await.get(&id).cloned()
    }

    /// All sessions of a principal regardless of state, oldest first.
    pub async fn all_for_principal(&self, principal_id: Uuid) -> Vec<Session> {
        let sessions = self.sessions.lock().await;
        let mut out: Vec<Session> = sessions
            .values()
            .filter(|s| s.principal_id == principal_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    /// Total number of rows.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether the store holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

fn mark_revoked(session: &mut Session, reason: RevocationReason, at: DateTime<Utc>) {
    session.revoked = true;
    session.revoked_at = Some(at);
    session.revoked_reason = Some(reason.as_str().to_string());
    session.updated_at = at;
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, new: NewSession) -> AppResult<Session> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&new.id) {
            return Err(AppError::conflict(format!("Session {} already exists", new.id)));
        }
        let session = Session::from_new(new);
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_by_access_hash(&self, hash: &str) -> AppResult<Option<Session>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .values()
            .find(|s| s.access_token_hash == hash)
            .cloned())
    }

    async fn find_by_refresh_hash(
        &self,
        hash: &str,
        principal_id: Uuid,
    ) -> AppResult<Option<Session>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .values()
            .find(|s| s.refresh_token_hash == hash && s.principal_id == principal_id)
            .cloned())
    }

    async fn find_live_by_principal(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Session>> {
        let sessions = self.sessions.lock().await;
        let mut live: Vec<Session> = sessions
            .values()
            .filter(|s| s.principal_id == principal_id && s.is_live_at(now))
            .cloned()
            .collect();
        live.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(live)
    }

    async fn revoke(
        &self,
        ids: &[Uuid],
        reason: RevocationReason,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut sessions = self.sessions.lock().await;
        let mut flipped = 0;
        for id in ids {
            if let Some(session) = sessions.get_mut(id) {
                if !session.revoked {
                    mark_revoked(session, reason, at);
                    flipped += 1;
                }
            }
        }
        Ok(flipped)
    }

    async fn revoke_all_for_principal(
        &self,
        principal_id: Uuid,
        reason: RevocationReason,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut sessions = self.sessions.lock().await;
        let mut flipped = 0;
        for session in sessions
            .values_mut()
            .filter(|s| s.principal_id == principal_id && !s.revoked)
        {
            mark_revoked(session, reason, at);
            flipped += 1;
        }
        Ok(flipped)
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.refresh_expires_at >= cutoff);
        Ok((before - sessions.len()) as u64)
    }
}
