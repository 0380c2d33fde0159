//! Token service: issuance, rotation, validation and revocation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fleetguard_core::config::{AuthConfig, SessionConfig};
use fleetguard_core::deadline::with_deadline;
use fleetguard_core::error::AppError;
use fleetguard_core::result::AppResult;
use fleetguard_core::types::SessionLimit;
use fleetguard_entity::{NewSession, Principal, RevocationReason, Session};

use super::limiter::SessionLimiter;
use super::store::SessionStore;
use crate::error::AuthError;
use crate::hash::token_hash;
use crate::jwt::{IssuedToken, TokenKind, TokenSigner};
use crate::principal::PrincipalDirectory;

/// Raw tokens handed back to the client after issuance or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token.
    pub access_token: String,
    /// Single-use refresh token.
    pub refresh_token: String,
    /// Access token expiry.
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiry.
    pub refresh_expires_at: DateTime<Utc>,
    /// The session backing both tokens.
    pub session_id: Uuid,
}

/// Ties the signer, the session store and the live user record together.
pub struct TokenService {
    signer: Arc<TokenSigner>,
    store: Arc<dyn SessionStore>,
    directory: Arc<dyn PrincipalDirectory>,
    limiter: SessionLimiter,
    limit: SessionLimit,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
    reset_ttl: chrono::Duration,
    store_timeout: Duration,
    /// Per-principal issuance locks; `None` when serialization is off.
    issuance_locks: Option<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("limit", &self.limit)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("store_timeout", &self.store_timeout)
            .field("serialize_issuance", &self.issuance_locks.is_some())
            .finish()
    }
}

impl TokenService {
    /// Creates a token service from its collaborators and configuration.
    pub fn new(
        signer: Arc<TokenSigner>,
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn PrincipalDirectory>,
        auth: &AuthConfig,
        session: &SessionConfig,
    ) -> Self {
        let store_timeout = session.store_timeout();
        Self {
            signer,
            limiter: SessionLimiter::new(Arc::clone(&store), store_timeout),
            store,
            directory,
            limit: session.limit(),
            access_ttl: lifetime(auth.access_ttl()),
            refresh_ttl: lifetime(auth.refresh_ttl()),
            reset_ttl: lifetime(auth.password_reset_ttl()),
            store_timeout,
            issuance_locks: session.serialize_issuance.then(DashMap::new),
        }
    }

    /// The signer, for callers that only need signature checks.
    pub fn signer(&self) -> &Arc<TokenSigner> {
        &self.signer
    }

    /// Mints a new access/refresh pair and persists its session.
    ///
    /// Sessions over the concurrent limit are evicted first (best effort).
    /// The caller has already verified the principal's credentials; no HTTP
    /// route reaches this except through refresh rotation.
    pub async fn issue_session_token_pair(
        &self,
        principal: &Principal,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<TokenPair, AuthError> {
        let lock = self.issuance_lock(principal.id);
        let guard = match &lock {
            Some(lock) => Some(Arc::clone(lock).lock_owned().await),
            None => None,
        };

        let result = self.issue_unserialized(principal, client_ip, user_agent).await;

        drop(guard);
        drop(lock);
        self.release_issuance_lock(principal.id);
        result
    }

    async fn issue_unserialized(
        &self,
        principal: &Principal,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access = self
            .signer
            .issue_at(principal, TokenKind::Access, self.access_ttl, now)?;
        let refresh = self
            .signer
            .issue_at(principal, TokenKind::Refresh, self.refresh_ttl, now)?;

        let evicted = self.limiter.enforce(principal.id, self.limit).await;

        let new = NewSession {
            id: Uuid::now_v7(),
            principal_id: principal.id,
            access_token_hash: token_hash(&access.token),
            refresh_token_hash: token_hash(&refresh.token),
            client_ip: client_ip.map(String::from),
            user_agent: user_agent.map(String::from),
            access_expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
            created_at: now,
        };

        let session = with_deadline(self.store_timeout, "create_session", self.store.create(new))
            .await
            .map_err(AuthError::from_persist)?;

        info!(
            principal_id = %principal.id,
            session_id = %session.id,
            evicted = evicted,
            "Session issued"
        );

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            access_expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
            session_id: session.id,
        })
    }

    /// Exchanges a refresh token for a new pair.
    ///
    /// The old session is revoked before the new one is issued, and only
    /// one concurrent caller can win that revocation.
    pub async fn refresh_session_token_pair(
        &self,
        refresh_token: &str,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<TokenPair, AuthError> {
        let claims = self.signer.verify(refresh_token, TokenKind::Refresh)?;
        let now = Utc::now();

        let session = self
            .store_call(
                "find_by_refresh_hash",
                self.store
                    .find_by_refresh_hash(&token_hash(refresh_token), claims.sub),
            )
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if session.revoked {
            warn!(
                principal_id = %claims.sub,
                session_id = %session.id,
                "Refresh token presented for a revoked session"
            );
            return Err(AuthError::SessionRevoked);
        }
        if session.refresh_expired_at(now) {
            return Err(AuthError::SessionNotFound);
        }

        let flipped = self
            .store_call(
                "revoke_session",
                self.store
                    .revoke(&[session.id], RevocationReason::RefreshRotation, now),
            )
            .await?;
        if flipped == 0 {
            warn!(
                principal_id = %claims.sub,
                session_id = %session.id,
                "Lost refresh rotation race"
            );
            return Err(AuthError::SessionRevoked);
        }

        let principal = self.load_active_principal(claims.sub).await?;
        debug!(principal_id = %principal.id, old_session_id = %session.id, "Rotating session");

        self.issue_session_token_pair(&principal, client_ip, user_agent)
            .await
    }

    /// Validates an access token against its live session and user record.
    pub async fn validate_access_token(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.signer.verify(token, TokenKind::Access)?;
        let session = self.live_session_for_access(token, claims.sub).await?;

        if session.access_expired_at(Utc::now()) {
            return Err(AuthError::ExpiredToken);
        }

        self.load_active_principal(claims.sub).await
    }

    /// Revokes the session behind `access_token` (logout).
    ///
    /// Returns whether this call flipped it; an already revoked session
    /// is not an error.
    pub async fn revoke_session(&self, access_token: &str) -> Result<bool, AuthError> {
        let claims = self.signer.verify(access_token, TokenKind::Access)?;
        let session = self
            .store_call(
                "find_by_access_hash",
                self.store.find_by_access_hash(&token_hash(access_token)),
            )
            .await?
            .filter(|s| s.principal_id == claims.sub)
            .ok_or(AuthError::SessionNotFound)?;

        if session.revoked {
            return Ok(false);
        }

        let flipped = self
            .store_call(
                "revoke_session",
                self.store
                    .revoke(&[session.id], RevocationReason::Logout, Utc::now()),
            )
            .await?;

        info!(principal_id = %claims.sub, session_id = %session.id, "Session logged out");
        Ok(flipped > 0)
    }

    /// Revokes every live session of a principal. Idempotent.
    pub async fn revoke_all_sessions(&self, principal_id: Uuid) -> Result<u64, AuthError> {
        let count = self
            .store_call(
                "revoke_all_for_principal",
                self.store.revoke_all_for_principal(
                    principal_id,
                    RevocationReason::RevokeAll,
                    Utc::now(),
                ),
            )
            .await?;

        info!(principal_id = %principal_id, revoked = count, "Revoked all sessions");
        Ok(count)
    }

    /// Deletes sessions whose refresh expiry is older than `retention`.
    pub async fn purge_expired_sessions(&self, retention: Duration) -> Result<u64, AuthError> {
        let cutoff = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|grace| Utc::now().checked_sub_signed(grace))
            .ok_or_else(|| {
                AuthError::Store(AppError::configuration("Retention window out of range"))
            })?;

        let removed = self
            .store_call(
                "delete_expired_before",
                self.store.delete_expired_before(cutoff),
            )
            .await?;

        if removed > 0 {
            info!(removed = removed, cutoff = %cutoff, "Purged expired sessions");
        }
        Ok(removed)
    }

    /// Mints a password-reset token for `principal`.
    pub fn issue_password_reset_token(
        &self,
        principal: &Principal,
    ) -> Result<IssuedToken, AuthError> {
        self.signer
            .issue(principal, TokenKind::PasswordReset, self.reset_ttl)
    }

    /// Verifies a password-reset token against the live user record.
    ///
    /// Returns the principal id and the email the token was minted for.
    pub async fn verify_password_reset_token(
        &self,
        token: &str,
    ) -> Result<(Uuid, String), AuthError> {
        let claims = self.signer.verify(token, TokenKind::PasswordReset)?;
        let email = claims.email.ok_or(AuthError::MalformedToken)?;
        let principal = self.load_active_principal(claims.sub).await?;

        if !principal.email.eq_ignore_ascii_case(&email) {
            return Err(AuthError::MalformedToken);
        }
        Ok((principal.id, email))
    }

    async fn live_session_for_access(
        &self,
        token: &str,
        principal_id: Uuid,
    ) -> Result<Session, AuthError> {
        let session = self
            .store_call(
                "find_by_access_hash",
                self.store.find_by_access_hash(&token_hash(token)),
            )
            .await?
            .filter(|s| s.principal_id == principal_id)
            .ok_or(AuthError::SessionNotFound)?;

        if session.revoked {
            return Err(AuthError::SessionRevoked);
        }
        Ok(session)
    }

    async fn load_active_principal(&self, id: Uuid) -> Result<Principal, AuthError> {
        let user = self
            .store_call("find_user", self.directory.find_user(id))
            .await?
            .ok_or(AuthError::PrincipalInactive)?;

        if !user.is_active {
            return Err(AuthError::PrincipalInactive);
        }
        Ok(Principal::from(&user))
    }

    async fn store_call<T, F>(&self, operation: &str, fut: F) -> Result<T, AuthError>
    where
        F: Future<Output = AppResult<T>>,
    {
        with_deadline(self.store_timeout, operation, fut)
            .await
            .map_err(AuthError::from_store)
    }

    fn issuance_lock(&self, principal_id: Uuid) -> Option<Arc<Mutex<()>>> {
        self.issuance_locks.as_ref().map(|locks| {
            Arc::clone(
                locks
                    .entry(principal_id)
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .value(),
            )
        })
    }

    fn release_issuance_lock(&self, principal_id: Uuid) {
        if let Some(locks) = &self.issuance_locks {
            locks.remove_if(&principal_id, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

/// Converts a clamped config lifetime; a non-positive result is refused by the signer.
fn lifetime(ttl: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero())
}
