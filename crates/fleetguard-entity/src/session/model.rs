//! Session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Durable record pairing one access token and one refresh token.
///
/// Only hashes of the tokens are stored. Rows are revoked, never
/// updated back to live, and only deleted by the retention sweep.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    /// Unique session identifier (time-ordered).
    pub id: Uuid,
    /// The principal this session belongs to.
    pub principal_id: Uuid,
    /// SHA-256 hex digest of the access token.
    pub access_token_hash: String,
    /// SHA-256 hex digest of the refresh token.
    pub refresh_token_hash: String,
    /// Client IP address at issuance.
    pub client_ip: Option<String>,
    /// User-Agent header at issuance.
    pub user_agent: Option<String>,
    /// When the access token expires.
    pub access_expires_at: DateTime<Utc>,
    /// When the refresh token expires.
    pub refresh_expires_at: DateTime<Utc>,
    /// Whether the session has been revoked.
    pub revoked: bool,
    /// When the session was revoked.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Why the session was revoked.
    pub revoked_reason: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Build the stored row for a freshly issued pair.
    pub fn from_new(new: NewSession) -> Self {
        Self {
            id: new.id,
            principal_id: new.principal_id,
            access_token_hash: new.access_token_hash,
            refresh_token_hash: new.refresh_token_hash,
            client_ip: new.client_ip,
            user_agent: new.user_agent,
            access_expires_at: new.access_expires_at,
            refresh_expires_at: new.refresh_expires_at,
            revoked: false,
            revoked_at: None,
            revoked_reason: None,
            created_at: new.created_at,
            updated_at: new.created_at,
        }
    }

    /// Not revoked and still refreshable at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.refresh_expires_at > now
    }

    /// Whether the access half of the pair has expired at `now`.
    pub fn access_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.access_expires_at <= now
    }

    /// Whether the refresh half of the pair has expired at `now`.
    pub fn refresh_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expires_at <= now
    }
}

/// Data required to persist a newly issued session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    /// Pre-generated session id.
    pub id: Uuid,
    /// Owning principal.
    pub principal_id: Uuid,
    /// SHA-256 hex digest of the access token.
    pub access_token_hash: String,
    /// SHA-256 hex digest of the refresh token.
    pub refresh_token_hash: String,
    /// Client IP address.
    pub client_ip: Option<String>,
    /// User-Agent header.
    pub user_agent: Option<String>,
    /// Access token expiry.
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiry.
    pub refresh_expires_at: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Why a session was moved to the revoked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    /// The user logged out of this session.
    Logout,
    /// The refresh token was used and replaced.
    RefreshRotation,
    /// Evicted to keep the principal under the concurrent-session limit.
    SessionLimitExceeded,
    /// "Log out everywhere" or forced deactivation.
    RevokeAll,
}

impl RevocationReason {
    /// Stable string stored in `revoked_reason`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::RefreshRotation => "refresh_rotation",
            Self::SessionLimitExceeded => "session_limit_exceeded",
            Self::RevokeAll => "revoke_all",
        }
    }
}

impl std::fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
