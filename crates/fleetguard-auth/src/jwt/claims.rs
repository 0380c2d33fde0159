//! Claims carried by every FleetGuard token.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fleetguard_entity::Role;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived API credential.
    Access,
    /// Long-lived, single-use credential exchanged for a new pair.
    Refresh,
    /// One-off credential for the password reset flow.
    PasswordReset,
}

impl TokenKind {
    /// Stable wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::PasswordReset => "password_reset",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat claim set embedded in the compact token.
///
/// Access tokens carry the full principal snapshot; refresh tokens carry
/// only the subject; password-reset tokens carry the subject and email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the principal id.
    pub sub: Uuid,
    /// Issuer.
    pub iss: String,
    /// Issued-at (seconds since epoch).
    pub iat: i64,
    /// Not-before (seconds since epoch).
    pub nbf: i64,
    /// Expiry (seconds since epoch).
    pub exp: i64,
    /// Random token id so two tokens minted in the same second differ.
    pub jti: Uuid,
    /// Token purpose.
    pub kind: TokenKind,
    /// Principal email (access, password reset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Principal display name (access).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Role at issuance (access). Advisory only; validation re-reads the live record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Tenant at issuance (access).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
}

impl TokenClaims {
    /// The principal id from the subject claim.
    pub fn principal_id(&self) -> Uuid {
        self.sub
    }

    /// Whether the kind-specific claims are present.
    pub fn has_required_shape(&self) -> bool {
        match self.kind {
            TokenKind::Access => {
                self.email.is_some() && self.name.is_some() && self.role.is_some()
            }
            TokenKind::Refresh => true,
            TokenKind::PasswordReset => self.email.is_some(),
        }
    }

    /// `exp > iat >= nbf`.
    pub fn has_ordered_timestamps(&self) -> bool {
        self.exp > self.iat && self.iat >= self.nbf
    }
}
