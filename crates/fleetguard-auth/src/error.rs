//! Authentication error taxonomy.

use thiserror::Error;

use fleetguard_core::error::{AppError, ErrorKind};

use crate::jwt::TokenKind;

/// Generic message returned for every credential or session failure.
///
/// Responses never reveal which check rejected the credential.
pub const GENERIC_AUTH_FAILURE: &str = "Invalid or expired credentials";

/// Errors produced by the signer and the token service.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The signing key or TTL is misconfigured.
    #[error("token signing failed: {0}")]
    Signing(String),
    /// The MAC does not match or the token uses another algorithm.
    #[error("token signature is invalid")]
    InvalidSignature,
    /// The claims could not be decoded or lack required fields.
    #[error("token is malformed")]
    MalformedToken,
    /// A token of one kind was presented where another was expected.
    #[error("expected a {expected} token, got {found}")]
    WrongKind {
        /// Kind required by the verification path.
        expected: TokenKind,
        /// Kind carried by the token.
        found: TokenKind,
    },
    /// The token (or its session's access half) has expired.
    #[error("token has expired")]
    ExpiredToken,
    /// No live session matches the token.
    #[error("session not found")]
    SessionNotFound,
    /// The matching session has been revoked.
    #[error("session has been revoked")]
    SessionRevoked,
    /// The backing account is missing or deactivated.
    #[error("principal is inactive")]
    PrincipalInactive,
    /// The new session row could not be written.
    #[error("failed to persist session: {0}")]
    SessionPersist(#[source] AppError),
    /// A session-store call exceeded its deadline.
    #[error("session store timed out: {0}")]
    Timeout(String),
    /// Any other session-store failure.
    #[error("session store error: {0}")]
    Store(#[source] AppError),
}

impl AuthError {
    /// Classify a store error, keeping deadline expiry distinct.
    pub fn from_store(err: AppError) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.message)
        } else {
            Self::Store(err)
        }
    }

    /// Classify a failed session insert.
    pub fn from_persist(err: AppError) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.message)
        } else {
            Self::SessionPersist(err)
        }
    }

    /// Whether this is a terminal credential/session rejection (HTTP 401).
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature
                | Self::MalformedToken
                | Self::WrongKind { .. }
                | Self::ExpiredToken
                | Self::SessionNotFound
                | Self::SessionRevoked
                | Self::PrincipalInactive
        )
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        if err.is_credential_failure() {
            return AppError::with_source(ErrorKind::Authentication, GENERIC_AUTH_FAILURE, err);
        }
        match err {
            AuthError::Signing(msg) => AppError::internal(format!("Token signing failed: {msg}")),
            AuthError::Timeout(msg) => AppError::timeout(msg),
            AuthError::SessionPersist(inner) | AuthError::Store(inner) => inner,
            other => AppError::internal(other.to_string()),
        }
    }
}
