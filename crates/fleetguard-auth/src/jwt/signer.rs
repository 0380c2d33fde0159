//! HS256 token issuing and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use fleetguard_core::config::AuthConfig;
use fleetguard_entity::Principal;

use super::claims::{TokenClaims, TokenKind};
use crate::error::AuthError;

/// A freshly minted token and the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact `header.claims.signature` string.
    pub token: String,
    /// Claims that were signed.
    pub claims: TokenClaims,
    /// Expiry, truncated to whole seconds like the `exp` claim.
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies tokens with a single shared HMAC secret.
///
/// Holds no state beyond the key material, issuer and leeway, so a
/// single instance is shared freely behind an `Arc`.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    validation: Validation,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("issuer", &self.issuer)
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenSigner {
    /// Creates a signer from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = config.leeway_seconds;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            validation,
        }
    }

    /// Mints a token of `kind` for `principal`, valid for `ttl` from now.
    pub fn issue(
        &self,
        principal: &Principal,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<IssuedToken, AuthError> {
        self.issue_at(principal, kind, ttl, Utc::now())
    }

    /// Mints a token as if the clock read `now`.
    pub fn issue_at(
        &self,
        principal: &Principal,
        kind: TokenKind,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        if ttl <= Duration::zero() {
            return Err(AuthError::Signing(format!(
                "non-positive TTL for {kind} token"
            )));
        }

        let iat = now.timestamp();
        let exp = iat + ttl.num_seconds().max(1);
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| AuthError::Signing(format!("expiry {exp} out of range")))?;

        let (email, name, role, tenant_id) = match kind {
            TokenKind::Access => (
                Some(principal.email.clone()),
                Some(principal.display_name.clone()),
                Some(principal.role),
                principal.tenant_id,
            ),
            TokenKind::Refresh => (None, None, None, None),
            TokenKind::PasswordReset => (Some(principal.email.clone()), None, None, None),
        };

        let claims = TokenClaims {
            sub: principal.id,
            iss: self.issuer.clone(),
            iat,
            nbf: iat,
            exp,
            jti: Uuid::new_v4(),
            kind,
            email,
            name,
            role,
            tenant_id,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(format!("failed to encode {kind} token: {e}")))?;

        Ok(IssuedToken {
            token,
            claims,
            expires_at,
        })
    }

    /// Verifies signature, algorithm, issuer, expiry and kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                JwtErrorKind::InvalidSignature
                | JwtErrorKind::InvalidAlgorithm
                | JwtErrorKind::InvalidAlgorithmName
                | JwtErrorKind::MissingAlgorithm => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            })?;
        let claims = data.claims;

        if claims.kind != expected {
            return Err(AuthError::WrongKind {
                expected,
                found: claims.kind,
            });
        }
        if !claims.has_required_shape() || !claims.has_ordered_timestamps() {
            return Err(AuthError::MalformedToken);
        }

        Ok(claims)
    }
}
