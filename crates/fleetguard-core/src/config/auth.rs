//! Credential signing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Longest accepted access token lifetime (one day).
pub const MAX_ACCESS_TTL_MINUTES: u64 = 24 * 60;
/// Longest accepted refresh token lifetime (one year).
pub const MAX_REFRESH_TTL_HOURS: u64 = 365 * 24;
/// Longest accepted password-reset token lifetime (one day).
pub const MAX_PASSWORD_RESET_TTL_MINUTES: u64 = 24 * 60;
/// Largest accepted clock-skew leeway.
pub const MAX_LEEWAY_SECONDS: u64 = 300;

/// Token signing and lifetime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret key for token signing (HMAC-SHA256).
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Issuer string embedded in and required on every token.
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// Access token TTL in minutes.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_minutes: u64,
    /// Refresh token TTL in hours.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_hours: u64,
    /// Password-reset token TTL in minutes.
    #[serde(default = "default_reset_ttl")]
    pub password_reset_ttl_minutes: u64,
    /// Clock-skew leeway applied to expiry checks, in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,
}

impl AuthConfig {
    /// Access token lifetime, clamped to [`MAX_ACCESS_TTL_MINUTES`].
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_minutes.min(MAX_ACCESS_TTL_MINUTES) * 60)
    }

    /// Refresh token lifetime, clamped to [`MAX_REFRESH_TTL_HOURS`].
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_hours.min(MAX_REFRESH_TTL_HOURS) * 60 * 60)
    }

    /// Password-reset token lifetime, clamped to [`MAX_PASSWORD_RESET_TTL_MINUTES`].
    pub fn password_reset_ttl(&self) -> Duration {
        Duration::from_secs(
            self.password_reset_ttl_minutes
                .min(MAX_PASSWORD_RESET_TTL_MINUTES)
                * 60,
        )
    }

    /// Reject lifetimes that are empty, out of range, or where the access
    /// token would outlive its refresh token.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.jwt_secret.len() < 32 {
            return Err(AppError::configuration(
                "auth.jwt_secret must be at least 32 bytes",
            ));
        }
        if self.access_ttl_minutes == 0
            || self.refresh_ttl_hours == 0
            || self.password_reset_ttl_minutes == 0
        {
            return Err(AppError::configuration("token TTLs must be positive"));
        }
        if self.access_ttl_minutes > MAX_ACCESS_TTL_MINUTES {
            return Err(AppError::configuration(format!(
                "auth.access_ttl_minutes must be at most {MAX_ACCESS_TTL_MINUTES}"
            )));
        }
        if self.refresh_ttl_hours > MAX_REFRESH_TTL_HOURS {
            return Err(AppError::configuration(format!(
                "auth.refresh_ttl_hours must be at most {MAX_REFRESH_TTL_HOURS}"
            )));
        }
        if self.password_reset_ttl_minutes > MAX_PASSWORD_RESET_TTL_MINUTES {
            return Err(AppError::configuration(format!(
                "auth.password_reset_ttl_minutes must be at most {MAX_PASSWORD_RESET_TTL_MINUTES}"
            )));
        }
        if self.leeway_seconds > MAX_LEEWAY_SECONDS {
            return Err(AppError::configuration(format!(
                "auth.leeway_seconds must be at most {MAX_LEEWAY_SECONDS}"
            )));
        }
        if self.access_ttl() > self.refresh_ttl() {
            return Err(AppError::configuration(
                "auth.access_ttl_minutes must not exceed auth.refresh_ttl_hours",
            ));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            issuer: default_issuer(),
            access_ttl_minutes: default_access_ttl(),
            refresh_ttl_hours: default_refresh_ttl(),
            password_reset_ttl_minutes: default_reset_ttl(),
            leeway_seconds: default_leeway(),
        }
    }
}

fn default_jwt_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_issuer() -> String {
    "fleetguard".to_string()
}

fn default_access_ttl() -> u64 {
    15
}

fn default_refresh_ttl() -> u64 {
    168
}

fn default_reset_ttl() -> u64 {
    30
}

fn default_leeway() -> u64 {
    5
}
