//! Rate limit rule entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Method value matching every HTTP method.
pub const ANY_METHOD: &str = "ANY";

/// Whose traffic a rule counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rate_limit_scope", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    /// Count per authenticated principal (falls back to address when anonymous).
    Identity,
    /// Count per client address.
    Address,
}

/// Admin-configured admission rule.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RateLimitRule {
    /// Unique rule identifier.
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Exact path, prefix wildcard (`/admin/*`), or catch-all (`*`).
    pub path_pattern: String,
    /// HTTP method or `ANY`.
    pub method: String,
    /// Requests allowed per window.
    pub max_requests: i32,
    /// Window length in seconds.
    pub window_seconds: i32,
    /// Counting scope.
    pub scope: RuleScope,
    /// Inactive rules are never loaded.
    pub is_active: bool,
    /// When the rule was created.
    pub created_at: DateTime<Utc>,
    /// When the rule was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Data for creating a rule through the admin API.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewRateLimitRule {
    /// Human-readable name.
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Path pattern.
    #[validate(length(min = 1, max = 255))]
    pub path_pattern: String,
    /// HTTP method or `ANY`.
    #[validate(length(min = 1, max = 10))]
    pub method: String,
    /// Requests allowed per window.
    #[validate(range(min = 0))]
    pub max_requests: i32,
    /// Window length in seconds.
    #[validate(range(min = 1))]
    pub window_seconds: i32,
    /// Counting scope.
    pub scope: RuleScope,
}
