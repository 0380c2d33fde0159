//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::role::Role;

/// The durable account record backing a principal.
///
/// Token validation re-reads this row so that role changes and
/// deactivation take effect before the token expires.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Login email address.
    pub email: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Role in the hierarchy.
    pub role: Role,
    /// Owning tenant (company); `None` for platform operators.
    pub tenant_id: Option<Uuid>,
    /// Whether the account may authenticate.
    pub is_active: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}
