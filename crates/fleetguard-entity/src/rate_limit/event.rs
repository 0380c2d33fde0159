//! Rate limit audit event entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One admission decision, appended to the audit log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RateLimitEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// Principal id when the request carried a verifiable identity.
    pub principal_id: Option<Uuid>,
    /// Client address as seen by the server.
    pub client_address: String,
    /// Request path.
    pub path: String,
    /// Request method.
    pub method: String,
    /// User-Agent header.
    pub user_agent: Option<String>,
    /// Whether the request was rejected.
    pub blocked: bool,
    /// The rule that governed the decision.
    pub rule_id: Uuid,
    /// When the decision was made.
    pub created_at: DateTime<Utc>,
}
