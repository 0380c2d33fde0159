//! Authenticated principal value object.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::{Role, User};

/// Identity asserted by a validated token and its live backing account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique principal (user) id.
    pub id: Uuid,
    /// Login email address.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Current role.
    pub role: Role,
    /// Owning tenant, if any.
    pub tenant_id: Option<Uuid>,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
            tenant_id: user.tenant_id,
        }
    }
}
