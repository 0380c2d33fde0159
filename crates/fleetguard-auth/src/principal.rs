//! Live account lookup used when validating tokens.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use fleetguard_core::error::AppError;
use fleetguard_core::result::AppResult;
use fleetguard_entity::{Role, User};

/// Read access to the durable user record.
///
/// Validation calls this on every request so that deactivation and role
/// changes apply before the token expires.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync + 'static {
    /// Fetch the current user row, or `None` if it no longer exists.
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;
}

/// In-memory directory for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryPrincipalDirectory {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryPrincipalDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user.
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    /// Flips the active flag.
    pub async fn set_active(&self, id: Uuid, active: bool) -> AppResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("User {id} not found")))?;
        user.is_active = active;
        user.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Changes the role.
    pub async fn set_role(&self, id: Uuid, role: Role) -> AppResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("User {id} not found")))?;
        user.role = role;
        user.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[async_trait]
impl PrincipalDirectory for MemoryPrincipalDirectory {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}
