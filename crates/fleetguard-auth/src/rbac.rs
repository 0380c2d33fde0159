//! Role-hierarchy predicate consumed by the HTTP layer.

use fleetguard_core::error::AppError;
use fleetguard_entity::Role;

/// Stateless checks over `super_admin > admin > manager > member`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RbacEnforcer;

impl RbacEnforcer {
    /// Creates an enforcer.
    pub fn new() -> Self {
        Self
    }

    /// Checks whether the given role is at least the specified minimum role.
    pub fn require_minimum_role(&self, actual: &Role, minimum: &Role) -> Result<(), AppError> {
        if actual.has_at_least(minimum) {
            Ok(())
        } else {
            Err(AppError::authorization(format!(
                "Role '{actual}' is insufficient; minimum required: '{minimum}'"
            )))
        }
    }
}
