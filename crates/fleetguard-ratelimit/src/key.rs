//! Counter key construction.

use uuid::Uuid;

use fleetguard_entity::RuleScope;

/// Builds the counter key for a request.
///
/// Identity-scoped rules count per principal when one is known and fall
/// back to the client address for anonymous traffic.
pub fn counter_key(
    scope: RuleScope,
    principal_id: Option<Uuid>,
    client_address: &str,
    path: &str,
    method: &str,
) -> String {
    let method = method.to_ascii_uppercase();
    match (scope, principal_id) {
        (RuleScope::Identity, Some(id)) => format!("identity-scope:{id}:{path}:{method}"),
        _ => format!("address-scope:{client_address}:{path}:{method}"),
    }
}
