//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use fleetguard_auth::{RbacEnforcer, TokenService};
use fleetguard_core::config::AppConfig;
use fleetguard_ratelimit::{RateLimiter, RuleRepository, RuleSynchronizer};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// Application configuration
    pub config: Arc<AppConfig>,

    // ── Auth ─────────────────────────────────────────────────
    /// Token issuance, refresh, validation and revocation
    pub token_service: Arc<TokenService>,
    /// Role hierarchy predicate
    pub rbac_enforcer: Arc<RbacEnforcer>,

    // ── Rate limiting ────────────────────────────────────────
    /// Counter cache and current rule snapshot
    pub rate_limiter: Arc<RateLimiter>,
    /// Manual reload and sweep trigger
    pub rule_synchronizer: Arc<RuleSynchronizer>,
    /// Admin access to configured rules
    pub rule_repo: Arc<dyn RuleRepository>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("rate_limit_enabled", &self.config.rate_limit.enabled)
            .field("rule_synchronizer", &self.rule_synchronizer)
            .finish_non_exhaustive()
    }
}
