//! Session retention sweep.

use std::sync::Arc;
use std::time::Duration;

use tracing;

use fleetguard_auth::TokenService;
use fleetguard_core::error::AppError;

/// Deletes session rows whose refresh expiry is older than the retention window.
#[derive(Debug)]
pub struct SessionPurgeJob {
    /// Token service owning the session store
    service: Arc<TokenService>,
    /// Grace period kept after refresh expiry
    retention: Duration,
}

impl SessionPurgeJob {
    /// Create a new purge job
    pub fn new(service: Arc<TokenService>, retention: Duration) -> Self {
        Self { service, retention }
    }

    /// Run one sweep
    pub async fn run(&self) -> Result<u64, AppError> {
        tracing::debug!(
            "Running session purge with retention of {}s",
            self.retention.as_secs()
        );

        let removed = self
            .service
            .purge_expired_sessions(self.retention)
            .await
            .map_err(AppError::from)?;

        tracing::info!("Session purge removed {} rows", removed);
        Ok(removed)
    }
}
