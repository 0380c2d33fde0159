//! Rate limit audit event repository.

use async_trait::async_trait;
use sqlx::PgPool;

use fleetguard_core::error::{AppError, ErrorKind};
use fleetguard_core::result::AppResult;
use fleetguard_entity::RateLimitEvent;
use fleetguard_ratelimit::AuditSink;

/// Append-only writer for `rate_limit_events`.
#[derive(Debug, Clone)]
pub struct PgRateLimitEventRepository {
    pool: PgPool,
}

impl PgRateLimitEventRepository {
    /// Create a new event repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgRateLimitEventRepository {
    async fn record(&self, event: RateLimitEvent) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO rate_limit_events (id, principal_id, client_address, path, method, \
             user_agent, blocked, rule_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(event.id)
        .bind(event.principal_id)
        .bind(&event.client_address)
        .bind(&event.path)
        .bind(&event.method)
        .bind(&event.user_agent)
        .bind(event.blocked)
        .bind(event.rule_id)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to record rate limit event", e)
        })?;
        Ok(())
    }
}
