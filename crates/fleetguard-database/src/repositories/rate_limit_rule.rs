//! Rate limit rule repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use fleetguard_core::error::{AppError, ErrorKind};
use fleetguard_core::result::AppResult;
use fleetguard_entity::{NewRateLimitRule, RateLimitRule};
use fleetguard_ratelimit::{RuleRepository, RuleSource, prepare_new_rule};

/// PostgreSQL-backed rule source with admin mutations.
///
/// Precedence is creation order: `created_at`, then the time-ordered id.
#[derive(Debug, Clone)]
pub struct PgRateLimitRuleRepository {
    pool: PgPool,
}

impl PgRateLimitRuleRepository {
    /// Create a new rule repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleSource for PgRateLimitRuleRepository {
    async fn load_active_rules(&self) -> AppResult<Vec<RateLimitRule>> {
        sqlx::query_as::<_, RateLimitRule>(
            "SELECT * FROM rate_limit_rules WHERE is_active = TRUE ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to load active rate limit rules", e)
        })
    }
}

#[async_trait]
impl RuleRepository for PgRateLimitRuleRepository {
    async fn list_rules(&self) -> AppResult<Vec<RateLimitRule>> {
        sqlx::query_as::<_, RateLimitRule>(
            "SELECT * FROM rate_limit_rules ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list rate limit rules", e)
        })
    }

    async fn create_rule(&self, data: NewRateLimitRule) -> AppResult<RateLimitRule> {
        let data = prepare_new_rule(data)?;
        let now = Utc::now();

        sqlx::query_as::<_, RateLimitRule>(
            "INSERT INTO rate_limit_rules (id, name, path_pattern, method, max_requests, \
             window_seconds, scope, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $8) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.name)
        .bind(&data.path_pattern)
        .bind(&data.method)
        .bind(data.max_requests)
        .bind(data.window_seconds)
        .bind(data.scope)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to create rate limit rule", e)
        })
    }

    async fn deactivate_rule(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE rate_limit_rules SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to deactivate rate limit rule", e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Rate limit rule {id} not found")));
        }
        Ok(())
    }
}
