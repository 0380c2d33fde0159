//! Session repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use fleetguard_auth::SessionStore;
use fleetguard_core::error::{AppError, ErrorKind};
use fleetguard_core::result::AppResult;
use fleetguard_entity::{NewSession, RevocationReason, Session};

/// PostgreSQL-backed [`SessionStore`].
#[derive(Debug, Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    /// Create a new session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionRepository {
    async fn create(&self, new: NewSession) -> AppResult<Session> {
        sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (id, principal_id, access_token_hash, refresh_token_hash, \
             client_ip, user_agent, access_expires_at, refresh_expires_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) RETURNING *",
        )
        .bind(new.id)
        .bind(new.principal_id)
        .bind(&new.access_token_hash)
        .bind(&new.refresh_token_hash)
        .bind(&new.client_ip)
        .bind(&new.user_agent)
        .bind(new.access_expires_at)
        .bind(new.refresh_expires_at)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::with_source(ErrorKind::Conflict, "Session already exists", e)
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create session", e),
        })
    }

    async fn find_by_access_hash(&self, hash: &str) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE access_token_hash = $1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    "Failed to find session by access token",
                    e,
                )
            })
    }

    async fn find_by_refresh_hash(
        &self,
        hash: &str,
        principal_id: Uuid,
    ) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE refresh_token_hash = $1 AND principal_id = $2",
        )
        .bind(hash)
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                "Failed to find session by refresh token",
                e,
            )
        })
    }

    async fn find_live_by_principal(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions \
             WHERE principal_id = $1 AND revoked = FALSE AND refresh_expires_at > $2 \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(principal_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find live sessions", e)
        })
    }

    async fn revoke(
        &self,
        ids: &[Uuid],
        reason: RevocationReason,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE sessions SET revoked = TRUE, revoked_at = $3, revoked_reason = $2, updated_at = $3 \
             WHERE id = ANY($1) AND revoked = FALSE",
        )
        .bind(ids)
        .bind(reason.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to revoke sessions", e))?;
        Ok(result.rows_affected())
    }

    async fn revoke_all_for_principal(
        &self,
        principal_id: Uuid,
        reason: RevocationReason,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked = TRUE, revoked_at = $3, revoked_reason = $2, updated_at = $3 \
             WHERE principal_id = $1 AND revoked = FALSE",
        )
        .bind(principal_id)
        .bind(reason.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to revoke principal sessions", e)
        })?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE refresh_expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to purge expired sessions", e)
            })?;
        Ok(result.rows_affected())
    }
}
