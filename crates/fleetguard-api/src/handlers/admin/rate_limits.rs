//! Admin rate limit rule handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use fleetguard_core::error::AppError;
use fleetguard_entity::{NewRateLimitRule, RateLimitRule, Role};

use crate::dto::response::{ApiResponse, ReloadResponse};
use crate::error::ApiError;
use crate::extractors::AuthPrincipal;
use crate::state::AppState;

fn require_admin(state: &AppState, auth: &AuthPrincipal) -> Result<(), ApiError> {
    state
        .rbac_enforcer
        .require_minimum_role(&auth.role, &Role::Admin)?;
    Ok(())
}

/// POST /api/admin/rate-limits/reload
pub async fn reload(
    State(state): State<AppState>,
    auth: AuthPrincipal,
) -> Result<Json<ApiResponse<ReloadResponse>>, ApiError> {
    require_admin(&state, &auth)?;

    let report = state.rule_synchronizer.sync_now().await;
    let response = ReloadResponse::from_report(report).ok_or_else(|| {
        AppError::service_unavailable("Rule reload failed; previous rules remain active")
    })?;

    tracing::info!(
        principal_id = %auth.id,
        rules_loaded = response.rules_loaded,
        "Rate limit rules reloaded on request"
    );
    Ok(Json(ApiResponse::ok(response)))
}

/// GET /api/admin/rate-limits
pub async fn list(
    State(state): State<AppState>,
    auth: AuthPrincipal,
) -> Result<Json<ApiResponse<Vec<RateLimitRule>>>, ApiError> {
    require_admin(&state, &auth)?;

    let rules = state.rule_repo.list_rules().await?;
    Ok(Json(ApiResponse::ok(rules)))
}

/// POST /api/admin/rate-limits
pub async fn create(
    State(state): State<AppState>,
    auth: AuthPrincipal,
    Json(req): Json<NewRateLimitRule>,
) -> Result<(StatusCode, Json<ApiResponse<RateLimitRule>>), ApiError> {
    require_admin(&state, &auth)?;

    let rule = state.rule_repo.create_rule(req).await?;
    tracing::info!(
        principal_id = %auth.id,
        rule_id = %rule.id,
        path_pattern = %rule.path_pattern,
        "Rate limit rule created"
    );

    state.rule_synchronizer.sync_now().await;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(rule))))
}

/// DELETE /api/admin/rate-limits/{id}
pub async fn deactivate(
    State(state): State<AppState>,
    auth: AuthPrincipal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_admin(&state, &auth)?;

    state.rule_repo.deactivate_rule(id).await?;
    tracing::info!(principal_id = %auth.id, rule_id = %id, "Rate limit rule deactivated");

    state.rule_synchronizer.sync_now().await;
    Ok(StatusCode::NO_CONTENT)
}
