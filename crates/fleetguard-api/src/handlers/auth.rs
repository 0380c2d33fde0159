//! Auth handlers: refresh, logout, logout-all, me.

use axum::Json;
use axum::extract::State;
use validator::Validate;

use fleetguard_core::error::AppError;

use crate::dto::request::RefreshRequest;
use crate::dto::response::{
    ApiResponse, MessageResponse, PrincipalResponse, RevokedResponse, TokenResponse,
};
use crate::error::ApiError;
use crate::extractors::{AuthPrincipal, ClientMeta};
use crate::state::AppState;

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientMeta,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    req.validate()
        .map_err(|e| AppError::validation(format!("Invalid refresh request: {e}")))?;

    let pair = state
        .token_service
        .refresh_session_token_pair(
            &req.refresh_token,
            Some(&client.address),
            client.user_agent.as_deref(),
        )
        .await?;

    Ok(Json(ApiResponse::ok(TokenResponse::from(pair))))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthPrincipal,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.token_service.revoke_session(&auth.token).await?;

    Ok(Json(ApiResponse::ok(MessageResponse {
        message: "Logged out successfully".to_string(),
    })))
}

/// POST /api/auth/logout-all
pub async fn logout_all(
    State(state): State<AppState>,
    auth: AuthPrincipal,
) -> Result<Json<ApiResponse<RevokedResponse>>, ApiError> {
    let revoked = state.token_service.revoke_all_sessions(auth.id).await?;

    Ok(Json(ApiResponse::ok(RevokedResponse { revoked })))
}

/// GET /api/auth/me
pub async fn me(auth: AuthPrincipal) -> Json<ApiResponse<PrincipalResponse>> {
    Json(ApiResponse::ok(PrincipalResponse::from(&auth.principal)))
}
