//! Route definitions for the FleetGuard HTTP API.
//!
//! Auth and admin routes are mounted under `/api`; the rate limit
//! middleware wraps every route including `/health`.

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new().merge(auth_routes()).merge(admin_routes());

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api", api_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Session endpoints
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/logout-all", post(handlers::auth::logout_all))
        .route("/auth/me", get(handlers::auth::me))
}

/// Rate limit rule administration (admin and above)
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/rate-limits",
            get(handlers::admin::rate_limits::list).post(handlers::admin::rate_limits::create),
        )
        .route(
            "/admin/rate-limits/reload",
            post(handlers::admin::rate_limits::reload),
        )
        .route(
            "/admin/rate-limits/{id}",
            delete(handlers::admin::rate_limits::deactivate),
        )
}
