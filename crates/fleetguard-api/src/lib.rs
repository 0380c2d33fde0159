//! # fleetguard-api
//!
//! HTTP boundary for FleetGuard built on Axum.
//!
//! Provides the rate limit middleware, the bearer-token extractor, the
//! mapping from `AppError` to status codes, and the thin auth and admin
//! routes that exercise the session engine.
//!
//! There is no login route. The first token pair is minted by whatever
//! verifies the principal's credentials, calling
//! `TokenService::issue_session_token_pair` directly; these routes only
//! rotate, inspect and revoke sessions that already exist.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
