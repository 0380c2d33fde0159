//! Fixed-window admission control in front of every route.

use axum::extract::{Request, State};
use axum::http::header::{HeaderName, HeaderValue, RETRY_AFTER, USER_AGENT};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use fleetguard_auth::TokenKind;
use fleetguard_core::error::AppError;
use fleetguard_ratelimit::{Admission, RateLimitDecision, RequestInfo};

use crate::error::ApiError;
use crate::extractors::{bearer_token, client_address};
use crate::state::AppState;

/// Requests allowed per window for the governing rule.
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// Requests left in the current window.
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Counts the request against the first matching rule.
///
/// Identity comes from a signature-verified bearer token only; no session
/// lookup happens here, so a revoked token still counts against its
/// principal. Blocked requests never reach the handler.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.config.rate_limit.enabled {
        return next.run(request).await;
    }

    let info = request_info(&state, &request);
    let admission = state.rate_limiter.check_request(&info).await;

    match admission {
        Admission::Unlimited => next.run(request).await,
        Admission::Decided { decision, .. } if decision.blocked => blocked_response(&decision),
        Admission::Decided { decision, .. } => {
            let mut response = next.run(request).await;
            insert_limit_headers(response.headers_mut(), &decision);
            response
        }
    }
}

fn request_info(state: &AppState, request: &Request) -> RequestInfo {
    let principal_id = bearer_token(request.headers())
        .and_then(|token| {
            state
                .token_service
                .signer()
                .verify(token, TokenKind::Access)
                .ok()
        })
        .map(|claims| claims.principal_id());

    RequestInfo {
        path: request.uri().path().to_string(),
        method: request.method().as_str().to_string(),
        principal_id,
        client_address: client_address(
            request.headers(),
            request.extensions(),
            &state.config.server,
        ),
        user_agent: request
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    }
}

/// 429 with `Retry-After` and the limit headers.
pub fn blocked_response(decision: &RateLimitDecision) -> Response {
    let mut response =
        ApiError(AppError::rate_limited("Too many requests, retry later")).into_response();

    let headers = response.headers_mut();
    headers.insert(RETRY_AFTER, HeaderValue::from(decision.retry_after_secs()));
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u32));
    response
}

fn insert_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
}
