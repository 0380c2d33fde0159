//! Axum middleware stack.

pub mod rate_limit;
