//! Admin-only handlers.

pub mod rate_limits;
