//! # fleetguard-database
//!
//! PostgreSQL connection management and the sqlx repositories that back
//! the session store, the principal directory, the rate limit rule source
//! and the rate limit audit sink.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{
    PgRateLimitEventRepository, PgRateLimitRuleRepository, PgSessionRepository,
    PgUserRepository,
};
