//! # fleetguard-entity
//!
//! Domain entity models for FleetGuard. Every struct in this crate
//! represents a database table row or a domain value object. Database
//! entities additionally derive `sqlx::FromRow`.

pub mod principal;
pub mod rate_limit;
pub mod session;
pub mod user;

pub use principal::Principal;
pub use rate_limit::{ANY_METHOD, NewRateLimitRule, RateLimitEvent, RateLimitRule, RuleScope};
pub use session::{NewSession, RevocationReason, Session};
pub use user::{Role, User};
