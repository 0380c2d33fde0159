//! sqlx repositories implementing the store, directory, source and sink traits.

pub mod rate_limit_event;
pub mod rate_limit_rule;
pub mod session;
pub mod user;

pub use rate_limit_event::PgRateLimitEventRepository;
pub use rate_limit_rule::PgRateLimitRuleRepository;
pub use session::PgSessionRepository;
pub use user::PgUserRepository;
