//! Rate limiting entities: configured rules and audit events.

pub mod event;
pub mod rule;

pub use event::RateLimitEvent;
pub use rule::{NewRateLimitRule, RateLimitRule, RuleScope, ANY_METHOD};
