//! # fleetguard-ratelimit
//!
//! Admission control per (identity-or-address, path, method) using fixed
//! windows. The counter cache and the rule snapshot are owned by a
//! [`RateLimiter`] instance that callers share through an `Arc`.
//!
//! ## Modules
//!
//! - `rules` — rule compilation, path matching, rule sources
//! - `key` — counter key construction
//! - `limiter` — counter cache and admission decisions
//! - `audit` — bounded audit queue and its worker
//! - `sync` — periodic rule reload and counter sweep

pub mod audit;
pub mod key;
pub mod limiter;
pub mod rules;
pub mod sync;

pub use audit::{AuditDispatcher, AuditSink, AuditWorker, MemoryAuditSink, audit_queue};
pub use limiter::{Admission, RateLimitDecision, RateLimiter, RequestInfo};
pub use rules::{
    CompiledRule, PathPattern, RuleRepository, RuleSet, RuleSource, StaticRuleSource,
    prepare_new_rule,
};
pub use sync::{RuleSynchronizer, SyncReport};
