//! Fixed-window counter cache and admission decisions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fleetguard_core::deadline::with_deadline;
use fleetguard_core::result::AppResult;
use fleetguard_entity::RateLimitEvent;

use crate::audit::AuditDispatcher;
use crate::key::counter_key;
use crate::rules::{CompiledRule, RuleSet, RuleSource};

/// What the HTTP layer knows about a request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Request path.
    pub path: String,
    /// Request method.
    pub method: String,
    /// Principal from a signature-verified bearer token, if any.
    pub principal_id: Option<Uuid>,
    /// Client address.
    pub client_address: String,
    /// User-Agent header.
    pub user_agent: Option<String>,
}

/// Result of counting one request against a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request exceeded the rule.
    pub blocked: bool,
    /// Requests allowed per window.
    pub limit: u32,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Time until the window resets.
    pub retry_after: Duration,
}

impl RateLimitDecision {
    /// `Retry-After` value: whole seconds until reset, rounded up, at least 1.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        let rounded = if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        };
        rounded.max(1)
    }
}

/// Outcome of [`RateLimiter::check_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// No rule governs the request.
    Unlimited,
    /// A rule governed the request.
    Decided {
        /// The matching rule.
        rule_id: Uuid,
        /// The counting outcome.
        decision: RateLimitDecision,
    },
}

impl Admission {
    /// Whether the request must be rejected.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Decided { decision, .. } if decision.blocked)
    }
}

#[derive(Debug, Clone)]
struct Counter {
    count: u64,
    reset_at: Instant,
    blocked: bool,
}

/// Owns the counter cache and the current rule snapshot.
///
/// The counter lock is held only for map operations; audit dispatch and
/// rule loading happen outside it.
#[derive(Debug)]
pub struct RateLimiter {
    counters: Mutex<HashMap<String, Counter>>,
    rules: RwLock<Arc<RuleSet>>,
    audit: Option<AuditDispatcher>,
}

impl RateLimiter {
    /// Creates a limiter with an initial rule set.
    pub fn new(rules: RuleSet) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            rules: RwLock::new(Arc::new(rules)),
            audit: None,
        }
    }

    /// Attaches the audit queue producer.
    pub fn with_audit(mut self, audit: AuditDispatcher) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Current rule snapshot.
    pub async fn rules(&self) -> Arc<RuleSet> {
        Arc::clone(&*self.rules.read().await)
    }

    /// Swaps in a new rule set. Readers see the old set or the new one, never a mix.
    pub async fn replace_rules(&self, rules: RuleSet) {
        let count = rules.len();
        *self.rules.write().await = Arc::new(rules);
        debug!(rules = count, "Rate limit rules replaced");
    }

    /// Loads the active rules from `source` and swaps them in.
    ///
    /// On failure or timeout the previous set stays authoritative.
    pub async fn reload_rules(
        &self,
        source: &dyn RuleSource,
        timeout: Duration,
    ) -> AppResult<usize> {
        match with_deadline(timeout, "load_active_rules", source.load_active_rules()).await {
            Ok(rules) => {
                let set = RuleSet::from_rules(rules);
                let count = set.len();
                self.replace_rules(set).await;
                info!(rules = count, "Rate limit rules reloaded");
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "Rate limit rule reload failed; keeping previous rules");
                Err(e)
            }
        }
    }

    /// Counts one request under `key` against `rule`.
    ///
    /// The read-modify-write happens under a single lock, so concurrent
    /// requests on the same key are counted exactly.
    pub async fn check_and_increment(
        &self,
        key: &str,
        rule: &CompiledRule,
    ) -> RateLimitDecision {
        let now = Instant::now();
        let window = rule.window();
        let max = rule.max_requests();

        let mut counters = self.counters.lock().await;
        let counter = counters.entry(key.to_string()).or_insert_with(|| Counter {
            count: 0,
            reset_at: now + window,
            blocked: false,
        });

        if now >= counter.reset_at {
            counter.count = 0;
            counter.reset_at = now + window;
            counter.blocked = false;
        }

        counter.count += 1;
        counter.blocked = counter.count > u64::from(max);

        RateLimitDecision {
            blocked: counter.blocked,
            limit: max,
            remaining: u64::from(max).saturating_sub(counter.count) as u32,
            retry_after: counter.reset_at.saturating_duration_since(now),
        }
    }

    /// Resolves the governing rule, counts the request and queues an audit event.
    pub async fn check_request(&self, request: &RequestInfo) -> Admission {
        let rules = self.rules().await;
        let Some(rule) = rules.find_rule(&request.path, &request.method) else {
            return Admission::Unlimited;
        };

        let key = counter_key(
            rule.scope(),
            request.principal_id,
            &request.client_address,
            &request.path,
            &request.method,
        );
        let decision = self.check_and_increment(&key, rule).await;

        if decision.blocked {
            warn!(
                key = %key,
                rule = %rule.name(),
                retry_after_secs = decision.retry_after_secs(),
                "Request rate limited"
            );
        }

        if let Some(audit) = &self.audit {
            audit
                .dispatch(RateLimitEvent {
                    id: Uuid::now_v7(),
                    principal_id: request.principal_id,
                    client_address: request.client_address.clone(),
                    path: request.path.clone(),
                    method: request.method.clone(),
                    user_agent: request.user_agent.clone(),
                    blocked: decision.blocked,
                    rule_id: rule.id(),
                    created_at: Utc::now(),
                })
                .await;
        }

        Admission::Decided {
            rule_id: rule.id(),
            decision,
        }
    }

    /// Drops counters whose window ended more than `grace` ago.
    pub async fn sweep_expired(&self, grace: Duration) -> usize {
        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        let before = counters.len();
        counters.retain(|_, c| now.saturating_duration_since(c.reset_at) <= grace);
        let removed = before - counters.len();
        if removed > 0 {
            debug!(removed = removed, remaining = counters.len(), "Swept expired counters");
        }
        removed
    }

    /// Number of live counters.
    pub async fn counter_count(&self) -> usize {
        self.counters.lock().await.len()
    }

    /// Whether the counter under `key` is currently marked blocked.
    pub async fn is_key_blocked(&self, key: &str) -> bool {
        let now = Instant::now();
        self.counters
            .lock()
            .await
            .get(key)
            .is_some_and(|c| c.blocked && now < c.reset_at)
    }
}
