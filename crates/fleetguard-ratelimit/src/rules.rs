//! Rule compilation and lookup.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

use fleetguard_core::error::AppError;
use fleetguard_core::result::AppResult;
use fleetguard_entity::{ANY_METHOD, NewRateLimitRule, RateLimitRule, RuleScope};

/// Parsed form of a rule's path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Matches one path exactly.
    Exact(String),
    /// `/admin/*`: matches `/admin` and anything below it.
    Segment(String),
    /// `/api*`: plain string prefix.
    Prefix(String),
    /// `*`: matches every path.
    CatchAll,
}

impl PathPattern {
    /// Parses a stored pattern.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "*" {
            Self::CatchAll
        } else if let Some(base) = raw.strip_suffix("/*") {
            Self::Segment(base.to_string())
        } else if let Some(base) = raw.strip_suffix('*') {
            Self::Prefix(base.to_string())
        } else {
            Self::Exact(raw.to_string())
        }
    }

    /// Whether `path` falls under this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == p,
            Self::Segment(base) => {
                path == base
                    || path
                        .strip_prefix(base.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            Self::Prefix(base) => path.starts_with(base.as_str()),
            Self::CatchAll => true,
        }
    }
}

/// A rule ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: RateLimitRule,
    pattern: PathPattern,
    max_requests: u32,
    window: Duration,
}

impl CompiledRule {
    /// Compiles `rule`, or `None` if its limits are unusable.
    pub fn compile(rule: RateLimitRule) -> Option<Self> {
        let max_requests = u32::try_from(rule.max_requests).ok()?;
        let window_secs = u64::try_from(rule.window_seconds).ok().filter(|w| *w > 0)?;
        Some(Self {
            pattern: PathPattern::parse(&rule.path_pattern),
            max_requests,
            window: Duration::from_secs(window_secs),
            rule,
        })
    }

    /// Rule id.
    pub fn id(&self) -> Uuid {
        self.rule.id
    }

    /// Rule name.
    pub fn name(&self) -> &str {
        &self.rule.name
    }

    /// Counting scope.
    pub fn scope(&self) -> RuleScope {
        self.rule.scope
    }

    /// Requests allowed per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether this rule governs `path` + `method`.
    pub fn matches(&self, path: &str, method: &str) -> bool {
        (self.rule.method.eq_ignore_ascii_case(ANY_METHOD)
            || self.rule.method.eq_ignore_ascii_case(method))
            && self.pattern.matches(path)
    }
}

/// Immutable, ordered set of active rules. Replaced wholesale on reload.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// An empty set: nothing is limited.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a set from rules in load order.
    ///
    /// Inactive rules are skipped; rules with a non-positive window or a
    /// negative maximum are dropped with a warning.
    pub fn from_rules(rules: Vec<RateLimitRule>) -> Self {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules.into_iter().filter(|r| r.is_active) {
            let (id, name) = (rule.id, rule.name.clone());
            match CompiledRule::compile(rule) {
                Some(c) => compiled.push(c),
                None => warn!(
                    rule_id = %id,
                    rule = %name,
                    "Skipping rate limit rule with invalid limits"
                ),
            }
        }
        Self { rules: compiled }
    }

    /// First rule, in load order, that governs the request.
    pub fn find_rule(&self, path: &str, method: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.matches(path, method))
    }

    /// Number of usable rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are loaded.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Where the active rule list is loaded from.
#[async_trait]
pub trait RuleSource: Send + Sync + 'static {
    /// All active rules, in precedence order.
    async fn load_active_rules(&self) -> AppResult<Vec<RateLimitRule>>;
}

/// Admin-side rule storage. Changes apply at the next reload.
#[async_trait]
pub trait RuleRepository: RuleSource {
    /// Every rule, active or not, in precedence order.
    async fn list_rules(&self) -> AppResult<Vec<RateLimitRule>>;

    /// Validates and appends a rule (lowest precedence).
    async fn create_rule(&self, data: NewRateLimitRule) -> AppResult<RateLimitRule>;

    /// Marks a rule inactive.
    async fn deactivate_rule(&self, id: Uuid) -> AppResult<()>;
}

/// Validates a new rule and returns it with its method normalized.
pub fn prepare_new_rule(mut data: NewRateLimitRule) -> AppResult<NewRateLimitRule> {
    data.validate()
        .map_err(|e| AppError::validation(format!("Invalid rate limit rule: {e}")))?;
    data.method = if data.method.eq_ignore_ascii_case(ANY_METHOD) {
        ANY_METHOD.to_string()
    } else {
        data.method.to_ascii_uppercase()
    };
    data.path_pattern = data.path_pattern.trim().to_string();
    Ok(data)
}

/// Rule source over an in-memory, replaceable list. Used for bootstrap and tests.
#[derive(Debug, Default)]
pub struct StaticRuleSource {
    rules: RwLock<Vec<RateLimitRule>>,
}

impl StaticRuleSource {
    /// Creates a source serving `rules`.
    pub fn new(rules: Vec<RateLimitRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Replaces the served rules.
    pub async fn set_rules(&self, rules: Vec<RateLimitRule>) {
        *self.rules.write().await = rules;
    }
}

#[async_trait]
impl RuleSource for StaticRuleSource {
    async fn load_active_rules(&self) -> AppResult<Vec<RateLimitRule>> {
        Ok(self
            .rules
            .read()
            .await
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RuleRepository for StaticRuleSource {
    async fn list_rules(&self) -> AppResult<Vec<RateLimitRule>> {
        Ok(self.rules.read().await.clone())
    }

    async fn create_rule(&self, data: NewRateLimitRule) -> AppResult<RateLimitRule> {
        let data = prepare_new_rule(data)?;
        let now = Utc::now();
        let rule = RateLimitRule {
            id: Uuid::now_v7(),
            name: data.name,
            path_pattern: data.path_pattern,
            method: data.method,
            max_requests: data.max_requests,
            window_seconds: data.window_seconds,
            scope: data.scope,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.rules.write().await.push(rule.clone());
        Ok(rule)
    }

    async fn deactivate_rule(&self, id: Uuid) -> AppResult<()> {
        let mut rules = self.rules.write().await;
        let rule = rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::not_found(format!("Rate limit rule {id} not found")))?;
        rule.is_active = false;
        rule.updated_at = Utc::now();
        Ok(())
    }
}
