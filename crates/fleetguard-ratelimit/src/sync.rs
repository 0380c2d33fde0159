//! Periodic rule reload and counter sweep.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::info;

use fleetguard_core::config::RateLimitConfig;

use crate::limiter::RateLimiter;
use crate::rules::RuleSource;

/// Outcome of one synchronization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Rules loaded, or `None` if the reload failed and the old set was kept.
    pub rules_loaded: Option<usize>,
    /// Counters removed by the sweep.
    pub counters_swept: usize,
}

/// Background task keeping the limiter's rules fresh and its cache bounded.
pub struct RuleSynchronizer {
    limiter: Arc<RateLimiter>,
    source: Arc<dyn RuleSource>,
    interval: Duration,
    sweep_grace: Duration,
    load_timeout: Duration,
}

impl std::fmt::Debug for RuleSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSynchronizer")
            .field("interval", &self.interval)
            .field("sweep_grace", &self.sweep_grace)
            .field("load_timeout", &self.load_timeout)
            .finish()
    }
}

impl RuleSynchronizer {
    /// Creates a synchronizer from rate limit configuration.
    pub fn new(
        limiter: Arc<RateLimiter>,
        source: Arc<dyn RuleSource>,
        config: &RateLimitConfig,
    ) -> Self {
        Self {
            limiter,
            source,
            interval: config.sync_interval(),
            sweep_grace: config.sweep_grace(),
            load_timeout: config.store_timeout(),
        }
    }

    /// Reloads rules and sweeps counters once.
    ///
    /// A failed reload is logged by the limiter and leaves the old rules in place.
    pub async fn sync_now(&self) -> SyncReport {
        let rules_loaded = self
            .limiter
            .reload_rules(self.source.as_ref(), self.load_timeout)
            .await
            .ok();
        let counters_swept = self.limiter.sweep_expired(self.sweep_grace).await;
        SyncReport {
            rules_loaded,
            counters_swept,
        }
    }

    /// Ticks every interval until `cancel` flips to `true` or its sender is dropped.
    ///
    /// The first tick fires one interval after start; callers load the
    /// initial rules with [`sync_now`](Self::sync_now).
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Rate limit rule synchronizer started"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.sync_now().await;
                }
            }
        }

        info!("Rate limit rule synchronizer stopped");
    }

    /// Spawns [`run`](Self::run) on the runtime.
    pub fn spawn(self: Arc<Self>, cancel: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::tests::rule;
    use crate::rules::{CompiledRule, RuleSet, StaticRuleSource};

    fn config() -> RateLimitConfig {
        RateLimitConfig {
            sync_interval_seconds: 300,
            sweep_grace_seconds: 60,
            ..RateLimitConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_reloads_rules() {
        let limiter = Arc::new(RateLimiter::new(RuleSet::empty()));
        let source = Arc::new(StaticRuleSource::new(Vec::new()));
        let sync = Arc::new(RuleSynchronizer::new(
            limiter.clone(),
            source.clone(),
            &config(),
        ));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = sync.spawn(cancel_rx);

        source.set_rules(vec![rule("/login", "POST", 5, 60)]).await;
        assert!(limiter.rules().await.is_empty());

        time::sleep(Duration::from_secs(301)).await;
        assert_eq!(limiter.rules().await.len(), 1);

        cancel_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_loop() {
        let limiter = Arc::new(RateLimiter::new(RuleSet::empty()));
        let sync = Arc::new(RuleSynchronizer::new(
            limiter,
            Arc::new(StaticRuleSource::default()),
            &config(),
        ));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = sync.spawn(cancel_rx);

        cancel_tx.send(true).unwrap();
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("synchronizer did not stop")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_now_sweeps_stale_counters() {
        let limiter = Arc::new(RateLimiter::new(RuleSet::empty()));
        let compiled = CompiledRule::compile(rule("/x", "ANY", 5, 10)).unwrap();
        limiter.check_and_increment("stale", &compiled).await;

        let sync = RuleSynchronizer::new(
            limiter.clone(),
            Arc::new(StaticRuleSource::default()),
            &config(),
        );
        time::advance(Duration::from_secs(120)).await;
        let report = sync.sync_now().await;

        assert_eq!(report.rules_loaded, Some(0));
        assert_eq!(report.counters_swept, 1);
    }
}
