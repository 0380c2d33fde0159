//! Bounded audit queue for admission decisions.
//!
//! The request path only ever enqueues; a single worker drains the queue
//! into an [`AuditSink`]. Sink failures are logged and forgotten.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, warn};

use fleetguard_core::config::AuditBacklogPolicy;
use fleetguard_core::result::AppResult;
use fleetguard_entity::RateLimitEvent;

/// Durable append-only log of admission decisions.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    /// Appends one event.
    async fn record(&self, event: RateLimitEvent) -> AppResult<()>;
}

/// Sink that keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<RateLimitEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, oldest first.
    pub async fn events(&self) -> Vec<RateLimitEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: RateLimitEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Creates a queue holding at most `capacity` pending events.
pub fn audit_queue(capacity: usize, policy: AuditBacklogPolicy) -> (AuditDispatcher, AuditWorker) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        AuditDispatcher {
            tx,
            policy,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        AuditWorker { rx },
    )
}

/// Producer half, held by the rate limiter.
#[derive(Debug, Clone)]
pub struct AuditDispatcher {
    tx: mpsc::Sender<RateLimitEvent>,
    policy: AuditBacklogPolicy,
    dropped: Arc<AtomicU64>,
}

impl AuditDispatcher {
    /// Enqueues `event` according to the backlog policy.
    ///
    /// Under [`AuditBacklogPolicy::Drop`] this never waits.
    pub async fn dispatch(&self, event: RateLimitEvent) {
        match self.policy {
            AuditBacklogPolicy::Drop => match self.tx.try_send(event) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    if total.is_power_of_two() {
                        warn!(dropped_total = total, "Audit queue full; dropping events");
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Audit queue closed; event discarded");
                }
            },
            AuditBacklogPolicy::Block => {
                if self.tx.send(event).await.is_err() {
                    debug!("Audit queue closed; event discarded");
                }
            }
        }
    }

    /// Events discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half: drains the queue into a sink.
#[derive(Debug)]
pub struct AuditWorker {
    rx: mpsc::Receiver<RateLimitEvent>,
}

impl AuditWorker {
    /// Runs until cancelled or until every dispatcher is dropped.
    ///
    /// On cancellation, events already queued are still written.
    pub async fn run(mut self, sink: Arc<dyn AuditSink>, mut cancel: watch::Receiver<bool>) {
        info!("Audit worker started");
        loop {
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => write_event(sink.as_ref(), event).await,
                    None => break,
                },
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        self.rx.close();
                        while let Some(event) = self.rx.recv().await {
                            write_event(sink.as_ref(), event).await;
                        }
                        break;
                    }
                }
            }
        }
        info!("Audit worker stopped");
    }

    /// Spawns [`run`](Self::run) on the runtime.
    pub fn spawn(
        self,
        sink: Arc<dyn AuditSink>,
        cancel: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(sink, cancel))
    }
}

async fn write_event(sink: &dyn AuditSink, event: RateLimitEvent) {
    let rule_id = event.rule_id;
    if let Err(e) = sink.record(event).await {
        warn!(rule_id = %rule_id, error = %e, "Failed to record rate limit event");
    }
}
