//! Shared test helpers for integration tests.
//!
//! Wires in-memory stores into the real services and router and drives
//! HTTP through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use uuid::Uuid;

use fleetguard_api::{AppState, build_router};
use fleetguard_auth::{
    MemoryPrincipalDirectory, MemorySessionStore, RbacEnforcer, TokenPair, TokenService,
    TokenSigner,
};
use fleetguard_core::config::{
    AppConfig, AuthConfig, DatabaseConfig, LoggingConfig, RateLimitConfig, ServerConfig,
    SessionConfig, WorkerConfig,
};
use fleetguard_entity::{Principal, RateLimitRule, Role, RuleScope, User};
use fleetguard_ratelimit::{
    MemoryAuditSink, RateLimiter, RuleSet, RuleSynchronizer, StaticRuleSource, audit_queue,
};

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Application config
    pub config: AppConfig,
    /// Token service behind the router
    pub service: Arc<TokenService>,
    /// Session rows
    pub sessions: Arc<MemorySessionStore>,
    /// User rows
    pub directory: Arc<MemoryPrincipalDirectory>,
    /// Rule rows
    pub rules: Arc<StaticRuleSource>,
    /// Counter cache
    pub limiter: Arc<RateLimiter>,
    /// Audit rows
    pub audit: Arc<MemoryAuditSink>,
    shutdown: watch::Sender<bool>,
    audit_worker: Option<JoinHandle<()>>,
}

impl TestApp {
    /// Create a new test application with a session limit and a rule table.
    pub async fn new(max_sessions: u32, rules: Vec<RateLimitRule>) -> Self {
        Self::with_config(test_config(max_sessions), rules).await
    }

    /// Create a new test application from an explicit config.
    pub async fn with_config(config: AppConfig, rules: Vec<RateLimitRule>) -> Self {

        let sessions = Arc::new(MemorySessionStore::new());
        let directory = Arc::new(MemoryPrincipalDirectory::new());
        let service = Arc::new(TokenService::new(
            Arc::new(TokenSigner::new(&config.auth)),
            sessions.clone(),
            directory.clone(),
            &config.auth,
            &config.session,
        ));

        let (shutdown, cancel) = watch::channel(false);
        let audit = Arc::new(MemoryAuditSink::new());
        let (dispatcher, worker) = audit_queue(
            config.rate_limit.audit_queue_capacity,
            config.rate_limit.audit_backlog_policy,
        );
        let audit_worker = worker.spawn(audit.clone(), cancel);

        let rules = Arc::new(StaticRuleSource::new(rules));
        let limiter = Arc::new(RateLimiter::new(RuleSet::empty()).with_audit(dispatcher));
        let synchronizer = Arc::new(RuleSynchronizer::new(
            limiter.clone(),
            rules.clone(),
            &config.rate_limit,
        ));
        let report = synchronizer.sync_now().await;
        assert!(report.rules_loaded.is_some(), "Initial rule load failed");

        let state = AppState {
            config: Arc::new(config.clone()),
            token_service: service.clone(),
            rbac_enforcer: Arc::new(RbacEnforcer::new()),
            rate_limiter: limiter.clone(),
            rule_synchronizer: synchronizer,
            rule_repo: rules.clone(),
        };

        Self {
            router: build_router(state),
            config,
            service,
            sessions,
            directory,
            rules,
            limiter,
            audit,
            shutdown,
            audit_worker: Some(audit_worker),
        }
    }

    /// Insert an active user and return its principal
    pub async fn create_user(&self, role: Role) -> Principal {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let user = User {
            id,
            email: format!("{}@fleet.test", id.simple()),
            display_name: format!("Test {}", role),
            role,
            tenant_id: Some(Uuid::new_v4()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let principal = Principal::from(&user);
        self.directory.insert(user).await;
        principal
    }

    /// Issue a session for `principal`
    pub async fn issue(&self, principal: &Principal) -> TokenPair {
        self.service
            .issue_session_token_pair(principal, Some("127.0.0.1"), Some("integration-test"))
            .await
            .expect("Failed to issue token pair")
    }

    /// Stop the audit worker and wait until queued events are written
    pub async fn flush_audit(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.audit_worker.take() {
            handle.await.expect("Audit worker panicked");
        }
    }

    /// Make an HTTP request to the test app
    ///
    /// `client_address` becomes the socket peer of the request.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
        client_address: Option<&str>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");

        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        let mut req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");
        if let Some(addr) = client_address {
            req.extensions_mut().insert(peer(addr));
        }

        self.send(req).await
    }

    /// Make an HTTP request from socket `peer_address` carrying an
    /// `X-Forwarded-For` header
    pub async fn request_forwarded(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        peer_address: &str,
        forwarded_for: &str,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json")
            .header("X-Forwarded-For", forwarded_for)
            .body(Body::from(body_str))
            .expect("Failed to build request");
        req.extensions_mut().insert(peer(peer_address));

        self.send(req).await
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Parsed JSON body
    pub body: Value,
}

impl TestResponse {
    /// Header value as a string, if present
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Socket peer extension for `addr`
fn peer(addr: &str) -> ConnectInfo<SocketAddr> {
    let ip: IpAddr = addr.parse().expect("Test client address must be an IP");
    ConnectInfo(SocketAddr::new(ip, 40_000))
}

/// An active rule created now
pub fn rule(pattern: &str, method: &str, max: i32, window: i32, scope: RuleScope) -> RateLimitRule {
    let now = Utc::now();
    RateLimitRule {
        id: Uuid::now_v7(),
        name: format!("{method} {pattern}"),
        path_pattern: pattern.to_string(),
        method: method.to_string(),
        max_requests: max,
        window_seconds: window,
        scope,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Config with a test secret and the given session limit
pub fn test_config(max_sessions: u32) -> AppConfig {
    AppConfig {
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: "postgres://unused/fleetguard".to_string(),
            max_connections: 1,
            min_connections: 0,
            connect_timeout_seconds: 1,
            idle_timeout_seconds: 1,
        },
        auth: AuthConfig {
            jwt_secret: "integration-secret-with-more-than-32-bytes".to_string(),
            ..AuthConfig::default()
        },
        session: SessionConfig {
            max_concurrent: max_sessions,
            ..SessionConfig::default()
        },
        rate_limit: RateLimitConfig::default(),
        worker: WorkerConfig::default(),
        logging: LoggingConfig::default(),
    }
}
