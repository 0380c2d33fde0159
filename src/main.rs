//! FleetGuard Server — session engine and adaptive rate limiter
//!
//! Main entry point that wires all crates together and starts the server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use fleetguard_api::{AppState, build_router};
use fleetguard_auth::{PrincipalDirectory, RbacEnforcer, SessionStore, TokenService, TokenSigner};
use fleetguard_core::config::AppConfig;
use fleetguard_core::error::AppError;
use fleetguard_database::migration::run_migrations;
use fleetguard_database::{
    DatabasePool, PgRateLimitEventRepository, PgRateLimitRuleRepository, PgSessionRepository,
    PgUserRepository,
};
use fleetguard_ratelimit::{
    AuditSink, RateLimiter, RuleRepository, RuleSet, RuleSource, RuleSynchronizer, audit_queue,
};
use fleetguard_worker::{CronScheduler, SessionPurgeJob};

/// FleetGuard server command line.
#[derive(Debug, Parser)]
#[command(name = "fleetguard-server", version, about)]
struct Cli {
    /// Environment overlay to load from the config directory
    #[arg(long, env = "FLEETGUARD_ENV", default_value = "development")]
    env: String,

    /// Directory holding `default.toml` and the environment overlays
    #[arg(long, env = "FLEETGUARD_CONFIG_DIR", default_value = "config")]
    config_dir: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config_dir, &cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(
        "Loaded config from '{}' (env: {})",
        cli.config_dir,
        cli.env
    );

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting FleetGuard v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Connect to database ──────────────────────────────
    let database = DatabasePool::connect(&config.database).await?;
    database.ping().await?;
    let db_pool = database.pool().clone();

    // ── Step 2: Run migrations ───────────────────────────────────
    run_migrations(&db_pool).await?;
    tracing::info!("Database migrations complete");

    // ── Step 3: Initialize repositories ──────────────────────────
    let session_repo = Arc::new(PgSessionRepository::new(db_pool.clone()));
    let user_repo = Arc::new(PgUserRepository::new(db_pool.clone()));
    let rule_repo = Arc::new(PgRateLimitRuleRepository::new(db_pool.clone()));
    let event_repo = Arc::new(PgRateLimitEventRepository::new(db_pool.clone()));

    // ── Step 4: Initialize session engine ────────────────────────
    let signer = Arc::new(TokenSigner::new(&config.auth));
    let token_service = Arc::new(TokenService::new(
        signer,
        Arc::clone(&session_repo) as Arc<dyn SessionStore>,
        Arc::clone(&user_repo) as Arc<dyn PrincipalDirectory>,
        &config.auth,
        &config.session,
    ));
    tracing::info!(
        "Session engine ready (max concurrent: {}, serialized issuance: {})",
        config
            .session
            .limit()
            .as_max()
            .map_or_else(|| "unlimited".to_string(), |max| max.to_string()),
        config.session.serialize_issuance
    );

    // ── Step 5: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 6: Initialize rate limiter ──────────────────────────
    let (audit, audit_worker) = audit_queue(
        config.rate_limit.audit_queue_capacity,
        config.rate_limit.audit_backlog_policy,
    );
    let audit_handle = audit_worker.spawn(
        Arc::clone(&event_repo) as Arc<dyn AuditSink>,
        shutdown_rx.clone(),
    );

    let rate_limiter = Arc::new(RateLimiter::new(RuleSet::empty()).with_audit(audit));
    let rule_synchronizer = Arc::new(RuleSynchronizer::new(
        Arc::clone(&rate_limiter),
        Arc::clone(&rule_repo) as Arc<dyn RuleSource>,
        &config.rate_limit,
    ));

    let initial = rule_synchronizer.sync_now().await;
    match initial.rules_loaded {
        Some(count) => tracing::info!("Loaded {} rate limit rules", count),
        None => tracing::warn!("Initial rule load failed; starting without rate limit rules"),
    }
    let sync_handle = Arc::clone(&rule_synchronizer).spawn(shutdown_rx.clone());

    // ── Step 7: Start scheduled maintenance ──────────────────────
    let mut scheduler = if config.worker.enabled {
        let purge = Arc::new(SessionPurgeJob::new(
            Arc::clone(&token_service),
            config.session.retention(),
        ));
        let scheduler = CronScheduler::new(purge).await?;
        scheduler.register_default_tasks(&config.worker).await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Background worker disabled");
        None
    };

    // ── Step 8: Build and start HTTP server ──────────────────────
    let app_state = AppState {
        config: Arc::new(config.clone()),
        token_service,
        rbac_enforcer: Arc::new(RbacEnforcer::new()),
        rate_limiter,
        rule_synchronizer,
        rule_repo: rule_repo as Arc<dyn RuleRepository>,
    };

    let app = build_router(app_state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("FleetGuard server listening on {}", addr);

    // ── Step 9: Graceful shutdown ────────────────────────────────
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Scheduler shutdown failed: {}", e);
        }
    }
    for (name, handle) in [("rule synchronizer", sync_handle), ("audit worker", audit_handle)] {
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!("{} did not stop within {}s", name, grace.as_secs());
        }
    }

    database.close().await;
    tracing::info!("FleetGuard server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
