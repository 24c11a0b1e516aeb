use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use agency_crm::audit::{AuditSink, PgAuditSink};
use agency_crm::config::{self, AppConfig, Environment};
use agency_crm::database::{DatabaseManager, DocumentStore, PgDocumentStore};
use agency_crm::permissions::catalog;
use agency_crm::rate_limit::MemoryBucketStore;
use agency_crm::routes::app;
use agency_crm::state::AppState;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .init();

    let config = config::config().clone();
    tracing::info!("Starting Agency CRM API in {:?} mode", config.environment);

    catalog().validate().context("permission catalog is inconsistent")?;
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let state = build_state(config).await?;

    let limiters = state.limiters.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = limiters.cleanup().await;
            if purged > 0 {
                tracing::debug!("Purged {} idle rate-limit buckets", purged);
            }
        }
    });

    // Allow tests or deployments to override port via env
    let port = std::env::var("AGENCY_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Agency CRM API listening on http://{}", bind_addr);

    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;

    DatabaseManager::close_all().await;
    Ok(())
}

/// Postgres when `DATABASE_URL` is set, process memory otherwise (development only)
async fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    let buckets = Arc::new(MemoryBucketStore::new());

    if std::env::var("DATABASE_URL").is_err() {
        if config.environment != Environment::Development {
            anyhow::bail!("DATABASE_URL must be set outside development");
        }
        tracing::warn!("DATABASE_URL not set; documents and audit trail are kept in memory");
        return Ok(AppState::in_memory(config));
    }

    let pool = DatabaseManager::main_pool(&config.database).await?;
    DatabaseManager::health_check(&pool).await?;

    let documents = PgDocumentStore::new(pool.clone());
    documents.ensure_schema().await?;
    let audit = PgAuditSink::new(pool.clone());
    audit.ensure_schema().await?;

    let store: Arc<dyn DocumentStore> = Arc::new(documents);
    let sink: Arc<dyn AuditSink> = Arc::new(audit);
    Ok(AppState::new(config, store, sink, buckets).with_pool(pool))
}

