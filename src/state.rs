use sqlx::PgPool;
use std::sync::Arc;

use crate::audit::{AuditLogger, AuditSink, MemoryAuditSink};
use crate::config::AppConfig;
use crate::database::{DocumentStore, MemoryDocumentStore};
use crate::middleware::PolicyTable;
use crate::rate_limit::{BucketStore, MemoryBucketStore, RateLimiters};
use crate::services::{ClientService, InquiryService, InteractionService, ServiceContext, TaskService, UserService};

/// Everything a handler or the security pipeline needs, cloned per request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub limiters: Arc<RateLimiters>,
    pub audit: Arc<AuditLogger>,
    pub policies: Arc<PolicyTable>,
    /// Present when documents live in Postgres; used by the health check
    pub pool: Option<PgPool>,
    pub clients: ClientService,
    pub tasks: TaskService,
    pub inquiries: InquiryService,
    pub interactions: InteractionService,
    pub users: UserService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        audit_sink: Arc<dyn AuditSink>,
        buckets: Arc<dyn BucketStore>,
    ) -> Self {
        let limiters = Arc::new(RateLimiters::new(
            &config.rate_limits,
            buckets,
            config.api.enable_rate_limiting,
        ));
        let audit = Arc::new(AuditLogger::new(audit_sink, config.audit.clone()));
        let ctx = ServiceContext::new(store.clone(), limiters.clone(), audit.clone());

        Self {
            config: Arc::new(config),
            store,
            limiters,
            audit,
            policies: Arc::new(PolicyTable::standard()),
            pool: None,
            clients: ClientService::new(ctx.clone()),
            tasks: TaskService::new(ctx.clone()),
            inquiries: InquiryService::new(ctx.clone()),
            interactions: InteractionService::new(ctx.clone()),
            users: UserService::new(ctx),
        }
    }

    /// All stores in process memory
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(
            config,
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryAuditSink::new()),
            Arc::new(MemoryBucketStore::new()),
        )
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = Arc::new(policies);
        self
    }
}
