//! Sliding-window rate limiting keyed by actor or client IP.
//!
//! Each check prunes hits older than the window, then allows and records the
//! request only if the remaining count is below the budget. `cleanup` must be
//! driven from outside (the server binary runs it on an interval).

pub mod store;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use store::{BucketStore, MemoryBucketStore, RateLimitBucket};

/// Budget for one operation class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl RateLimitConfig {
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self { max_requests, window_secs }
    }

    pub fn window_duration(&self) -> Duration {
        Duration::seconds(self.window_secs as i64)
    }

    pub const fn client_creation() -> Self {
        Self::new(5, 60)
    }

    pub const fn inquiry_submission() -> Self {
        Self::new(3, 5 * 60)
    }

    pub const fn general_api() -> Self {
        Self::new(100, 60)
    }

    pub const fn sensitive_api() -> Self {
        Self::new(10, 60)
    }

    pub const fn login() -> Self {
        Self::new(5, 15 * 60)
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the oldest hit leaves the window (at least 1)
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.reset_at - now).num_seconds().max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    General,
    Sensitive,
    ClientCreation,
    InquirySubmission,
    Login,
}

impl OperationClass {
    pub const ALL: [OperationClass; 5] = [
        OperationClass::General,
        OperationClass::Sensitive,
        OperationClass::ClientCreation,
        OperationClass::InquirySubmission,
        OperationClass::Login,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::General => "general",
            OperationClass::Sensitive => "sensitive",
            OperationClass::ClientCreation => "client_creation",
            OperationClass::InquirySubmission => "inquiry_submission",
            OperationClass::Login => "login",
        }
    }
}

/// One limiter per operation class. Keys are namespaced by class inside the
/// shared store.
#[derive(Clone)]
pub struct RateLimiter {
    class: OperationClass,
    config: RateLimitConfig,
    store: Arc<dyn BucketStore>,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(class: OperationClass, config: RateLimitConfig, store: Arc<dyn BucketStore>) -> Self {
        Self { class, config, store, enabled: true }
    }

    /// A limiter that allows everything (rate limiting switched off in config)
    pub fn disabled(class: OperationClass, config: RateLimitConfig, store: Arc<dyn BucketStore>) -> Self {
        Self { class, config, store, enabled: false }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn bucket_key(&self, key: &str) -> String {
        format!("{}:{}", self.class.as_str(), key)
    }

    pub async fn is_allowed(&self, key: &str) -> bool {
        self.check_at(key, Utc::now()).await.allowed
    }

    pub async fn is_allowed_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.check_at(key, now).await.allowed
    }

    pub async fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Utc::now()).await
    }

    pub async fn check_at(&self, key: &str, now: DateTime<Utc>) -> RateLimitDecision {
        if !self.enabled {
            return RateLimitDecision {
                allowed: true,
                remaining: self.config.max_requests,
                reset_at: now,
            };
        }

        let decision = self.store.hit(&self.bucket_key(key), now, &self.config).await;
        if !decision.allowed {
            tracing::debug!("rate limit hit for {} ({})", key, self.class.as_str());
        }
        decision
    }

    pub async fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now()).await
    }

    pub async fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let prefix = format!("{}:", self.class.as_str());
        self.store.purge(&prefix, now, self.config.window_duration()).await
    }
}

/// Budgets per class, as loaded from configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub general: RateLimitConfig,
    pub sensitive: RateLimitConfig,
    pub client_creation: RateLimitConfig,
    pub inquiry_submission: RateLimitConfig,
    pub login: RateLimitConfig,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            general: RateLimitConfig::general_api(),
            sensitive: RateLimitConfig::sensitive_api(),
            client_creation: RateLimitConfig::client_creation(),
            inquiry_submission: RateLimitConfig::inquiry_submission(),
            login: RateLimitConfig::login(),
        }
    }
}

impl RateLimitSettings {
    pub fn for_class(&self, class: OperationClass) -> RateLimitConfig {
        match class {
            OperationClass::General => self.general,
            OperationClass::Sensitive => self.sensitive,
            OperationClass::ClientCreation => self.client_creation,
            OperationClass::InquirySubmission => self.inquiry_submission,
            OperationClass::Login => self.login,
        }
    }
}

/// The full set of limiters sharing one bucket store
#[derive(Clone)]
pub struct RateLimiters {
    limiters: Vec<RateLimiter>,
}

impl RateLimiters {
    pub fn new(settings: &RateLimitSettings, store: Arc<dyn BucketStore>, enabled: bool) -> Self {
        let limiters = OperationClass::ALL
            .iter()
            .map(|class| {
                let config = settings.for_class(*class);
                if enabled {
                    RateLimiter::new(*class, config, store.clone())
                } else {
                    RateLimiter::disabled(*class, config, store.clone())
                }
            })
            .collect();
        Self { limiters }
    }

    /// In-memory limiters with the default budgets
    pub fn in_memory(settings: &RateLimitSettings, enabled: bool) -> Self {
        Self::new(settings, Arc::new(MemoryBucketStore::new()), enabled)
    }

    pub fn for_class(&self, class: OperationClass) -> &RateLimiter {
        // ALL order matches construction order
        let index = OperationClass::ALL.iter().position(|c| *c == class).unwrap_or(0);
        &self.limiters[index]
    }

    /// Evict expired buckets across every class
    pub async fn cleanup(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        for limiter in &self.limiters {
            removed += limiter.cleanup_at(now).await;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window: u64) -> RateLimiter {
        RateLimiter::new(
            OperationClass::General,
            RateLimitConfig::new(max, window),
            Arc::new(MemoryBucketStore::new()),
        )
    }

    #[tokio::test]
    async fn sixth_call_in_window_is_denied() {
        let limiter = limiter(5, 60);
        let start = Utc::now();
        let mut results = Vec::new();
        for i in 0..6 {
            results.push(limiter.is_allowed_at("k", start + Duration::seconds(i)).await);
        }
        assert_eq!(results, vec![true, true, true, true, true, false]);

        // Window elapsed for every recorded hit
        assert!(limiter.is_allowed_at("k", start + Duration::seconds(66)).await);
    }

    #[tokio::test]
    async fn window_slides_rather_than_resets() {
        let limiter = limiter(2, 60);
        let start = Utc::now();
        assert!(limiter.is_allowed_at("k", start).await);
        assert!(limiter.is_allowed_at("k", start + Duration::seconds(30)).await);
        assert!(!limiter.is_allowed_at("k", start + Duration::seconds(45)).await);
        // First hit has left the window, second has not
        assert!(limiter.is_allowed_at("k", start + Duration::seconds(61)).await);
        assert!(!limiter.is_allowed_at("k", start + Duration::seconds(62)).await);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = limiter(1, 60);
        let now = Utc::now();
        assert!(limiter.is_allowed_at("a", now).await);
        assert!(limiter.is_allowed_at("b", now).await);
        assert!(!limiter.is_allowed_at("a", now).await);
    }

    #[tokio::test]
    async fn denial_reports_reset_and_remaining() {
        let limiter = limiter(1, 60);
        let now = Utc::now();
        let first = limiter.check_at("k", now).await;
        assert_eq!(first.remaining, 0);
        let second = limiter.check_at("k", now + Duration::seconds(10)).await;
        assert!(!second.allowed);
        assert_eq!(second.reset_at, now + Duration::seconds(60));
        assert_eq!(second.retry_after_secs(now + Duration::seconds(10)), 50);
    }

    #[tokio::test]
    async fn cleanup_evicts_only_expired_buckets_of_its_class() {
        let store: Arc<dyn BucketStore> = Arc::new(MemoryBucketStore::new());
        let general = RateLimiter::new(OperationClass::General, RateLimitConfig::new(5, 60), store.clone());
        let inquiry = RateLimiter::new(OperationClass::InquirySubmission, RateLimitConfig::new(3, 300), store.clone());
        let now = Utc::now();

        general.is_allowed_at("old", now).await;
        general.is_allowed_at("fresh", now + Duration::seconds(100)).await;
        inquiry.is_allowed_at("old", now).await;
        assert_eq!(store.len().await, 3);

        assert_eq!(general.cleanup_at(now + Duration::seconds(120)).await, 1);
        assert_eq!(store.len().await, 2);
        assert_eq!(inquiry.cleanup_at(now + Duration::seconds(120)).await, 0);
    }

    #[tokio::test]
    async fn disabled_limiter_always_allows() {
        let limiters = RateLimiters::in_memory(&RateLimitSettings::default(), false);
        let limiter = limiters.for_class(OperationClass::InquirySubmission);
        for _ in 0..10 {
            assert!(limiter.is_allowed("ip").await);
        }
    }

    #[test]
    fn for_class_returns_matching_budget() {
        let limiters = RateLimiters::in_memory(&RateLimitSettings::default(), true);
        assert_eq!(limiters.for_class(OperationClass::ClientCreation).config().max_requests, 5);
        assert_eq!(limiters.for_class(OperationClass::InquirySubmission).config().window_secs, 300);
    }
}
