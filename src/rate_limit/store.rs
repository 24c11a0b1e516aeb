use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

use super::{RateLimitConfig, RateLimitDecision};

/// Request timestamps inside the trailing window for one key
#[derive(Debug, Clone, Default)]
pub struct RateLimitBucket {
    pub hits: VecDeque<DateTime<Utc>>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitBucket {
    /// Drop hits older than `now - window`
    fn prune(&mut self, now: DateTime<Utc>, window: Duration) {
        let cutoff = now - window;
        while matches!(self.hits.front(), Some(t) if *t <= cutoff) {
            self.hits.pop_front();
        }
        self.reset_at = self.hits.front().map(|t| *t + window);
    }
}

/// Storage for rate-limit buckets.
///
/// The in-process store is only correct for a single instance. Deployments
/// running several nodes must provide a shared implementation, otherwise each
/// node enforces its own budget and the effective limit is multiplied.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Prune, count and (if under budget) record a hit, atomically per key
    async fn hit(&self, key: &str, now: DateTime<Utc>, config: &RateLimitConfig) -> RateLimitDecision;

    /// Evict buckets under `prefix` whose every hit is older than `window`.
    /// Returns the number removed.
    async fn purge(&self, prefix: &str, now: DateTime<Utc>, window: Duration) -> usize;

    async fn len(&self) -> usize;
}

#[derive(Default)]
pub struct MemoryBucketStore {
    buckets: Mutex<HashMap<String, RateLimitBucket>>,
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    async fn hit(&self, key: &str, now: DateTime<Utc>, config: &RateLimitConfig) -> RateLimitDecision {
        let window = config.window_duration();
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(key.to_string()).or_default();
        bucket.prune(now, window);

        let count = bucket.hits.len() as u32;
        if count >= config.max_requests {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: bucket.reset_at.unwrap_or(now + window),
            };
        }

        bucket.hits.push_back(now);
        if bucket.reset_at.is_none() {
            bucket.reset_at = Some(now + window);
        }

        RateLimitDecision {
            allowed: true,
            remaining: config.max_requests - count - 1,
            reset_at: bucket.reset_at.unwrap_or(now + window),
        }
    }

    async fn purge(&self, prefix: &str, now: DateTime<Utc>, window: Duration) -> usize {
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|key, bucket| {
            if !key.starts_with(prefix) {
                return true;
            }
            bucket.prune(now, window);
            !bucket.hits.is_empty()
        });
        before - buckets.len()
    }

    async fn len(&self) -> usize {
        self.buckets.lock().await.len()
    }
}
