//! Fixed-window rate limiting for payment initiation.
//!
//! Each client origin gets a budget of `max_attempts` calls per window. The window starts at the first call and is
//! not sliding: once it has expired, the next call starts a fresh one.
//!
//! The [`RateLimiter`] trait is what the server depends on. [`InMemoryRateLimiter`] keeps its buckets in process
//! memory, so they are lost on restart and are not shared between server instances.
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, window: DEFAULT_WINDOW }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

pub trait RateLimiter: Send + Sync {
    /// Counts a call against `key` and says whether it may proceed.
    fn check(&self, key: &str) -> RateLimitDecision;

    /// Drops state for windows that have expired. Returns the number of buckets removed.
    fn purge_expired(&self) -> usize {
        0
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    reset_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<String, Bucket>,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, buckets: DashMap::new() }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.window).unwrap_or_else(|_| chrono::Duration::seconds(600))
    }

    /// [`RateLimiter::check`] with an explicit clock.
    pub fn check_at(&self, key: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let window = self.window();
        // The entry guard holds the shard lock, so concurrent checks on the same key are serialised
        let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket { count: 0, reset_at: now + window });
        if now > bucket.reset_at {
            bucket.count = 0;
            bucket.reset_at = now + window;
        }
        if bucket.count >= self.config.max_attempts {
            debug!("🚦️ Rate limit reached for {key} until {}", bucket.reset_at);
            return RateLimitDecision { allowed: false, remaining: 0, reset_at: bucket.reset_at };
        }
        bucket.count += 1;
        let remaining = self.config.max_attempts - bucket.count;
        trace!("🚦️ {key} has {remaining} attempts left in this window");
        RateLimitDecision { allowed: true, remaining, reset_at: bucket.reset_at }
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, b| b.reset_at >= now);
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            debug!("🚦️ Purged {removed} expired rate limit buckets");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Utc::now())
    }

    fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }
}
