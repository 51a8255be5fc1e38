//! Per-user Rate Limiter (Token Bucket Algorithm)
//!
//! Each user gets an independent bucket, so one noisy account cannot
//! starve job submission for everybody else.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Buckets beyond this count trigger a sweep of idle, fully refilled ones
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket keyed by user id
pub struct UserRateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    max_tokens: u32,
    refill_rate: u32, // tokens per second
}

impl UserRateLimiter {
    /// `UserRateLimiter::new(20, 5)`: bursts of 20, 5 requests/sec sustained
    pub fn new(max_tokens: u32, refill_rate: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_tokens,
            refill_rate,
        }
    }

    /// Consume one token for `key`; false when the user is rate limited
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);

        if buckets.len() >= PRUNE_THRESHOLD && !buckets.contains_key(key) {
            let (max, rate) = (self.max_tokens as f64, self.refill_rate as f64);
            buckets.retain(|_, b| refill(b, now, max, rate) < max);
        }

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.max_tokens as f64,
            last_refill: now,
        });
        let tokens = refill(bucket, now, self.max_tokens as f64, self.refill_rate as f64);
        bucket.last_refill = now;

        if tokens >= 1.0 {
            bucket.tokens = tokens - 1.0;
            true
        } else {
            bucket.tokens = tokens;
            false
        }
    }

    /// Whole tokens left for `key` (for monitoring)
    pub fn remaining(&self, key: &str) -> u32 {
        let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        match buckets.get(key) {
            Some(bucket) => refill(
                bucket,
                Instant::now(),
                self.max_tokens as f64,
                self.refill_rate as f64,
            ) as u32,
            None => self.max_tokens,
        }
    }
}

fn refill(bucket: &Bucket, now: Instant, max_tokens: f64, refill_rate: f64) -> f64 {
    let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
    (bucket.tokens + elapsed * refill_rate).min(max_tokens)
}
