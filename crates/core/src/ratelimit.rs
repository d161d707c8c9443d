//! Token bucket rate limiting per client address.

use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Buckets kept before full (idle) ones are evicted.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Token bucket for a single client.
///
/// Tokens are added at a constant rate and consumed by requests. The bucket
/// starts full so a client may burst up to its per-minute allowance.
#[derive(Debug)]
pub struct TokenBucket {
    /// Max tokens (= requests per minute).
    capacity: f64,
    /// Current available tokens.
    tokens: f64,
    /// Tokens added per second.
    refill_rate: f64,
    /// Last refill time.
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = f64::from(requests_per_minute);
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    /// Try to take a token.
    ///
    /// Returns `Err(wait)` with the time until one becomes available.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(tokens_needed / self.refill_rate))
        }
    }

    /// Whether the bucket has fully refilled, i.e. the client has been idle.
    fn is_full(&mut self) -> bool {
        self.refill();
        self.tokens >= self.capacity
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Per-client rate limiter.
///
/// Thread-safe and async-compatible.
pub struct RateLimiter {
    requests_per_minute: u32,
    buckets: Mutex<HashMap<IpAddr, TokenBucket>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Take a token for `client`.
    ///
    /// Returns `Err(retry_after)` when the client is over its allowance.
    pub async fn check(&self, client: IpAddr) -> Result<(), Duration> {
        let mut buckets = self.buckets.lock().await;

        if buckets.len() >= MAX_TRACKED_CLIENTS && !buckets.contains_key(&client) {
            buckets.retain(|_, bucket| !bucket.is_full());
        }

        buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(self.requests_per_minute))
            .try_acquire()
    }

    /// Number of clients currently tracked.
    pub async fn tracked_clients(&self) -> usize {
        self.buckets.lock().await.len()
    }
}
