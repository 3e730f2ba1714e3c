//! Rate Limiter - token bucket pacing for outbound API calls
//!
//! Discogs allows 60 authenticated requests per minute and Telegram roughly
//! one message per second per chat. Each client owns a limiter and acquires a
//! token before every request, so the check cycle itself never sleeps.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// A single token bucket
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    fn new(max_tokens: u32, window: Duration) -> Self {
        let max = max_tokens.max(1) as f64;
        Self {
            tokens: max,
            max_tokens: max,
            refill_rate: max / window.as_secs_f64(),
            last_refill: Instant::now(),
        }
    }

    /// Refill tokens based on elapsed time
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// Try to consume one token. Returns true if successful.
    fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until one token is available
    fn time_until_available(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            let deficit = 1.0 - self.tokens;
            Duration::from_secs_f64(deficit / self.refill_rate)
        }
    }
}

/// Shared token bucket for one upstream service
#[derive(Clone)]
pub struct RateLimiter {
    name: &'static str,
    bucket: Arc<Mutex<TokenBucket>>,
}

impl RateLimiter {
    /// Allow `max_tokens` requests per `window`, bursting up to `max_tokens`
    pub fn new(name: &'static str, max_tokens: u32, window: Duration) -> Self {
        Self {
            name,
            bucket: Arc::new(Mutex::new(TokenBucket::new(max_tokens, window))),
        }
    }

    pub fn per_minute(name: &'static str, requests: u32) -> Self {
        Self::new(name, requests, Duration::from_secs(60))
    }

    pub fn per_second(name: &'static str, requests: u32) -> Self {
        Self::new(name, requests, Duration::from_secs(1))
    }

    /// Acquire a token, waiting if necessary.
    /// Returns true if we had to wait (i.e., were rate limited).
    pub async fn acquire(&self) -> bool {
        let mut waited = false;
        loop {
            let wait_time = {
                let mut b = self.bucket.lock().await;
                if b.try_acquire() {
                    return waited;
                }
                b.time_until_available()
            };

            waited = true;
            debug!("Rate limiter: waiting {:?} for {}", wait_time, self.name);
            tokio::time::sleep(wait_time).await;
        }
    }
}
