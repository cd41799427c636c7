//! Shared token-bucket rate limiters, one per external service.
//!
//! Both services publish hard quotas (the model API in requests per
//! rolling minute, the photo API in requests per rolling hour). Every
//! outbound call acquires a token first; callers that would exceed the
//! quota sleep until a token refills. A caller never spins indefinitely:
//! when the accumulated wait passes the configured ceiling the acquire
//! fails with a rate-limit error instead.
//!
//! The bucket uses [`tokio::time::Instant`] so tests can drive it with a
//! paused clock.

use crate::error::DeckError;
use std::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::warn;

/// Give up after this many consecutive waits; refill math makes more than
/// a couple of rounds pointless.
const MAX_ACQUIRE_ROUNDS: u32 = 4;

/// A token bucket guarding one external service.
pub struct RateLimiter {
    service: &'static str,
    bucket: Mutex<TokenBucket>,
    ceiling: Duration,
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    /// Refill rate in tokens per second.
    rate: f64,
    /// Burst capacity; also the steady-state maximum.
    max_tokens: f64,
}

impl TokenBucket {
    fn new(rate: f64, max_tokens: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            rate,
            max_tokens,
        }
    }

    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn wait_time(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.max_tokens);
        self.last_refill = now;
    }
}

impl RateLimiter {
    /// Limiter for a quota expressed per rolling minute.
    pub fn per_minute(service: &'static str, requests: u32, ceiling_ms: u64) -> Self {
        Self::new(service, requests as f64 / 60.0, requests as f64, ceiling_ms)
    }

    /// Limiter for a quota expressed per rolling hour.
    pub fn per_hour(service: &'static str, requests: u32, ceiling_ms: u64) -> Self {
        Self::new(service, requests as f64 / 3600.0, requests as f64, ceiling_ms)
    }

    fn new(service: &'static str, rate: f64, burst: f64, ceiling_ms: u64) -> Self {
        Self {
            service,
            bucket: Mutex::new(TokenBucket::new(rate, burst)),
            ceiling: Duration::from_millis(ceiling_ms),
        }
    }

    /// Take one token, sleeping for refills as needed.
    ///
    /// Fails with [`DeckError::RateLimited`] once the accumulated wait
    /// would pass the ceiling — the caller sees a typed quota error with
    /// the attempt count rather than an unbounded stall.
    pub async fn acquire(&self) -> Result<(), DeckError> {
        let mut waited = Duration::ZERO;

        for round in 1..=MAX_ACQUIRE_ROUNDS {
            let wait = {
                let mut bucket = self.bucket.lock().expect("limiter mutex poisoned");
                if bucket.try_consume() {
                    return Ok(());
                }
                bucket.wait_time()
            };

            if waited + wait > self.ceiling {
                return Err(DeckError::RateLimited {
                    service: self.service,
                    attempts: round,
                });
            }

            warn!(
                service = self.service,
                wait_ms = wait.as_millis() as u64,
                "rate limit reached, waiting for refill"
            );
            sleep(wait).await;
            waited += wait;
        }

        Err(DeckError::RateLimited {
            service: self.service,
            attempts: MAX_ACQUIRE_ROUNDS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_capacity_is_honoured() {
        let limiter = RateLimiter::per_minute("model", 3, 10);
        for _ in 0..3 {
            limiter.acquire().await.expect("burst token");
        }
        // 4th token would need a refill wait longer than the 10ms ceiling.
        let err = limiter.acquire().await.unwrap_err();
        assert!(matches!(
            err,
            DeckError::RateLimited {
                service: "model",
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_refill_over_time() {
        let limiter = RateLimiter::per_minute("model", 60, 5_000);
        limiter.acquire().await.expect("first token");

        // Drain the rest of the burst.
        while limiter
            .bucket
            .lock()
            .unwrap()
            .try_consume()
        {}

        // One token refills per second at 60/min; the paused clock makes
        // the sleep inside acquire() resolve instantly.
        limiter.acquire().await.expect("refilled token");
    }

    #[tokio::test]
    async fn ceiling_zero_fails_immediately_when_empty() {
        let limiter = RateLimiter::per_hour("photo", 1, 0);
        limiter.acquire().await.expect("burst token");
        assert!(limiter.acquire().await.is_err());
    }
}
