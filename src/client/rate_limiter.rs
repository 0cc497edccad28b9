//! Token-bucket rate limiter for outbound Fabric API calls (§4.M).

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterSettings {
    /// Tokens granted per `per`.
    pub rate: u32,
    pub per: Duration,
    /// Bucket capacity; defaults to `rate` when not overridden.
    pub burst: u32,
}

impl Default for RateLimiterSettings {
    fn default() -> Self {
        Self {
            rate: 10,
            per: Duration::from_secs(60),
            burst: 10,
        }
    }
}

impl RateLimiterSettings {
    pub fn new(rate: u32, per: Duration) -> Self {
        Self { rate, per, burst: rate }
    }

    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RateLimiterStats {
    pub total_acquired: u64,
    pub total_waited: u64,
    pub total_wait_time: Duration,
}

struct Inner {
    tokens: f64,
    last_refill: Instant,
    stats: RateLimiterStats,
}

/// Token bucket: refills continuously at `rate / per`, capped at `burst`.
pub struct RateLimiter {
    settings: RateLimiterSettings,
    inner: Mutex<Inner>,
}

impl RateLimiter {
    pub fn new(settings: RateLimiterSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(Inner {
                tokens: settings.burst as f64,
                last_refill: Instant::now(),
                stats: RateLimiterStats::default(),
            }),
        }
    }

    fn refill_rate_per_sec(&self) -> f64 {
        self.settings.rate as f64 / self.settings.per.as_secs_f64()
    }

    fn refill(&self, inner: &mut Inner) {
        let now = Instant::now();
        let elapsed = now.duration_since(inner.last_refill).as_secs_f64();
        inner.tokens = (inner.tokens + elapsed * self.refill_rate_per_sec()).min(self.settings.burst as f64);
        inner.last_refill = now;
    }

    /// Block (cooperatively, via async sleep) until one token is available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut inner = self.inner.lock();
                self.refill(&mut inner);
                if inner.tokens >= 1.0 {
                    inner.tokens -= 1.0;
                    inner.stats.total_acquired += 1;
                    None
                } else {
                    let deficit = 1.0 - inner.tokens;
                    let wait_secs = deficit / self.refill_rate_per_sec();
                    Some(Duration::from_secs_f64(wait_secs.max(0.0)))
                }
            };

            match wait {
                None => return,
                Some(duration) => {
                    debug!(wait_ms = duration.as_millis(), "rate limiter: waiting for token");
                    {
                        let mut inner = self.inner.lock();
                        inner.stats.total_waited += 1;
                        inner.stats.total_wait_time += duration;
                    }
                    tokio::time::sleep(duration).await;
                }
            }
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        self.inner.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_capacity_is_immediately_available() {
        let limiter = RateLimiter::new(RateLimiterSettings::new(5, Duration::from_secs(60)).with_burst(5));
        for _ in 0..5 {
            tokio::time::timeout(Duration::from_millis(50), limiter.acquire())
                .await
                .expect("burst tokens should be immediately available");
        }
        assert_eq!(limiter.stats().total_acquired, 5);
    }

    #[tokio::test]
    async fn exceeding_burst_waits() {
        let limiter = RateLimiter::new(RateLimiterSettings::new(100, Duration::from_millis(100)).with_burst(1));
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1));
        assert_eq!(limiter.stats().total_waited, 1);
    }

    #[test]
    fn default_settings_match_ten_per_minute() {
        let settings = RateLimiterSettings::default();
        assert_eq!(settings.rate, 10);
        assert_eq!(settings.per, Duration::from_secs(60));
        assert_eq!(settings.burst, 10);
    }
}
