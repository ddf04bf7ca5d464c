use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Time source for the scheduler and retry backoff.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Process-wide politeness scheduler: consecutive requests to the same host
/// start at least `min_interval` apart.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    min_interval: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>, min_interval: Duration) -> Self {
        Self {
            clock,
            min_interval,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Wait until `host` may be contacted again.
    ///
    /// The slot is reserved before sleeping, so concurrent callers for the
    /// same host queue up one interval apart instead of firing together.
    pub async fn acquire(&self, host: &str) {
        let wait = {
            let mut slots = self.next_slot.lock().unwrap_or_else(PoisonError::into_inner);
            let now = self.clock.now();
            let slot = slots
                .get(host)
                .copied()
                .filter(|slot| *slot > now)
                .unwrap_or(now);
            slots.insert(host.to_string(), slot + self.min_interval);
            slot.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            tracing::trace!("Waiting {wait:?} before next request to {host}");
            self.clock.sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeClock;

    #[tokio::test]
    async fn first_request_to_a_host_is_immediate() {
        let clock = Arc::new(FakeClock::new());
        let limiter = RateLimiter::new(clock.clone(), Duration::from_secs(2));

        limiter.acquire("example.com").await;

        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn back_to_back_requests_wait_the_full_interval() {
        let clock = Arc::new(FakeClock::new());
        let limiter = RateLimiter::new(clock.clone(), Duration::from_secs(2));

        limiter.acquire("example.com").await;
        limiter.acquire("example.com").await;
        limiter.acquire("example.com").await;

        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(2), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn elapsed_time_counts_towards_the_interval() {
        let clock = Arc::new(FakeClock::new());
        let limiter = RateLimiter::new(clock.clone(), Duration::from_secs(2));

        limiter.acquire("example.com").await;
        clock.advance(Duration::from_millis(1500));
        limiter.acquire("example.com").await;

        assert_eq!(clock.sleeps(), vec![Duration::from_millis(500)]);
    }

    #[tokio::test]
    async fn hosts_are_scheduled_independently() {
        let clock = Arc::new(FakeClock::new());
        let limiter = RateLimiter::new(clock.clone(), Duration::from_secs(2));

        limiter.acquire("a.example.com").await;
        limiter.acquire("b.example.com").await;

        assert!(clock.sleeps().is_empty());
    }
}
