//! Sliding-window limiter for outbound translation requests.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Default ceiling of requests in any trailing minute
pub const DEFAULT_REQUESTS_PER_MINUTE: usize = 80;

const WINDOW: Duration = Duration::from_secs(60);

/// Keeps the number of requests issued in the trailing window at or below a ceiling.
///
/// The limiter never fails; when the window is full it simply waits until the
/// oldest recorded request falls out of it.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    issued: VecDeque<Instant>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_per_minute` requests per 60 seconds
    pub fn new(max_per_minute: usize) -> Self {
        Self::with_window(max_per_minute, WINDOW)
    }

    /// Create a limiter with a custom window length.
    ///
    /// A ceiling of zero would block forever, so it is clamped to one.
    pub fn with_window(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            issued: VecDeque::new(),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Wait until one more request fits in the window, then record it.
    pub async fn await_slot(&mut self) {
        let now = Instant::now();
        self.evict_expired(now);

        if self.issued.len() >= self.max_requests {
            if let Some(&oldest) = self.issued.front() {
                let wait = self.window.saturating_sub(now.duration_since(oldest));
                if !wait.is_zero() {
                    debug!(
                        "Rate limit of {} requests per {:?} reached, waiting {:?}",
                        self.max_requests, self.window, wait
                    );
                    sleep(wait).await;
                }
            }
            self.evict_expired(Instant::now());
        }

        self.issued.push_back(Instant::now());
    }

    /// Number of recorded requests still inside the trailing window
    pub fn requests_in_window(&self) -> usize {
        let now = Instant::now();
        self.issued
            .iter()
            .filter(|&&t| now.duration_since(t) < self.window)
            .count()
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(&front) = self.issued.front() {
            if now.duration_since(front) >= self.window {
                self.issued.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_MINUTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ceiling() {
        assert_eq!(RateLimiter::default().max_requests(), 80);
    }

    #[test]
    fn test_zero_ceiling_is_clamped() {
        assert_eq!(RateLimiter::new(0).max_requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_under_ceiling_does_not_wait() {
        let mut limiter = RateLimiter::new(5);
        let start = Instant::now();

        for _ in 0..5 {
            limiter.await_slot().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.requests_in_window(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_oldest_to_expire() {
        let mut limiter = RateLimiter::new(3);
        let start = Instant::now();

        limiter.await_slot().await;
        sleep(Duration::from_secs(10)).await;
        limiter.await_slot().await;
        limiter.await_slot().await;

        // Fourth request must wait until the first one is 60s old
        limiter.await_slot().await;

        assert_eq!(start.elapsed(), Duration::from_secs(60));
        assert_eq!(limiter.requests_in_window(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_free_slots() {
        let mut limiter = RateLimiter::with_window(2, Duration::from_secs(1));

        limiter.await_slot().await;
        limiter.await_slot().await;
        sleep(Duration::from_secs(2)).await;

        let before = Instant::now();
        limiter.await_slot().await;

        assert_eq!(before.elapsed(), Duration::ZERO);
        assert_eq!(limiter.requests_in_window(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_ceiling_in_any_window() {
        let mut limiter = RateLimiter::with_window(4, Duration::from_secs(10));
        let start = Instant::now();
        let mut stamps = Vec::new();

        for _ in 0..12 {
            limiter.await_slot().await;
            stamps.push(start.elapsed());
        }

        for (i, &t) in stamps.iter().enumerate() {
            let in_window = stamps[..=i]
                .iter()
                .filter(|&&s| t - s < Duration::from_secs(10))
                .count();
            assert!(in_window <= 4, "window ending at {:?} had {}", t, in_window);
        }
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }
}
