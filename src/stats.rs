//! Per-run translation statistics.
//!
//! Counters live on a plain struct owned by the retrying client and are
//! mutated through `&mut`; a run has exactly one worker, so no atomics or
//! locks are involved. Nothing here is persisted.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Live counters for the current orchestration run.
#[derive(Debug, Clone)]
pub struct SessionStatistics {
    /// Units translated by the backend in this run
    translated: u64,

    /// Units served from the translation cache
    cached: u64,

    /// Units that exhausted all retries and fell back to the original text
    failed: u64,

    /// Failed attempts that were followed by another attempt
    retries: u64,

    /// Backend requests issued (every attempt counts)
    requests: u64,

    started_at: Instant,
}

impl SessionStatistics {
    pub fn new() -> Self {
        Self {
            translated: 0,
            cached: 0,
            failed: 0,
            retries: 0,
            requests: 0,
            started_at: Instant::now(),
        }
    }

    /// Zero every counter and restart the clock.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn record_translated(&mut self) {
        self.translated += 1;
    }

    pub fn record_cache_hit(&mut self) {
        self.cached += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    pub fn record_request(&mut self) {
        self.requests += 1;
    }

    pub fn translated(&self) -> u64 {
        self.translated
    }

    pub fn cached(&self) -> u64 {
        self.cached
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn retries(&self) -> u64 {
        self.retries
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Generate a point-in-time report.
    pub fn snapshot(&self) -> StatsSnapshot {
        let elapsed = self.elapsed().as_secs_f64();
        let requests_per_minute = if elapsed > 0.0 {
            self.requests as f64 / elapsed * 60.0
        } else {
            0.0
        };

        let lookups = self.cached + self.translated + self.failed;
        let cache_hit_rate = if lookups > 0 {
            (self.cached as f64 / lookups as f64) * 100.0
        } else {
            0.0
        };

        StatsSnapshot {
            translated: self.translated,
            cached: self.cached,
            failed: self.failed,
            retries: self.retries,
            requests: self.requests,
            elapsed_secs: elapsed,
            requests_per_minute,
            cache_hit_rate,
        }
    }
}

impl Default for SessionStatistics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`SessionStatistics`] handed to progress callbacks and callers.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub translated: u64,
    pub cached: u64,
    pub failed: u64,
    pub retries: u64,
    pub requests: u64,
    pub elapsed_secs: f64,
    pub requests_per_minute: f64,

    /// Cache hit rate as a percentage (0-100) of all resolved units
    pub cache_hit_rate: f64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "translated {}, cached {}, failed {}, retries {}, requests {} ({:.1}/min, {:.0}s)",
            self.translated,
            self.cached,
            self.failed,
            self.retries,
            self.requests,
            self.requests_per_minute,
            self.elapsed_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = SessionStatistics::new();
        assert_eq!(stats.translated(), 0);
        assert_eq!(stats.cached(), 0);
        assert_eq!(stats.failed(), 0);
        assert_eq!(stats.retries(), 0);
        assert_eq!(stats.requests(), 0);
    }

    #[test]
    fn test_record_and_reset() {
        let mut stats = SessionStatistics::new();
        stats.record_translated();
        stats.record_cache_hit();
        stats.record_cache_hit();
        stats.record_failure();
        stats.record_retry();
        stats.record_request();

        assert_eq!(stats.translated(), 1);
        assert_eq!(stats.cached(), 2);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.retries(), 1);
        assert_eq!(stats.requests(), 1);

        stats.reset();
        assert_eq!(stats.cached(), 0);
        assert_eq!(stats.requests(), 0);
    }

    #[test]
    fn test_snapshot_cache_hit_rate() {
        let mut stats = SessionStatistics::new();
        stats.record_cache_hit();
        stats.record_translated();
        stats.record_translated();
        stats.record_failure();

        let snapshot = stats.snapshot();
        assert!((snapshot.cache_hit_rate - 25.0).abs() < 0.001);
    }

    #[test]
    fn test_snapshot_empty_rates_are_zero() {
        let snapshot = SessionStatistics::new().snapshot();
        assert_eq!(snapshot.cache_hit_rate, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_throughput() {
        let mut stats = SessionStatistics::new();
        for _ in 0..30 {
            stats.record_request();
        }
        tokio::time::sleep(Duration::from_secs(30)).await;

        let snapshot = stats.snapshot();
        assert!((snapshot.requests_per_minute - 60.0).abs() < 0.001);
        assert!((snapshot.elapsed_secs - 30.0).abs() < 0.001);
    }

    #[test]
    fn test_snapshot_display_and_serialize() {
        let mut stats = SessionStatistics::new();
        stats.record_translated();
        let snapshot = stats.snapshot();

        let text = snapshot.to_string();
        assert!(text.contains("translated 1"));
        assert!(text.contains("failed 0"));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["translated"], 1);
    }
}
