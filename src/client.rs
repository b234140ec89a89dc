use crate::backend::TranslationBackend;
use crate::error::{BackendError, FailureKind};
use crate::filter::should_translate;
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::state::StateStore;
use crate::stats::SessionStatistics;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Emit a throughput summary every this many requests
const THROUGHPUT_LOG_EVERY: u64 = 50;

/// First 50 characters of a cell, for log lines
fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(50).collect();
    if preview.len() < text.len() {
        preview.push_str("...");
    }
    preview
}

/// Wraps a raw backend with caching, pacing and classified retries.
///
/// [`translate`](Self::translate) never fails: a unit that exhausts its
/// attempts is recorded in the state store and passed through unchanged.
pub struct RetryingTranslationClient<B> {
    backend: B,
    limiter: RateLimiter,
    policy: RetryPolicy,
    stats: SessionStatistics,
}

impl<B: TranslationBackend> RetryingTranslationClient<B> {
    pub fn new(backend: B, limiter: RateLimiter, policy: RetryPolicy) -> Self {
        Self {
            backend,
            limiter,
            policy,
            stats: SessionStatistics::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &SessionStatistics {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Translate one cell value.
    ///
    /// Filtered values come back untouched without a request; cached values
    /// come back without touching the rate limiter.
    pub async fn translate(&mut self, store: &mut StateStore, text: &str) -> String {
        if !should_translate(text) {
            return text.to_string();
        }

        if let Some(cached) = store.get(text) {
            self.stats.record_cache_hit();
            debug!("Cache hit for '{}'", preview(text));
            return cached.to_string();
        }

        let max_attempts = self.policy.max_attempts;
        let mut last_error: Option<BackendError> = None;
        let mut backoff_step = 0u32;

        for attempt in 0..max_attempts {
            self.limiter.await_slot().await;
            sleep(self.policy.attempt_delay()).await;
            self.record_request();

            let result = match self.backend.raw_translate(text).await {
                Ok(translated) if translated.trim().is_empty() => Err(BackendError::other(
                    "Backend returned an empty translation",
                )),
                other => other,
            };

            match result {
                Ok(translated) => {
                    if attempt > 0 {
                        debug!(
                            "'{}': Succeeded on attempt {}/{}",
                            preview(text),
                            attempt + 1,
                            max_attempts
                        );
                    }
                    store.put(text, &translated);
                    self.stats.record_translated();
                    return translated;
                }
                Err(e) => {
                    let remaining = max_attempts - attempt - 1;
                    if remaining > 0 {
                        // Throttling waits do not grow the exponential schedule
                        let delay = match e.kind {
                            FailureKind::RateLimited => {
                                self.policy.backoff(FailureKind::RateLimited, 0)
                            }
                            kind => {
                                let delay = self.policy.backoff(kind, backoff_step);
                                backoff_step += 1;
                                delay
                            }
                        };
                        warn!(
                            "'{}': Attempt {}/{} failed ({}), retrying in {:.1}s",
                            preview(text),
                            attempt + 1,
                            max_attempts,
                            e,
                            delay.as_secs_f64()
                        );
                        self.stats.record_retry();
                        sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt was made".to_string());
        error!(
            "Failed to translate '{}' after {} attempts: {}",
            preview(text),
            max_attempts,
            reason
        );
        store.mark_failed(text, &reason);
        self.stats.record_failure();
        text.to_string()
    }

    fn record_request(&mut self) {
        self.stats.record_request();
        if self.stats.requests() % THROUGHPUT_LOG_EVERY == 0 {
            info!("Throughput: {}", self.stats.snapshot());
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    /// Backend that replays scripted failures per text, then answers `T(text)`.
    #[derive(Default)]
    pub(crate) struct ScriptedBackend {
        failures: Mutex<HashMap<String, VecDeque<BackendError>>>,
        always_fail: Mutex<Option<FailureKind>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn failing_with(kind: FailureKind) -> Self {
            let backend = Self::default();
            *backend.always_fail.lock().unwrap() = Some(kind);
            backend
        }

        pub(crate) fn fail_next(&self, text: &str, error: BackendError) {
            self.failures
                .lock()
                .unwrap()
                .entry(text.to_string())
                .or_default()
                .push_back(error);
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl TranslationBackend for ScriptedBackend {
        fn raw_translate<'a>(
            &'a self,
            text: &'a str,
        ) -> BoxFuture<'a, Result<String, BackendError>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(text.to_string());
                if let Some(kind) = *self.always_fail.lock().unwrap() {
                    return Err(BackendError::new(kind, "scripted failure"));
                }
                let next = self
                    .failures
                    .lock()
                    .unwrap()
                    .get_mut(text)
                    .and_then(|queue| queue.pop_front());
                match next {
                    Some(err) => Err(err),
                    None => Ok(format!("T({})", text)),
                }
            })
        }
    }

    pub(crate) fn test_client(
        backend: Arc<ScriptedBackend>,
        max_attempts: u32,
    ) -> RetryingTranslationClient<Arc<ScriptedBackend>> {
        RetryingTranslationClient::new(
            backend,
            RateLimiter::new(1000),
            RetryPolicy::new(max_attempts, Duration::ZERO).with_attempt_jitter(0.0),
        )
    }

    // ==================== Pre-filter ====================

    #[tokio::test(start_paused = true)]
    async fn test_filtered_inputs_make_no_calls() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut client = test_client(backend.clone(), 5);
        let mut store = StateStore::in_memory();

        for input in ["123", "2024-05-01", "", "a", "###"] {
            assert_eq!(client.translate(&mut store, input).await, input);
        }

        assert_eq!(backend.call_count(), 0);
        assert_eq!(client.stats().requests(), 0);
        assert_eq!(store.cache_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_text_is_translated_and_cached() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut client = test_client(backend.clone(), 5);
        let mut store = StateStore::in_memory();

        let result = client.translate(&mut store, "Hello world").await;

        assert_eq!(result, "T(Hello world)");
        assert_eq!(store.get("Hello world"), Some("T(Hello world)"));
        assert_eq!(client.stats().translated(), 1);
        assert_eq!(client.stats().requests(), 1);
    }

    // ==================== Cache ====================

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_backend() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut client = test_client(backend.clone(), 5);
        let mut store = StateStore::in_memory();
        store.put("Hello world", "Hola mundo");

        let result = client.translate(&mut store, "Hello world").await;

        assert_eq!(result, "Hola mundo");
        assert_eq!(backend.call_count(), 0);
        assert_eq!(client.stats().cached(), 1);
        assert_eq!(client.stats().translated(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_is_served_from_cache() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut client = test_client(backend.clone(), 5);
        let mut store = StateStore::in_memory();

        client.translate(&mut store, "Good morning").await;
        client.translate(&mut store, "Good morning").await;

        assert_eq!(backend.call_count(), 1);
        assert_eq!(client.stats().cached(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_does_not_consume_rate_limit() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut client = RetryingTranslationClient::new(
            backend.clone(),
            RateLimiter::new(1),
            RetryPolicy::new(1, Duration::ZERO).with_attempt_jitter(0.0),
        );
        let mut store = StateStore::in_memory();
        let start = Instant::now();

        client.translate(&mut store, "Hello there").await;
        for _ in 0..10 {
            client.translate(&mut store, "Hello there").await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    // ==================== Retries ====================

    #[tokio::test(start_paused = true)]
    async fn test_network_exhaustion_returns_original() {
        let backend = Arc::new(ScriptedBackend::failing_with(FailureKind::Network));
        let mut client = test_client(backend.clone(), 5);
        let mut store = StateStore::in_memory();

        let result = client.translate(&mut store, "Hello world").await;

        assert_eq!(result, "Hello world");
        assert_eq!(backend.call_count(), 5);
        assert_eq!(client.stats().failed(), 1);
        assert_eq!(client.stats().retries(), 4);
        assert_eq!(client.stats().requests(), 5);
        assert_eq!(store.failed_translations().len(), 1);
        assert!(store.failed_translations()["Hello world"]
            .error
            .contains("network"));
        assert_eq!(store.get("Hello world"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_backoff_schedule() {
        let backend = Arc::new(ScriptedBackend::failing_with(FailureKind::Network));
        let mut client = test_client(backend, 4);
        let mut store = StateStore::in_memory();
        let start = Instant::now();

        client.translate(&mut store, "Hello world").await;

        // 1 + 2 + 4 seconds plus up to 1s jitter each
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(7), "got {:?}", elapsed);
        assert!(elapsed <= Duration::from_secs(10), "got {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_uses_long_flat_backoff() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.fail_next("Hello world", BackendError::rate_limited("429"));
        backend.fail_next("Hello world", BackendError::rate_limited("429"));
        let mut client = test_client(backend.clone(), 5);
        let mut store = StateStore::in_memory();
        let start = Instant::now();

        let result = client.translate(&mut store, "Hello world").await;

        assert_eq!(result, "T(Hello world)");
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60), "got {:?}", elapsed);
        assert!(elapsed <= Duration::from_secs(80), "got {:?}", elapsed);
        assert_eq!(client.stats().retries(), 2);
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_does_not_grow_exponential_schedule() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.fail_next("Hello world", BackendError::rate_limited("429"));
        backend.fail_next("Hello world", BackendError::other("boom"));
        let mut client = test_client(backend, 5);
        let mut store = StateStore::in_memory();
        let start = Instant::now();

        client.translate(&mut store, "Hello world").await;

        // 30..40s for the throttle, then 0.5..1s for the first "other" failure
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs_f64(30.5), "got {:?}", elapsed);
        assert!(elapsed <= Duration::from_secs(41), "got {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_translation_is_retried() {
        struct BlankOnce(Mutex<u32>);

        impl TranslationBackend for BlankOnce {
            fn raw_translate<'a>(
                &'a self,
                _text: &'a str,
            ) -> BoxFuture<'a, Result<String, BackendError>> {
                Box::pin(async move {
                    let mut calls = self.0.lock().unwrap();
                    *calls += 1;
                    if *calls == 1 {
                        Ok("   ".to_string())
                    } else {
                        Ok("Привет".to_string())
                    }
                })
            }
        }

        let mut client = RetryingTranslationClient::new(
            BlankOnce(Mutex::new(0)),
            RateLimiter::new(100),
            RetryPolicy::new(3, Duration::ZERO),
        );
        let mut store = StateStore::in_memory();

        let result = client.translate(&mut store, "Hello").await;

        assert_eq!(result, "Привет");
        assert_eq!(client.stats().retries(), 1);
        assert_eq!(client.stats().requests(), 2);
        assert_eq!(*client.backend().0.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_success_clears_failure_record() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.fail_next("Hello world", BackendError::other("boom"));
        let mut client = test_client(backend, 1);
        let mut store = StateStore::in_memory();

        assert_eq!(client.translate(&mut store, "Hello world").await, "Hello world");
        assert_eq!(store.failed_translations().len(), 1);

        assert_eq!(
            client.translate(&mut store, "Hello world").await,
            "T(Hello world)"
        );
        assert!(store.failed_translations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_attempt_waits_for_rate_limiter() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut client = RetryingTranslationClient::new(
            backend,
            RateLimiter::with_window(2, Duration::from_secs(10)),
            RetryPolicy::new(1, Duration::ZERO).with_attempt_jitter(0.0),
        );
        let mut store = StateStore::in_memory();
        let start = Instant::now();

        client.translate(&mut store, "one one").await;
        client.translate(&mut store, "two two").await;
        client.translate(&mut store, "three three").await;

        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stats() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut client = test_client(backend, 1);
        let mut store = StateStore::in_memory();
        client.translate(&mut store, "Hello world").await;

        client.reset_stats();

        assert_eq!(client.stats().translated(), 0);
        assert_eq!(client.stats().requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counters_across_throughput_log_boundary() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut client = test_client(backend.clone(), 1);
        let mut store = StateStore::in_memory();

        for i in 0..THROUGHPUT_LOG_EVERY {
            client.translate(&mut store, &format!("Item number {}", i)).await;
        }
        assert_eq!(client.stats().requests(), THROUGHPUT_LOG_EVERY);
        assert_eq!(client.stats().translated(), THROUGHPUT_LOG_EVERY);

        client.translate(&mut store, "One more item").await;
        assert_eq!(client.stats().requests(), THROUGHPUT_LOG_EVERY + 1);
        assert_eq!(backend.call_count() as u64, THROUGHPUT_LOG_EVERY + 1);
        assert_eq!(store.cache_len() as u64, THROUGHPUT_LOG_EVERY + 1);
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let long = "x".repeat(80);
        let short = preview(&long);
        assert_eq!(short.len(), 53);
        assert!(short.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }
}
