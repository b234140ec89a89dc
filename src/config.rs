use crate::rate_limit::DEFAULT_REQUESTS_PER_MINUTE;
use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::state::DEFAULT_FLUSH_EVERY;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default number of distinct values translated between progress reports
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Engine tunables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // Pacing
    pub requests_per_minute: usize,
    pub max_retries: u32,
    pub base_delay: Duration,

    // Batching & durability
    pub batch_size: usize,
    pub flush_every: usize,
    pub state_file: PathBuf,
}

/// Settings for the OpenAI-compatible translation backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub target_language: String,
    pub request_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            max_retries: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(100),
            batch_size: DEFAULT_BATCH_SIZE,
            flush_every: DEFAULT_FLUSH_EVERY,
            state_file: PathBuf::from("translation_state.json"),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            requests_per_minute: env_or("REQUESTS_PER_MINUTE", defaults.requests_per_minute),
            max_retries: env_or("MAX_RETRIES", defaults.max_retries),
            base_delay: Duration::from_millis(env_or("BASE_DELAY_MS", 100u64)),
            batch_size: env_or("BATCH_SIZE", defaults.batch_size).max(1),
            flush_every: env_or("FLUSH_EVERY", defaults.flush_every).max(1),
            state_file: std::env::var("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_file),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.base_delay)
    }
}

impl BackendConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            api_key: std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?,
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            target_language: std::env::var("TARGET_LANGUAGE")
                .unwrap_or_else(|_| "Russian".to_string()),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 60),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENGINE_VARS: [&str; 6] = [
        "REQUESTS_PER_MINUTE",
        "MAX_RETRIES",
        "BASE_DELAY_MS",
        "BATCH_SIZE",
        "FLUSH_EVERY",
        "STATE_FILE",
    ];

    const BACKEND_VARS: [&str; 5] = [
        "OPENAI_API_URL",
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
        "TARGET_LANGUAGE",
        "REQUEST_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for var in ENGINE_VARS.iter().chain(BACKEND_VARS.iter()) {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_engine_defaults() {
        clear_env();
        let config = EngineConfig::from_env();

        assert_eq!(config.requests_per_minute, 80);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay, Duration::from_millis(100));
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.flush_every, 50);
        assert_eq!(config.state_file, PathBuf::from("translation_state.json"));
    }

    #[test]
    #[serial]
    fn test_engine_overrides() {
        clear_env();
        std::env::set_var("REQUESTS_PER_MINUTE", "20");
        std::env::set_var("MAX_RETRIES", "2");
        std::env::set_var("BASE_DELAY_MS", "0");
        std::env::set_var("BATCH_SIZE", "10");
        std::env::set_var("STATE_FILE", "/tmp/state.json");

        let config = EngineConfig::from_env();
        clear_env();

        assert_eq!(config.requests_per_minute, 20);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.base_delay, Duration::ZERO);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.state_file, PathBuf::from("/tmp/state.json"));
    }

    #[test]
    #[serial]
    fn test_engine_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("BATCH_SIZE", "lots");
        std::env::set_var("FLUSH_EVERY", "0");

        let config = EngineConfig::from_env();
        clear_env();

        assert_eq!(config.batch_size, 50);
        assert_eq!(config.flush_every, 1);
    }

    #[test]
    #[serial]
    fn test_backend_requires_api_key() {
        clear_env();
        let err = BackendConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    #[serial]
    fn test_backend_defaults() {
        clear_env();
        std::env::set_var("OPENAI_API_KEY", "sk-test");

        let config = BackendConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.target_language, "Russian");
        assert_eq!(config.request_timeout_secs, 60);
        assert!(config.api_url.ends_with("/v1/chat/completions"));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = EngineConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(5),
            ..EngineConfig::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(5));
    }
}
