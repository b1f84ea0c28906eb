/// Configuration for the sync engine
///
/// Loads configuration from environment variables; every knob has a default.
use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

use resilience::RetryConfig;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum simultaneous remote fetches during a pull.
    pub max_parallel_fetches: usize,
    /// Time limit on a single remote call; elapsed counts as transient.
    pub remote_timeout: Duration,
    /// Backoff policy for transient remote failures.
    pub retry: RetryConfig,
    /// After a committed like toggle, re-read the item record's count field.
    pub refresh_counts_on_commit: bool,
    /// Asset pairs kept resident before least-recently-used eviction.
    pub max_cached_asset_pairs: usize,
    /// Cadence of the periodic push worker.
    pub push_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_parallel_fetches: default_max_parallel_fetches(),
            remote_timeout: Duration::from_millis(default_remote_timeout_ms()),
            retry: RetryConfig {
                max_retries: default_max_retries(),
                initial_backoff: Duration::from_millis(default_retry_base_ms()),
                max_backoff: Duration::from_millis(default_retry_max_backoff_ms()),
                backoff_multiplier: 2.0,
                jitter: true,
            },
            refresh_counts_on_commit: true,
            max_cached_asset_pairs: default_max_cached_asset_pairs(),
            push_interval: Duration::from_secs(default_push_interval_secs()),
        }
    }
}

// Default values
fn default_max_parallel_fetches() -> usize {
    4
}

fn default_remote_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    200
}

fn default_retry_max_backoff_ms() -> u64 {
    10_000
}

fn default_max_cached_asset_pairs() -> usize {
    256
}

fn default_push_interval_secs() -> u64 {
    30
}

impl SyncConfig {
    /// Load configuration from environment variables. Unset variables fall
    /// back to defaults; set-but-malformed values are an error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_parallel_fetches: env_parse("SYNC_MAX_PARALLEL_FETCHES")?
                .unwrap_or(defaults.max_parallel_fetches),
            remote_timeout: env_parse("SYNC_REMOTE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.remote_timeout),
            retry: RetryConfig {
                max_retries: env_parse("SYNC_MAX_RETRIES")?.unwrap_or(defaults.retry.max_retries),
                initial_backoff: env_parse("SYNC_RETRY_BASE_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.initial_backoff),
                max_backoff: env_parse("SYNC_RETRY_MAX_BACKOFF_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.max_backoff),
                ..defaults.retry
            },
            refresh_counts_on_commit: env_parse("SYNC_REFRESH_COUNTS_ON_COMMIT")?
                .unwrap_or(defaults.refresh_counts_on_commit),
            max_cached_asset_pairs: env_parse("SYNC_MAX_CACHED_ASSET_PAIRS")?
                .unwrap_or(defaults.max_cached_asset_pairs),
            push_interval: env_parse("SYNC_PUSH_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.push_interval),
        })
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{key} has an invalid value")),
        Err(_) => Ok(None),
    }
}
