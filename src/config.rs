use crate::error::{EiaError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.eia.gov/v2/";
pub const DEFAULT_MAX_ROWS_PER_REQUEST: usize = 4000;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_DEFAULT_CONCURRENCY: usize = 8;

/// Per-chunk retry on connection errors, 429 and 5xx.
///
/// `max_retries = 0` disables retrying: the first failure aborts the query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 0, base_delay_ms: 500 }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt + 1`: `base × 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Everything the client needs that is not part of a single query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub max_concurrency: usize,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            max_concurrency: default_concurrency(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_CONCURRENCY)
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), ..Default::default() }
    }

    /// `EIA_API_KEY` is required; `EIA_BASE_URL`, `EIA_MAX_CONCURRENCY`,
    /// `EIA_TIMEOUT_SECS` and `EIA_MAX_RETRIES` override defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("EIA_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| EiaError::invalid("EIA_API_KEY is not set"))?;
        let mut config = Self::new(api_key);
        if let Some(url) = lookup("EIA_BASE_URL") {
            config.base_url = url;
        }
        if let Some(n) = lookup("EIA_MAX_CONCURRENCY") {
            config.max_concurrency = parse_number("EIA_MAX_CONCURRENCY", &n)?;
        }
        if let Some(secs) = lookup("EIA_TIMEOUT_SECS") {
            config.timeout_secs = parse_number("EIA_TIMEOUT_SECS", &secs)?;
        }
        if let Some(retries) = lookup("EIA_MAX_RETRIES") {
            config.retry.max_retries = parse_number("EIA_MAX_RETRIES", &retries)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        use anyhow::Context;

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(EiaError::invalid("base_url is empty"));
        }
        if self.max_concurrency == 0 {
            return Err(EiaError::invalid("max_concurrency must be at least 1"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_number<N: std::str::FromStr>(name: &str, raw: &str) -> Result<N> {
    raw.trim()
        .parse()
        .map_err(|_| EiaError::invalid(format!("{name} is not a number: '{raw}'")))
}
