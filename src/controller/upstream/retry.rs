use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Every retry waits the base delay.
    Constant,
    /// Retry `n` waits `n * base`.
    Linear,
}

impl std::str::FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "constant" => Ok(Backoff::Constant),
            "linear" => Ok(Backoff::Linear),
            other => Err(format!("unknown backoff '{other}', expected constant or linear")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per call, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Ceiling for any single delay, server hints included.
    pub max_delay: Duration,
    pub backoff: Backoff,
    /// Statuses retried besides 429.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(2000),
            max_delay: Duration::from_secs(30),
            backoff: Backoff::Constant,
            retry_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn is_retryable(&self, status: u16) -> bool {
        status == 429 || self.retry_statuses.contains(&status)
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// A server hint wins over the configured delay. The result is capped at `max_delay` and never
    /// drops below `previous`, so delays within one call are non-decreasing.
    #[must_use]
    pub fn next_delay(&self, retry: u32, hint: Option<Duration>, previous: Duration) -> Duration {
        let configured = match self.backoff {
            Backoff::Constant => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(retry.max(1)),
        };
        hint.unwrap_or(configured).min(self.max_delay).max(previous)
    }
}

/// Reads `Retry-After` as (possibly fractional) seconds. Values too large for a `Duration` are ignored.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}
