use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::UpstreamApi;
use super::retry::{RetryPolicy, parse_retry_after};
use crate::error::AppError;
use crate::model::Region;

pub const REGION_PLACEHOLDER: &str = "{region}";

#[derive(Clone)]
pub struct UpstreamConfig {
    pub api_key: String,
    /// Base URL, with `{region}` replaced by the region code.
    pub host_pattern: String,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

/// reqwest-backed client for the game-statistics API.
///
/// 429 and the configured 5xx statuses are retried after an async timer, so a pending backoff never
/// blocks other requests. Connection failures and every other status are terminal.
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    config: UpstreamConfig,
}

impl fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("host_pattern", &self.config.host_pattern)
            .field("api_key", &"[REDACTED]")
            .field("retry", &self.config.retry)
            .finish()
    }
}

impl UpstreamClient {
    /// # Errors
    ///
    /// Will return `Err` if the underlying reqwest client fails to build
    pub fn new(config: UpstreamConfig) -> Result<Self, AppError> {
        let http = ClientBuilder::new()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                error!(error = %e, "failed to build http client");
                AppError::Transport(format!("HTTP client build failed: {e}"))
            })?;
        Ok(Self { http, config })
    }

    fn url(&self, region: Region, path: &str, params: &[(&str, String)]) -> String {
        let host = self
            .config
            .host_pattern
            .replace(REGION_PLACEHOLDER, region.code());
        let mut query: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        query.push(format!("api_key={}", urlencoding::encode(&self.config.api_key)));
        format!(
            "{}/api/lol/{}{}?{}",
            host.trim_end_matches('/'),
            region.code(),
            path,
            query.join("&")
        )
    }
}

fn sanitize_network_error(error: &reqwest::Error) -> String {
    if error.is_connect() {
        "connection refused or unreachable".to_string()
    } else if error.is_timeout() {
        "connection timed out".to_string()
    } else if error.is_body() {
        "response body error".to_string()
    } else {
        "request failed".to_string()
    }
}

fn terminal_error(status: u16, detail: String) -> AppError {
    match status {
        404 => AppError::NotFound("not found".to_string()),
        _ => AppError::UpstreamFatal { status, detail },
    }
}

fn exhausted_error(status: u16) -> AppError {
    if status == 429 {
        AppError::RateLimited { status }
    } else {
        AppError::Transient { status }
    }
}

#[async_trait]
impl UpstreamApi for UpstreamClient {
    async fn fetch(
        &self,
        region: Region,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, AppError> {
        let url = self.url(region, path, params);
        let policy = &self.config.retry;
        let mut attempt: u32 = 1;
        let mut previous_delay = Duration::ZERO;

        loop {
            let response = self.http.get(&url).send().await.map_err(|e| {
                let reason = sanitize_network_error(&e);
                // The URL carries the api key.
                error!(%region, path, error = %e.without_url(), "upstream transport failure");
                AppError::Transport(reason)
            })?;
            let status = response.status();

            if status.is_success() {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| AppError::Transport(sanitize_network_error(&e)))?;
                debug!(%region, path, attempt, "upstream call succeeded");
                return serde_json::from_slice(&body).map_err(|e| AppError::Parse(e.to_string()));
            }

            let code = status.as_u16();
            if policy.is_retryable(code) {
                if attempt >= policy.max_attempts {
                    warn!(%region, path, status = code, attempt, "upstream retries exhausted");
                    return Err(exhausted_error(code));
                }
                let delay = policy.next_delay(attempt, parse_retry_after(response.headers()), previous_delay);
                warn!(
                    %region,
                    path,
                    status = code,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "upstream asked us to back off, retrying"
                );
                drop(response);
                tokio::time::sleep(delay).await;
                previous_delay = delay;
                attempt += 1;
                continue;
            }

            let raw_text = response.text().await.unwrap_or_default();
            let detail: String = raw_text.chars().take(256).collect();
            debug!(%region, path, status = code, "upstream returned terminal status");
            return Err(terminal_error(code, detail));
        }
    }
}
