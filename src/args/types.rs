use clap::Parser;
use std::fmt;
use std::time::Duration;

use crate::cache::CacheTtls;
use crate::cache::memcached::MemcachedConfig;
use crate::controller::upstream::{Backoff, UpstreamConfig};
use crate::model::HistoryWindow;

#[derive(Parser, Clone)]
#[command(author, version, about = "Streams a player's recent match history", long_about = None)]
pub struct Args {
    /// Upstream API key. Falls back to the contents of --api-key-file.
    #[arg(long, env = "RIOT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    #[arg(long, value_name = "PATH", default_value = "api.key")]
    pub api_key_file: String,
    /// Upstream base URL; `{region}` is replaced by the region code.
    #[arg(long, env = "UPSTREAM_HOST_PATTERN", default_value = "https://{region}.api.pvp.net")]
    pub host_pattern: String,
    /// History window in days. Negative means unlimited.
    #[arg(long, env = "HISTORY_DAYS", default_value_t = 30, allow_negative_numbers = true)]
    pub days: i64,

    #[arg(long, default_value_t = 1800)]
    pub identity_ttl_secs: u64,
    #[arg(long, default_value_t = 300)]
    pub result_ttl_secs: u64,
    /// Leave unset to keep match records until the result tier is flushed.
    #[arg(long)]
    pub match_ttl_secs: Option<u64>,
    #[arg(long, default_value_t = 100_000)]
    pub identity_capacity: usize,
    #[arg(long, default_value_t = 100_000)]
    pub result_capacity: usize,
    #[arg(long, default_value_t = 60)]
    pub cache_check_period_secs: u64,

    /// Comma-separated memcached servers. Without them (or a key file) the cache stays in memory.
    #[arg(long, env = "MEMCACHEDCLOUD_SERVERS")]
    pub memcached_servers: Option<String>,
    #[arg(long, env = "MEMCACHEDCLOUD_USERNAME")]
    pub memcached_username: Option<String>,
    #[arg(long, env = "MEMCACHEDCLOUD_PASSWORD", hide_env_values = true)]
    pub memcached_password: Option<String>,
    /// Read when no servers are given: one line of `server|username|password`.
    #[arg(long, value_name = "PATH", default_value = "memcached.key")]
    pub memcached_key_file: String,

    /// Total attempts per upstream call, the first one included.
    #[arg(long, default_value_t = 5)]
    pub max_retries: u32,
    #[arg(long, default_value_t = 2000)]
    pub retry_delay_ms: u64,
    /// Upper bound on any single wait, `Retry-After` hints included.
    #[arg(long, default_value_t = 30_000)]
    pub retry_max_delay_ms: u64,
    #[arg(long, value_name = "constant|linear", default_value = "constant")]
    pub retry_backoff: Backoff,
    #[arg(long, value_delimiter = ',', default_value = "429,500,502,503,504")]
    pub retry_statuses: Vec<u16>,

    #[arg(long, default_value_t = 4)]
    pub detail_concurrency: usize,
    #[arg(long, default_value_t = 15)]
    pub page_size: usize,
    #[arg(long, default_value = "league-time")]
    pub user_agent: String,

    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,
    #[arg(short = 'p', long, env = "PORT", default_value_t = 8088)]
    pub port: u16,
}

/// Where both cache tiers live.
#[derive(Clone, Debug)]
pub enum CacheBackend {
    Memory,
    Memcached(MemcachedConfig),
}

#[derive(Clone)]
pub struct CleanArgs {
    pub upstream: UpstreamConfig,
    pub window: HistoryWindow,
    pub ttls: CacheTtls,
    pub cache_backend: CacheBackend,
    pub identity_capacity: usize,
    pub result_capacity: usize,
    pub cache_check_period: Duration,
    pub detail_concurrency: usize,
    pub page_size: usize,
    pub bind: String,
    pub port: u16,
}

impl fmt::Debug for CleanArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanArgs")
            .field("host_pattern", &self.upstream.host_pattern)
            .field("api_key", &"[REDACTED]")
            .field("retry", &self.upstream.retry)
            .field("window", &self.window)
            .field("ttls", &self.ttls)
            .field("cache_backend", &self.cache_backend)
            .field("identity_capacity", &self.identity_capacity)
            .field("result_capacity", &self.result_capacity)
            .field("detail_concurrency", &self.detail_concurrency)
            .field("page_size", &self.page_size)
            .field("bind", &self.bind)
            .field("port", &self.port)
            .finish()
    }
}
