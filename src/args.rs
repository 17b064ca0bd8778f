use clap::Parser;
use std::time::Duration;

pub mod types;
pub mod validation;

pub use types::{Args, CacheBackend, CleanArgs};

use crate::cache::CacheTtls;
use crate::cache::memcached::MemcachedConfig;
use crate::controller::upstream::{RetryPolicy, UpstreamConfig};
use crate::model::HistoryWindow;

/// Parses the command line and environment into a validated configuration.
///
/// # Errors
///
/// Will return `Err` if the arguments are invalid
pub fn args_checks() -> Result<CleanArgs, String> {
    let mut xx = Args::parse();
    xx.validate()?;
    Ok(CleanArgs::new(xx))
}

impl CleanArgs {
    #[must_use]
    pub fn new(args: Args) -> Self {
        CleanArgs {
            upstream: UpstreamConfig {
                api_key: args.api_key.unwrap_or_default().trim().to_string(),
                host_pattern: args.host_pattern,
                user_agent: args.user_agent,
                retry: RetryPolicy {
                    max_attempts: args.max_retries,
                    base_delay: Duration::from_millis(args.retry_delay_ms),
                    max_delay: Duration::from_millis(args.retry_max_delay_ms),
                    backoff: args.retry_backoff,
                    retry_statuses: args.retry_statuses,
                },
            },
            window: HistoryWindow(args.days),
            ttls: CacheTtls {
                identity: Duration::from_secs(args.identity_ttl_secs),
                aggregate: Duration::from_secs(args.result_ttl_secs),
                matches: args.match_ttl_secs.map(Duration::from_secs),
            },
            cache_backend: match args.memcached_servers.as_deref() {
                Some(servers) if !servers.trim().is_empty() => {
                    CacheBackend::Memcached(MemcachedConfig::from_parts(
                        servers,
                        args.memcached_username,
                        args.memcached_password,
                    ))
                }
                _ => CacheBackend::Memory,
            },
            identity_capacity: args.identity_capacity,
            result_capacity: args.result_capacity,
            cache_check_period: Duration::from_secs(args.cache_check_period_secs),
            detail_concurrency: args.detail_concurrency,
            page_size: args.page_size,
            bind: args.bind,
            port: args.port,
        }
    }
}
