use async_trait::async_trait;
use memcache::{Client, MemcacheError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::CacheStore;
use crate::error::StorageError;

/// memcached treats expirations above 30 days as absolute unix timestamps.
const RELATIVE_EXPIRY_LIMIT: u64 = 30 * 24 * 60 * 60;

#[derive(Clone)]
pub struct MemcachedConfig {
    /// `host:port` entries, or full `memcache://` URLs.
    pub servers: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for MemcachedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemcachedConfig")
            .field("servers", &self.servers)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl MemcachedConfig {
    /// Splits a comma-separated server list as found in `MEMCACHEDCLOUD_SERVERS`.
    #[must_use]
    pub fn from_parts(servers: &str, username: Option<String>, password: Option<String>) -> Self {
        Self {
            servers: servers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            username: username.filter(|u| !u.is_empty()),
            password: password.filter(|p| !p.is_empty()),
        }
    }

    /// Connection URLs; credentials switch the connection to the binary protocol for SASL.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.servers
            .iter()
            .map(|server| {
                if server.starts_with("memcache://") || server.starts_with("memcache+") {
                    return server.clone();
                }
                match (&self.username, &self.password) {
                    (Some(user), Some(pass)) => format!(
                        "memcache://{}:{}@{server}?protocol=binary",
                        urlencoding::encode(user),
                        urlencoding::encode(pass)
                    ),
                    _ => format!("memcache://{server}"),
                }
            })
            .collect()
    }
}

/// Opens the pooled client shared by both tiers.
///
/// # Errors
///
/// Will return `Err` if no server can be reached or authentication fails
pub async fn connect(config: &MemcachedConfig) -> Result<Arc<Client>, StorageError> {
    let urls = config.urls();
    if urls.is_empty() {
        return Err(StorageError::new("no memcached servers configured"));
    }
    let servers = config.servers.len();
    let client = tokio::task::spawn_blocking(move || Client::connect(urls))
        .await
        .map_err(|e| StorageError::new(format!("memcached connect task failed: {e}")))?
        .map_err(storage_error)?;
    info!(servers, "connected to memcached");
    Ok(Arc::new(client))
}

fn storage_error(err: MemcacheError) -> StorageError {
    StorageError::new(format!("memcached: {err}"))
}

/// Expiration argument for a set: 0 never expires, long TTLs become absolute timestamps.
fn expiration(ttl: Option<Duration>, now_unix: u64) -> u32 {
    let Some(ttl) = ttl else {
        return 0;
    };
    let secs = ttl.as_secs().max(1);
    let value = if secs > RELATIVE_EXPIRY_LIMIT {
        now_unix.saturating_add(secs)
    } else {
        secs
    };
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// One tier stored in memcached under a key namespace.
///
/// memcached enforces its own memory limit and expiry, so there is no local capacity flush and
/// `purge_expired` has nothing to do. `clear` flushes the whole server, every tier included.
pub struct MemcachedStore {
    namespace: &'static str,
    client: Arc<Client>,
}

impl MemcachedStore {
    #[must_use]
    pub fn new(client: Arc<Client>, namespace: &'static str) -> Self {
        Self { namespace, client }
    }

    fn key(&self, key: &str) -> String {
        format!("{}/{key}", self.namespace)
    }

    /// The client blocks on sockets, so every call runs on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Client) -> Result<T, MemcacheError> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || op(&client))
            .await
            .map_err(|e| StorageError::new(format!("memcached task failed: {e}")))?
            .map_err(storage_error)
    }
}

#[async_trait]
impl CacheStore for MemcachedStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let key = self.key(key);
        self.blocking(move |c| c.get::<String>(&key)).await
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let key = self.key(key);
        let now_unix = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        let exp = expiration(ttl, now_unix);
        self.blocking(move |c| c.set(&key, value.as_str(), exp)).await
    }

    async fn len(&self) -> Result<usize, StorageError> {
        let stats = self.blocking(|c| c.stats()).await?;
        Ok(stats
            .iter()
            .filter_map(|(_, s)| s.get("curr_items"))
            .filter_map(|n| n.parse::<usize>().ok())
            .sum())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.blocking(|c| c.flush()).await
    }

    async fn purge_expired(&self) -> Result<usize, StorageError> {
        Ok(0)
    }
}
