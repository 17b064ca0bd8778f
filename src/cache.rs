use ahash::RandomState;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::model::{AccountId, AggregateResult, MatchRecord, Region, StandardName};

pub mod memcached;

use memcached::{MemcachedConfig, MemcachedStore};

/// Key-value backend for one cache tier, addressed by composite string keys.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>)
    -> Result<(), StorageError>;
    async fn len(&self) -> Result<usize, StorageError>;
    async fn clear(&self) -> Result<(), StorageError>;
    /// Drops expired entries, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize, StorageError>;
}

#[derive(Clone, Debug)]
struct CacheEntry {
    value: String,
    inserted_at: Instant,
    ttl: Option<Duration>,
}

impl CacheEntry {
    fn is_visible(&self, now: Instant) -> bool {
        self.ttl
            .is_none_or(|ttl| now.saturating_duration_since(self.inserted_at) < ttl)
    }
}

/// In-process tier. When a new key would push the tier past `capacity`, the whole tier is flushed first.
pub struct MemoryStore {
    name: &'static str,
    capacity: usize,
    entries: RwLock<HashMap<String, CacheEntry, RandomState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::with_hasher(RandomState::new())),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self.entries.read().await;
        Ok(map
            .get(key)
            .filter(|entry| entry.is_visible(Instant::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let mut map = self.entries.write().await;
        if !map.contains_key(key) && map.len() >= self.capacity {
            debug!(tier = self.name, entries = map.len(), "cache tier full, flushing");
            map.clear();
        }
        map.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn len(&self) -> Result<usize, StorageError> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StorageError> {
        let now = Instant::now();
        let mut map = self.entries.write().await;
        let before = map.len();
        map.retain(|_, entry| entry.is_visible(now));
        Ok(before - map.len())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub identity: Duration,
    pub aggregate: Duration,
    /// `None` keeps match records until a capacity flush.
    pub matches: Option<Duration>,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            identity: Duration::from_secs(30 * 60),
            aggregate: Duration::from_secs(5 * 60),
            matches: None,
        }
    }
}

/// Two-tier cache shared by every request: identities in one tier, aggregates and match records in the other.
///
/// Caching is an optimization only. Backend failures are logged and read as misses.
pub struct ResultCache {
    identity: Arc<dyn CacheStore>,
    results: Arc<dyn CacheStore>,
    ttls: CacheTtls,
}

impl ResultCache {
    #[must_use]
    pub fn new(identity: Arc<dyn CacheStore>, results: Arc<dyn CacheStore>, ttls: CacheTtls) -> Self {
        Self {
            identity,
            results,
            ttls,
        }
    }

    #[must_use]
    pub fn in_memory(identity_capacity: usize, result_capacity: usize, ttls: CacheTtls) -> Self {
        Self::new(
            Arc::new(MemoryStore::new("identity", identity_capacity)),
            Arc::new(MemoryStore::new("results", result_capacity)),
            ttls,
        )
    }

    /// Both tiers on one memcached client, separated by key namespace.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the servers cannot be reached
    pub async fn memcached(config: &MemcachedConfig, ttls: CacheTtls) -> Result<Self, StorageError> {
        let client = memcached::connect(config).await?;
        Ok(Self::new(
            Arc::new(MemcachedStore::new(Arc::clone(&client), "identity")),
            Arc::new(MemcachedStore::new(client, "results")),
            ttls,
        ))
    }

    #[must_use]
    pub fn identity_key(region: Region, name: &StandardName) -> String {
        format!("{region}:{name}")
    }

    #[must_use]
    pub fn aggregate_key(region: Region, account: AccountId) -> String {
        format!("{region}!{account}")
    }

    #[must_use]
    pub fn match_key(match_id: u64) -> String {
        format!("game:{match_id}")
    }

    pub async fn get_identity(&self, region: Region, name: &StandardName) -> Option<AccountId> {
        read_typed(&*self.identity, &Self::identity_key(region, name)).await
    }

    pub async fn set_identity(&self, region: Region, name: &StandardName, account: AccountId) {
        let key = Self::identity_key(region, name);
        write_typed(&*self.identity, &key, &account, Some(self.ttls.identity)).await;
    }

    pub async fn get_aggregate(&self, region: Region, account: AccountId) -> Option<AggregateResult> {
        read_typed(&*self.results, &Self::aggregate_key(region, account)).await
    }

    pub async fn set_aggregate(&self, region: Region, account: AccountId, result: &AggregateResult) {
        let key = Self::aggregate_key(region, account);
        write_typed(&*self.results, &key, result, Some(self.ttls.aggregate)).await;
    }

    pub async fn get_match(&self, match_id: u64) -> Option<MatchRecord> {
        read_typed(&*self.results, &Self::match_key(match_id)).await
    }

    pub async fn set_match(&self, record: &MatchRecord) {
        let key = Self::match_key(record.match_id);
        write_typed(&*self.results, &key, record, self.ttls.matches).await;
    }

    /// Reclaims memory held by expired entries in both tiers.
    pub async fn purge_expired(&self) -> usize {
        let mut removed = 0;
        for (tier, store) in [("identity", &self.identity), ("results", &self.results)] {
            match store.purge_expired().await {
                Ok(n) => removed += n,
                Err(e) => warn!(tier, error = %e, "cache purge failed"),
            }
        }
        removed
    }

    /// Runs `purge_expired` every `period` until `shutdown` is cancelled.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        period: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = self.purge_expired().await;
                        if removed > 0 {
                            debug!(removed, "purged expired cache entries");
                        }
                    }
                }
            }
        })
    }
}

async fn read_typed<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Option<T> {
    match store.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "discarding undecodable cache entry");
                None
            }
        },
        Ok(None) => {
            debug!(key, "cache miss");
            None
        }
        Err(e) => {
            warn!(key, error = %e, "cache unavailable, treating as miss");
            None
        }
    }
}

async fn write_typed<T: Serialize>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(key, error = %e, "could not serialize cache value");
            return;
        }
    };
    if let Err(e) = store.set(key, raw, ttl).await {
        warn!(key, error = %e, "cache write failed");
    }
}
