//! Search-result cache
//!
//! Fronts the search backend with a declared freshness window and a
//! stale-while-revalidate grace period: fresh entries are served directly,
//! stale-within-grace entries are served while a background refresh runs, and
//! anything older is recomputed inline. Uses Redis when available with an
//! in-memory fallback.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client, RedisResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::SearchCacheConfig;
use crate::error::{AppError, AppResult};

/// One ranked search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub product_id: String,
    pub title: String,
    pub score: f64,
}

/// Where a response came from relative to the freshness window
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheDisposition {
    Fresh,
    Stale,
    Miss,
}

/// Computes fresh ranked results for a query
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<SearchResult>>;
}

/// Catalog entry fed to the static backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub product_id: String,
    pub title: String,
}

/// Substring-ranked backend over a static catalog
pub struct StaticCatalogBackend {
    entries: Vec<CatalogEntry>,
}

impl StaticCatalogBackend {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl SearchBackend for StaticCatalogBackend {
    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<SearchResult>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(vec![]);
        }

        let mut hits: Vec<SearchResult> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let haystack = entry.title.to_lowercase();
                if haystack == needle {
                    Some((entry, 3.0))
                } else if haystack.starts_with(&needle) {
                    Some((entry, 2.0))
                } else if haystack.contains(&needle) {
                    Some((entry, 1.0))
                } else {
                    None
                }
            })
            .map(|(entry, score)| SearchResult {
                product_id: entry.product_id.clone(),
                title: entry.title.clone(),
                score,
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Cached result set with its computation timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    results: Vec<SearchResult>,
    timestamp: u64,
}

/// Cache adapter over the search backend
pub struct SearchCache {
    config: SearchCacheConfig,
    redis_manager: Option<ConnectionManager>,
    memory_cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
    backend: Arc<dyn SearchBackend>,
    refreshing: Arc<Mutex<HashSet<String>>>,
}

impl SearchCache {
    pub async fn new(config: SearchCacheConfig, backend: Arc<dyn SearchBackend>) -> Self {
        let redis_manager = if config.enabled {
            match Self::create_redis_manager(&config.redis_url).await {
                Ok(manager) => {
                    info!("Redis search cache connection established");
                    Some(manager)
                }
                Err(e) => {
                    warn!("Failed to connect to Redis search cache: {}. Using in-memory fallback only.", e);
                    None
                }
            }
        } else {
            info!("Search caching is disabled in configuration");
            None
        };

        Self {
            config,
            redis_manager,
            memory_cache: Arc::new(RwLock::new(HashMap::new())),
            backend,
            refreshing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    async fn create_redis_manager(redis_url: &str) -> AppResult<ConnectionManager> {
        let client = Client::open(redis_url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;
        ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create Redis connection manager: {}", e)))
    }

    /// Serve ranked results for a query, cached within the freshness window
    pub async fn query(&self, query: &str, limit: usize) -> AppResult<(Vec<SearchResult>, CacheDisposition)> {
        let limit = limit.min(self.config.max_limit).max(1);

        if !self.config.enabled {
            let results = self.backend.search(query, limit).await?;
            return Ok((results, CacheDisposition::Miss));
        }

        let key = cache_key(query, limit);
        let now = epoch_seconds();

        if let Some(entry) = self.get(&key).await {
            let age = now.saturating_sub(entry.timestamp);
            if age <= self.config.fresh_ttl_seconds {
                debug!(key = %key, age, "Search cache hit (fresh)");
                return Ok((entry.results, CacheDisposition::Fresh));
            }
            if age <= self.config.fresh_ttl_seconds + self.config.stale_grace_seconds {
                debug!(key = %key, age, "Search cache hit (stale), revalidating in background");
                self.spawn_refresh(key, query.to_string(), limit).await;
                return Ok((entry.results, CacheDisposition::Stale));
            }
        }

        let results = self.backend.search(query, limit).await?;
        self.put(&key, CacheEntry { results: results.clone(), timestamp: now }).await;
        Ok((results, CacheDisposition::Miss))
    }

    /// Kick off a single background recompute for this key
    async fn spawn_refresh(&self, key: String, query: String, limit: usize) {
        {
            let mut in_flight = self.refreshing.lock().await;
            if !in_flight.insert(key.clone()) {
                return;
            }
        }

        let backend = self.backend.clone();
        let memory = self.memory_cache.clone();
        let redis = self.redis_manager.clone();
        let refreshing = self.refreshing.clone();
        let ttl = self.config.fresh_ttl_seconds + self.config.stale_grace_seconds;

        tokio::spawn(async move {
            match backend.search(&query, limit).await {
                Ok(results) => {
                    let entry = CacheEntry { results, timestamp: epoch_seconds() };
                    if let Some(manager) = redis {
                        if let Err(e) = set_in_redis(manager, &key, &entry, ttl).await {
                            warn!("Redis cache refresh write failed: {}", e);
                        }
                    }
                    memory.write().await.insert(key.clone(), entry);
                    debug!(key = %key, "Search cache revalidated");
                }
                Err(e) => warn!(key = %key, error = %e, "Search cache revalidation failed"),
            }
            refreshing.lock().await.remove(&key);
        });
    }

    async fn get(&self, key: &str) -> Option<CacheEntry> {
        if let Some(manager) = self.redis_manager.clone() {
            match get_from_redis(manager, key).await {
                Ok(Some(entry)) => return Some(entry),
                Ok(None) => {}
                Err(e) => warn!("Redis cache error: {}. Falling back to memory cache.", e),
            }
        }
        self.memory_cache.read().await.get(key).cloned()
    }

    async fn put(&self, key: &str, entry: CacheEntry) {
        let ttl = self.config.fresh_ttl_seconds + self.config.stale_grace_seconds;
        if let Some(manager) = self.redis_manager.clone() {
            if let Err(e) = set_in_redis(manager, key, &entry, ttl).await {
                warn!("Redis cache error: {}. Falling back to memory cache.", e);
            }
        }
        self.memory_cache.write().await.insert(key.to_string(), entry);
    }
}

async fn get_from_redis(mut conn: ConnectionManager, key: &str) -> AppResult<Option<CacheEntry>> {
    let data: RedisResult<Option<Vec<u8>>> =
        redis::cmd("GET").arg(key).query_async(&mut conn).await;

    match data {
        Ok(Some(data)) => {
            let entry: CacheEntry = serde_json::from_slice(&data)
                .map_err(|e| AppError::Internal(format!("Failed to deserialize cache entry: {}", e)))?;
            Ok(Some(entry))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(AppError::Internal(format!("Redis get error: {}", e))),
    }
}

async fn set_in_redis(
    mut conn: ConnectionManager,
    key: &str,
    entry: &CacheEntry,
    ttl: u64,
) -> AppResult<()> {
    let data = serde_json::to_vec(entry)
        .map_err(|e| AppError::Internal(format!("Failed to serialize cache entry: {}", e)))?;

    let _: () = redis::cmd("SETEX")
        .arg(key)
        .arg(ttl)
        .arg(data)
        .query_async(&mut conn)
        .await
        .map_err(|e| AppError::Internal(format!("Redis set error: {}", e)))?;

    Ok(())
}

fn cache_key(query: &str, limit: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.trim().to_lowercase().as_bytes());
    hasher.update(limit.to_le_bytes());
    let digest = hasher.finalize();
    format!("storefront:search:{}", hex::encode(&digest[..16]))
}

fn epoch_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Arc<StaticCatalogBackend> {
        Arc::new(StaticCatalogBackend::new(vec![
            CatalogEntry { product_id: "p1".into(), title: "Espresso Machine".into() },
            CatalogEntry { product_id: "p2".into(), title: "Espresso Cups".into() },
            CatalogEntry { product_id: "p3".into(), title: "Milk Frother".into() },
            CatalogEntry { product_id: "p4".into(), title: "Espresso".into() },
        ]))
    }

    fn disabled_redis_config() -> SearchCacheConfig {
        SearchCacheConfig {
            enabled: true,
            redis_url: "redis://127.0.0.1:1".to_string(), // nothing listens; memory fallback
            ..SearchCacheConfig::default()
        }
    }

    #[tokio::test]
    async fn test_backend_ranks_exact_matches_first() {
        let results = catalog().search("espresso", 10).await.unwrap();
        assert_eq!(results[0].product_id, "p4");
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_backend_respects_limit_and_empty_query() {
        let backend = catalog();
        assert_eq!(backend.search("espresso", 1).await.unwrap().len(), 1);
        assert!(backend.search("   ", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_miss_then_fresh_hit() {
        let cache = SearchCache::new(disabled_redis_config(), catalog()).await;

        let (first, disp) = cache.query("espresso", 10).await.unwrap();
        assert_eq!(disp, CacheDisposition::Miss);

        let (second, disp) = cache.query("espresso", 10).await.unwrap();
        assert_eq!(disp, CacheDisposition::Fresh);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_stale_entry_served_within_grace() {
        let cache = SearchCache::new(disabled_redis_config(), catalog()).await;
        let key = cache_key("espresso", 10);

        // Seed an entry just past the freshness window but within grace
        let stale_ts = epoch_seconds() - cache.config.fresh_ttl_seconds - 5;
        cache.memory_cache.write().await.insert(
            key,
            CacheEntry {
                results: vec![SearchResult { product_id: "old".into(), title: "Old".into(), score: 1.0 }],
                timestamp: stale_ts,
            },
        );

        let (results, disp) = cache.query("espresso", 10).await.unwrap();
        assert_eq!(disp, CacheDisposition::Stale);
        assert_eq!(results[0].product_id, "old");
    }

    #[tokio::test]
    async fn test_expired_entry_recomputed_inline() {
        let cache = SearchCache::new(disabled_redis_config(), catalog()).await;
        let key = cache_key("espresso", 10);

        let expired_ts = epoch_seconds()
            - cache.config.fresh_ttl_seconds
            - cache.config.stale_grace_seconds
            - 5;
        cache.memory_cache.write().await.insert(
            key,
            CacheEntry {
                results: vec![SearchResult { product_id: "old".into(), title: "Old".into(), score: 1.0 }],
                timestamp: expired_ts,
            },
        );

        let (results, disp) = cache.query("espresso", 10).await.unwrap();
        assert_eq!(disp, CacheDisposition::Miss);
        assert_eq!(results[0].product_id, "p4");
    }

    #[test]
    fn test_cache_key_normalizes_query() {
        assert_eq!(cache_key(" Espresso ", 10), cache_key("espresso", 10));
        assert_ne!(cache_key("espresso", 10), cache_key("espresso", 20));
    }
}
