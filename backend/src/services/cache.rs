//! Read-model cache for assembled document views
//!
//! The cache is advisory only: every operation swallows backend failures and
//! falls back to the authoritative store. A missing or unreachable Redis
//! never affects correctness, only latency.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use shared::models::DocumentKind;
use uuid::Uuid;

/// Key/value cache collaborator with TTL semantics
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str, ttl: Duration);
    async fn del(&self, key: &str);
}

/// Redis-backed cache
pub struct RedisCache {
    manager: redis::aio::ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis; returns None (and logs) when the URL is unreachable
    pub async fn connect(url: &str) -> Option<Self> {
        let client = match redis::Client::open(url) {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!("Invalid Redis URL, running without cache: {}", err);
                return None;
            }
        };
        match client.get_tokio_connection_manager().await {
            Ok(manager) => Some(Self { manager }),
            Err(err) => {
                tracing::warn!("Redis unavailable, running without cache: {}", err);
                None
            }
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.manager.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("Cache get failed for {}: {}", key, err);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        let mut conn = self.manager.clone();
        if let Err(err) = conn
            .set_ex::<_, _, ()>(key, value, ttl.as_secs() as usize)
            .await
        {
            tracing::warn!("Cache set failed for {}: {}", key, err);
        }
    }

    async fn del(&self, key: &str) {
        let mut conn = self.manager.clone();
        if let Err(err) = conn.del::<_, ()>(key).await {
            tracing::warn!("Cache delete failed for {}: {}", key, err);
        }
    }
}

/// In-memory cache used in tests and single-process deployments
#[derive(Default)]
pub struct InMemoryCache {
    store: RwLock<HashMap<String, (String, Option<Instant>)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let expired = {
            let store = self.store.read().unwrap();
            match store.get(key) {
                Some((value, expires_at)) => {
                    if expires_at.map(|at| Instant::now() > at).unwrap_or(false) {
                        true
                    } else {
                        return Some(value.clone());
                    }
                }
                None => return None,
            }
        };
        if expired {
            self.store.write().unwrap().remove(key);
        }
        None
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        self.store.write().unwrap().insert(
            key.to_string(),
            (value.to_string(), Instant::now().checked_add(ttl)),
        );
    }

    async fn del(&self, key: &str) {
        self.store.write().unwrap().remove(key);
    }
}

/// No-op cache: every read misses, every write vanishes
pub struct NoopCache;

#[async_trait]
impl CacheBackend for NoopCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) {}

    async fn del(&self, _key: &str) {}
}

/// Document view cache shared by all workflows.
///
/// Keys are `{kind}:{id}`; entries are written after an authoritative read
/// and deleted on every mutation of the document.
#[derive(Clone)]
pub struct DocumentCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl DocumentCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Build the configured cache: Redis when a URL is set and reachable,
    /// a process-local map for `memory`, and a no-op backend otherwise
    pub async fn from_config(redis_url: &str, ttl: Duration) -> Self {
        match redis_url {
            "" => {
                tracing::info!("Document cache disabled (no Redis URL configured)");
                Self::new(Arc::new(NoopCache), ttl)
            }
            "memory" => {
                tracing::info!("Document cache using process-local memory");
                Self::new(Arc::new(InMemoryCache::new()), ttl)
            }
            url => match RedisCache::connect(url).await {
                Some(cache) => {
                    tracing::info!("Document cache using Redis");
                    Self::new(Arc::new(cache), ttl)
                }
                None => Self::new(Arc::new(NoopCache), ttl),
            },
        }
    }

    /// Fetch and deserialize a cached document view
    pub async fn get_view<T: DeserializeOwned>(&self, kind: DocumentKind, id: Uuid) -> Option<T> {
        let raw = self.backend.get(&kind.cache_key(id)).await?;
        match serde_json::from_str(&raw) {
            Ok(view) => Some(view),
            Err(err) => {
                tracing::warn!("Discarding malformed cache entry for {}: {}", kind.cache_key(id), err);
                self.backend.del(&kind.cache_key(id)).await;
                None
            }
        }
    }

    /// Serialize and store a document view
    pub async fn put_view<T: Serialize>(&self, kind: DocumentKind, id: Uuid, view: &T) {
        match serde_json::to_string(view) {
            Ok(raw) => self.backend.set(&kind.cache_key(id), &raw, self.ttl).await,
            Err(err) => tracing::warn!("Failed to serialize cache entry: {}", err),
        }
    }

    /// Drop the cached view for a document
    pub async fn invalidate(&self, kind: DocumentKind, id: Uuid) {
        self.backend.del(&kind.cache_key(id)).await;
    }
}
