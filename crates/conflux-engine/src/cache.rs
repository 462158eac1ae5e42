//! Definition cache — read-through caching of flow and block definitions.
//!
//! Two layers: a [`Cache`] implementation (in-memory by default, a shared
//! KV service in production) and the [`DefinitionCache`] facade the engine
//! reads through. The engine never invalidates; the authoring layer calls
//! the invalidation hooks after mutations. Acceptable staleness bound is
//! the entry TTL.
//!
//! Cache failures are non-fatal by contract: every read degrades to a
//! direct store read, every write failure is swallowed after a debug log.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::errors::{CacheError, StoreError};
use crate::traits::{BlockStore, Cache, FlowStore};
use crate::types::{BlockDef, FlowDef};

/// TTL for cached flow and block definitions.
pub const DEFINITION_TTL: Duration = Duration::from_secs(300);

/// TTL for memoised upstream OpenAPI documents (authoring paths only).
pub const SPEC_TTL: Duration = Duration::from_secs(600);

// ---------------------------------------------------------------------------
// Key scheme
// ---------------------------------------------------------------------------

pub fn flow_slug_key(slug: &str) -> String {
    format!("flow:slug:{slug}")
}

pub fn flow_key(id: &str) -> String {
    format!("flow:{id}")
}

pub fn block_key(id: &str) -> String {
    format!("block:{id}")
}

/// Key for a memoised OpenAPI document: lowercase hex SHA-256 of the URL.
pub fn spec_key(url: &str) -> String {
    let hash = Sha256::digest(url.as_bytes());
    format!("openapi:{hash:x}")
}

// ---------------------------------------------------------------------------
// InMemoryCache
// ---------------------------------------------------------------------------

/// In-memory [`Cache`] backed by a `HashMap` of values with expiry
/// instants. Expired entries are evicted lazily on read.
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, (Value, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = Instant::now();
        {
            let guard = self.entries.read().await;
            match guard.get(key) {
                Some((value, expires)) if *expires > now => return Ok(Some(value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Entry exists but is stale — evict under the write lock.
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let expires = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value, expires));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DefinitionCache
// ---------------------------------------------------------------------------

/// Read-through facade over the cache and the durable stores.
#[derive(Clone)]
pub struct DefinitionCache {
    cache: Arc<dyn Cache>,
    flows: Arc<dyn FlowStore>,
    blocks: Arc<dyn BlockStore>,
}

impl DefinitionCache {
    pub fn new(cache: Arc<dyn Cache>, flows: Arc<dyn FlowStore>, blocks: Arc<dyn BlockStore>) -> Self {
        Self {
            cache,
            flows,
            blocks,
        }
    }

    /// Resolve a published flow by slug: cache first, store on miss, cache
    /// populated under [`DEFINITION_TTL`] on a successful load.
    pub async fn flow_by_slug(&self, slug: &str) -> Result<Option<FlowDef>, StoreError> {
        let key = flow_slug_key(slug);
        if let Some(flow) = self.cached::<FlowDef>(&key).await {
            return Ok(Some(flow));
        }

        let Some(flow) = self.flows.get_published_by_slug(slug).await? else {
            return Ok(None);
        };
        self.populate(&key, &flow).await;
        Ok(Some(flow))
    }

    /// Resolve a block definition by id: cache first, store on miss.
    pub async fn block(&self, id: &str) -> Result<Option<BlockDef>, StoreError> {
        let key = block_key(id);
        if let Some(def) = self.cached::<BlockDef>(&key).await {
            return Ok(Some(def));
        }

        let Some(def) = self.blocks.get(id).await? else {
            return Ok(None);
        };
        self.populate(&key, &def).await;
        Ok(Some(def))
    }

    /// Invalidation hook for the authoring layer after a flow mutation.
    pub async fn invalidate_flow(&self, id: &str, slug: &str) {
        self.evict(&flow_key(id)).await;
        self.evict(&flow_slug_key(slug)).await;
    }

    /// Invalidation hook for the authoring layer after a block mutation.
    pub async fn invalidate_block(&self, id: &str) {
        self.evict(&block_key(id)).await;
    }

    async fn cached<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::debug!(key, error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(key, error = %e, "cache read failed, falling back to store");
                None
            }
        }
    }

    async fn populate<T: serde::Serialize>(&self, key: &str, value: &T) {
        let Ok(json) = serde_json::to_value(value) else {
            return;
        };
        if let Err(e) = self.cache.set(key, json, DEFINITION_TTL).await {
            tracing::debug!(key, error = %e, "cache populate failed");
        }
    }

    async fn evict(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            tracing::debug!(key, error = %e, "cache invalidation failed");
        }
    }
}
