//! In-memory stores for tests and lightweight usage.
//!
//! Uses `BTreeMap` for deterministic iteration order. Suitable for tests
//! and short-lived processes; production deployments implement the same
//! traits over a document store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::StoreError;
use crate::traits::{BlockStore, FlowStore, LogStore};
use crate::types::{BlockDef, ExecutionLog, FlowDef, FlowStatus};

// ---------------------------------------------------------------------------
// InMemoryFlowStore
// ---------------------------------------------------------------------------

/// In-memory implementation of [`FlowStore`], keyed by flow id.
pub struct InMemoryFlowStore {
    flows: RwLock<BTreeMap<String, FlowDef>>,
}

impl InMemoryFlowStore {
    pub fn new() -> Self {
        Self {
            flows: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryFlowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlowStore for InMemoryFlowStore {
    async fn get(&self, id: &str) -> Result<Option<FlowDef>, StoreError> {
        Ok(self.flows.read().await.get(id).cloned())
    }

    async fn get_published_by_slug(&self, slug: &str) -> Result<Option<FlowDef>, StoreError> {
        let guard = self.flows.read().await;
        Ok(guard
            .values()
            .find(|f| f.slug == slug && f.status == FlowStatus::Published)
            .cloned())
    }

    async fn put(&self, flow: &FlowDef) -> Result<(), StoreError> {
        self.flows
            .write()
            .await
            .insert(flow.id.clone(), flow.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemoryBlockStore
// ---------------------------------------------------------------------------

/// In-memory implementation of [`BlockStore`], keyed by definition id.
pub struct InMemoryBlockStore {
    blocks: RwLock<BTreeMap<String, BlockDef>>,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlockStore for InMemoryBlockStore {
    async fn get(&self, id: &str) -> Result<Option<BlockDef>, StoreError> {
        Ok(self.blocks.read().await.get(id).cloned())
    }

    async fn put(&self, def: &BlockDef) -> Result<(), StoreError> {
        self.blocks
            .write()
            .await
            .insert(def.id.clone(), def.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemoryLogStore
// ---------------------------------------------------------------------------

/// In-memory implementation of [`LogStore`]. Appends preserve arrival
/// order; listing walks backwards so the newest record comes first.
pub struct InMemoryLogStore {
    logs: RwLock<Vec<ExecutionLog>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(Vec::new()),
        }
    }

    /// Total records across all flows. Test helper.
    pub async fn len(&self) -> usize {
        self.logs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.logs.read().await.is_empty()
    }
}

impl Default for InMemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn append(&self, log: &ExecutionLog) -> Result<(), StoreError> {
        self.logs.write().await.push(log.clone());
        Ok(())
    }

    async fn list_recent(
        &self,
        flow_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionLog>, StoreError> {
        let guard = self.logs.read().await;
        Ok(guard
            .iter()
            .rev()
            .filter(|l| l.flow_id == flow_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
