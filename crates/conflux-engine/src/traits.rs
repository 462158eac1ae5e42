//! Pluggable collaborator interfaces.
//!
//! Durable persistence and the shared cache are defined as async traits.
//! In-memory defaults live in [`stores`](crate::stores) and
//! [`cache`](crate::cache); production deployments back them with a
//! document store and a shared KV cache. Adding a method to any trait
//! requires a default implementation to preserve backward compatibility.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{CacheError, StoreError};
use crate::types::{BlockDef, ExecutionLog, FlowDef};

/// Document collection names, fixed across store implementations.
pub const FLOWS_COLLECTION: &str = "flows";
pub const BLOCKS_COLLECTION: &str = "blocks";
pub const EXECUTION_LOGS_COLLECTION: &str = "execution_logs";

// ---------------------------------------------------------------------------
// FlowStore
// ---------------------------------------------------------------------------

/// Persistence for flow definitions.
///
/// Invariants (unique slug, monotonic version, graph validity) are
/// enforced by the authoring layer before a flow reaches the store; the
/// engine only reads.
#[async_trait]
pub trait FlowStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<FlowDef>, StoreError>;

    /// Lookup by slug, filtered to `status = published`. This is the hot
    /// execute path; drafts and archived flows are invisible here.
    async fn get_published_by_slug(&self, slug: &str) -> Result<Option<FlowDef>, StoreError>;

    async fn put(&self, flow: &FlowDef) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// BlockStore
// ---------------------------------------------------------------------------

/// Persistence for block definitions.
#[async_trait]
pub trait BlockStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<BlockDef>, StoreError>;

    async fn put(&self, def: &BlockDef) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// LogStore
// ---------------------------------------------------------------------------

/// Persistence for execution logs. Writes happen only on the detached sink
/// task, never on the caller path.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append(&self, log: &ExecutionLog) -> Result<(), StoreError>;

    /// Most recent logs for a flow, newest first.
    async fn list_recent(
        &self,
        flow_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionLog>, StoreError>;
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Shared KV cache with per-entry TTL.
///
/// All values are JSON. Errors from any method are non-fatal by contract —
/// callers fall back to the durable store.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
