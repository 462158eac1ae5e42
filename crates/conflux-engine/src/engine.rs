//! Engine assembly and the execute entry point.
//!
//! The [`Engine`] wires the definition cache, dispatcher, and log sink
//! together. Construct via [`Engine::builder()`]; collaborators default to
//! the in-memory implementations.
//!
//! ```rust,ignore
//! let engine = Engine::builder()
//!     .flow_store(flows)
//!     .block_store(blocks)
//!     .build();
//!
//! let outputs = engine.execute("echo", ExecuteRequest::new(inputs)).await?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::cache::{DefinitionCache, InMemoryCache};
use crate::dispatcher::Dispatcher;
use crate::errors::EngineError;
use crate::executor::{self, RunParams};
use crate::log_sink::{LogSink, DEFAULT_QUEUE_CAPACITY};
use crate::resolver::ExpressionMode;
use crate::stores::{InMemoryBlockStore, InMemoryFlowStore, InMemoryLogStore};
use crate::traits::{BlockStore, Cache, FlowStore, LogStore};
use crate::types::{
    BlockFailure, BlockLogEntry, ExecutionContext, ExecutionLog, FlowDef, FlowRunStatus,
    LogPerformance, LogRequest, LogResult, DEFAULT_BLOCK_TIMEOUT_MS, DEFAULT_FLOW_TIMEOUT_MS,
};
use crate::{inputs, planner};

// ---------------------------------------------------------------------------
// Config & request types
// ---------------------------------------------------------------------------

/// Engine-level tuning. All fields have defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_block_timeout_ms: u64,
    pub default_flow_timeout_ms: u64,
    pub expression_mode: ExpressionMode,
    pub log_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_block_timeout_ms: DEFAULT_BLOCK_TIMEOUT_MS,
            default_flow_timeout_ms: DEFAULT_FLOW_TIMEOUT_MS,
            expression_mode: ExpressionMode::default(),
            log_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Caller metadata captured into the execution log.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub headers: BTreeMap<String, String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// One invocation of a published flow.
#[derive(Debug, Clone, Default)]
pub struct ExecuteRequest {
    pub inputs: Map<String, Value>,
    pub meta: RequestMeta,
    pub is_test: bool,
}

impl ExecuteRequest {
    pub fn new(inputs: Map<String, Value>) -> Self {
        Self {
            inputs,
            ..Self::default()
        }
    }

    /// A test invocation: upstream dispatch short-circuits and nothing is
    /// logged.
    pub fn test(inputs: Map<String, Value>) -> Self {
        Self {
            inputs,
            is_test: true,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`Engine`]. Unset collaborators fall back to in-memory
/// implementations.
#[derive(Default)]
pub struct EngineBuilder {
    flows: Option<Arc<dyn FlowStore>>,
    blocks: Option<Arc<dyn BlockStore>>,
    logs: Option<Arc<dyn LogStore>>,
    cache: Option<Arc<dyn Cache>>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flow_store(mut self, store: Arc<dyn FlowStore>) -> Self {
        self.flows = Some(store);
        self
    }

    pub fn block_store(mut self, store: Arc<dyn BlockStore>) -> Self {
        self.blocks = Some(store);
        self
    }

    pub fn log_store(mut self, store: Arc<dyn LogStore>) -> Self {
        self.logs = Some(store);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Assemble the engine and spawn its log sink. Requires a tokio
    /// runtime.
    pub fn build(self) -> Engine {
        let flows = self.flows.unwrap_or_else(|| Arc::new(InMemoryFlowStore::new()));
        let blocks = self
            .blocks
            .unwrap_or_else(|| Arc::new(InMemoryBlockStore::new()));
        let logs = self.logs.unwrap_or_else(|| Arc::new(InMemoryLogStore::new()));
        let cache = self.cache.unwrap_or_else(|| Arc::new(InMemoryCache::new()));

        let sink = LogSink::spawn(Arc::clone(&logs), self.config.log_queue_capacity);
        Engine {
            defs: DefinitionCache::new(cache, flows, blocks),
            logs,
            dispatcher: Dispatcher::new(),
            sink,
            config: self.config,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The assembled flow execution engine.
pub struct Engine {
    defs: DefinitionCache,
    logs: Arc<dyn LogStore>,
    dispatcher: Dispatcher,
    sink: LogSink,
    config: EngineConfig,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Execute the published flow at `slug` and return its flat output
    /// object.
    ///
    /// Every non-test invocation of a resolved flow is handed to the log
    /// sink, whether it succeeded or failed; the handoff never blocks on
    /// log persistence.
    pub async fn execute(
        &self,
        slug: &str,
        request: ExecuteRequest,
    ) -> Result<Map<String, Value>, EngineError> {
        let flow = self
            .defs
            .flow_by_slug(slug)
            .await?
            .ok_or_else(|| EngineError::SlugNotFound {
                slug: slug.to_string(),
            })?;

        let started_at = Utc::now();
        let start = Instant::now();
        let mut ctx = ExecutionContext::new(flow.id.clone(), request.inputs.clone());

        let outcome = self.run_flow(&flow, &request, &mut ctx).await;

        if !request.is_test {
            let log = build_log(&flow, &request, &ctx, &outcome, started_at, start);
            self.sink.enqueue(log).await;
        }

        outcome
    }

    /// Recent execution logs for the published flow at `slug`, newest
    /// first.
    pub async fn logs_for_slug(
        &self,
        slug: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionLog>, EngineError> {
        let flow = self
            .defs
            .flow_by_slug(slug)
            .await?
            .ok_or_else(|| EngineError::SlugNotFound {
                slug: slug.to_string(),
            })?;
        Ok(self.logs.list_recent(&flow.id, limit).await?)
    }

    /// The definition cache, exposed for the authoring layer's
    /// invalidation hooks.
    pub fn definitions(&self) -> &DefinitionCache {
        &self.defs
    }

    /// Log records dropped on sink overflow since startup.
    pub fn dropped_logs(&self) -> u64 {
        self.sink.dropped()
    }

    /// Drain pending log writes and stop the sink.
    pub async fn shutdown(&self) {
        self.sink.shutdown().await;
    }

    async fn run_flow(
        &self,
        flow: &FlowDef,
        request: &ExecuteRequest,
        ctx: &mut ExecutionContext,
    ) -> Result<Map<String, Value>, EngineError> {
        ctx.inputs = inputs::apply_declarations(&flow.inputs, &request.inputs)?;
        let plan = planner::plan(flow)?;

        let params = RunParams {
            defs: &self.defs,
            dispatcher: &self.dispatcher,
            flow,
            plan: &plan,
            expression_mode: self.config.expression_mode,
            default_block_timeout_ms: self.config.default_block_timeout_ms,
            is_test: request.is_test,
        };

        let deadline_ms = flow
            .config
            .timeout_ms
            .unwrap_or(self.config.default_flow_timeout_ms);
        match tokio::time::timeout(
            Duration::from_millis(deadline_ms),
            executor::run_plan(&params, ctx),
        )
        .await
        {
            Ok(result) => result?,
            Err(_elapsed) => {
                return Err(EngineError::FlowTimeout {
                    elapsed_ms: deadline_ms,
                })
            }
        }

        Ok(project_outputs(flow, ctx))
    }
}

// ---------------------------------------------------------------------------
// Output projection & log assembly
// ---------------------------------------------------------------------------

/// Build the flow's flat output object. A declaration whose source block
/// never ran, failed, or lacks the named output contributes nothing — the
/// key is absent, not null.
fn project_outputs(flow: &FlowDef, ctx: &ExecutionContext) -> Map<String, Value> {
    let mut outputs = Map::new();
    for decl in &flow.outputs {
        let Some(result) = ctx.results.get(&decl.source_block) else {
            continue;
        };
        if let Some(value) = result.outputs.get(&decl.source_output) {
            outputs.insert(decl.name.clone(), value.clone());
        }
    }
    outputs
}

fn build_log(
    flow: &FlowDef,
    request: &ExecuteRequest,
    ctx: &ExecutionContext,
    outcome: &Result<Map<String, Value>, EngineError>,
    started_at: DateTime<Utc>,
    start: Instant,
) -> ExecutionLog {
    let result = match outcome {
        Ok(outputs) => LogResult {
            status: FlowRunStatus::Success,
            outputs: Some(Value::Object(outputs.clone())),
            error: None,
        },
        Err(error) => LogResult {
            status: FlowRunStatus::Failure,
            outputs: None,
            error: Some(BlockFailure {
                message: error.to_string(),
                code: Some(error.code().to_string()),
            }),
        },
    };

    // Per-block entries in flow insertion order; blocks that never ran are
    // absent.
    let blocks = flow
        .blocks
        .iter()
        .filter_map(|b| {
            ctx.results.get(&b.id).map(|r| BlockLogEntry {
                block_id: b.id.clone(),
                result: r.clone(),
            })
        })
        .collect();

    ExecutionLog {
        id: uuid::Uuid::new_v4().to_string(),
        flow_id: flow.id.clone(),
        flow_version: flow.version,
        request: LogRequest {
            inputs: Value::Object(request.inputs.clone()),
            headers: request.meta.headers.clone(),
            ip: request.meta.ip.clone(),
            user_agent: request.meta.user_agent.clone(),
        },
        result,
        blocks,
        performance: LogPerformance {
            started_at,
            completed_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
