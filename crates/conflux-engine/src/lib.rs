//! Conflux — a Backend-for-Frontend composition engine.
//!
//! Operators author flows: DAGs of blocks wrapping upstream HTTP
//! operations. A published flow is exposed at a URL slug; the engine
//! resolves each block's inputs from caller inputs and prior results,
//! invokes upstreams with per-block timeout and retry, and assembles a
//! flat output object from designated source blocks.
//!
//! The crate is designed to be embedded: it has no opinion about the HTTP
//! surface in front of it, and all persistence goes through traits with
//! in-memory defaults.

pub mod cache;
pub mod dispatcher;
pub mod engine;
pub mod errors;
pub(crate) mod executor;
pub mod inputs;
pub mod log_sink;
pub mod planner;
pub mod projection;
pub mod resolver;
pub mod stores;
pub mod traits;
pub mod types;
pub mod validate;

// Re-export the public surface at the crate level.

// cache
pub use cache::{DefinitionCache, InMemoryCache, DEFINITION_TTL, SPEC_TTL};

// dispatcher
pub use dispatcher::{DispatchPolicy, Dispatcher};

// engine
pub use engine::{Engine, EngineBuilder, EngineConfig, ExecuteRequest, RequestMeta};

// errors
pub use errors::{BlockError, CacheError, EngineError, StoreError};

// log sink
pub use log_sink::LogSink;

// planner
pub use planner::{plan, ExecutionPlan};

// projection
pub use projection::project;

// resolver
pub use resolver::{resolve_inputs, ExpressionMode};

// stores
pub use stores::{InMemoryBlockStore, InMemoryFlowStore, InMemoryLogStore};

// traits
pub use traits::{BlockStore, Cache, FlowStore, LogStore};

// types
pub use types::{
    BlockDef, BlockExecutionResult, BlockFailure, BlockInputDef, BlockInstance,
    BlockInstanceConfig, BlockLogEntry, BlockOutputDef, BlockSource, BlockStatus, BlockType,
    Connection, ErrorHandling, ExecutionContext, ExecutionLog, FlowConfig, FlowDef, FlowInput,
    FlowOutput, FlowRunStatus, FlowStatus, InputMapping, LogPerformance, LogRequest, LogResult,
    MappingSource, ParamLocation, RawResponse, ValueType, DEFAULT_BLOCK_TIMEOUT_MS,
    DEFAULT_FLOW_TIMEOUT_MS,
};

// validate
pub use validate::{is_valid_slug, validate_flow};
