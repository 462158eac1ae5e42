//! Per-invocation execution state and the durable log record.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Execution context
// ---------------------------------------------------------------------------

/// Mutable state for one flow invocation.
///
/// Created at request entry, destroyed after the log sink has been handed
/// the record. Exclusively owned by the task servicing the request — never
/// shared across requests.
#[derive(Debug)]
pub struct ExecutionContext {
    pub flow_id: String,
    /// Caller inputs after defaults were applied.
    pub inputs: Map<String, Value>,
    /// Scratch variables, reserved for future transform blocks.
    pub variables: Map<String, Value>,
    /// Results keyed by block instance id.
    pub results: HashMap<String, BlockExecutionResult>,
}

impl ExecutionContext {
    pub fn new(flow_id: String, inputs: Map<String, Value>) -> Self {
        Self {
            flow_id,
            inputs,
            variables: Map::new(),
            results: HashMap::new(),
        }
    }

    /// Record a block's result. For any connection `a -> b`, this runs for
    /// `a` before `b`'s inputs are resolved.
    pub fn record(&mut self, block_instance_id: String, result: BlockExecutionResult) {
        self.results.insert(block_instance_id, result);
    }
}

// ---------------------------------------------------------------------------
// Block execution result
// ---------------------------------------------------------------------------

/// Terminal state of one block dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum BlockStatus {
    Success,
    Failure,
    Skipped,
}

/// Everything the engine records about one block dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlockExecutionResult {
    pub status: BlockStatus,
    #[serde(default)]
    pub outputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BlockFailure>,
    pub duration_ms: u64,
}

/// The upstream response as received, before output projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RawResponse {
    pub status_code: u16,
    /// Parsed JSON body, or the opaque body text when parsing failed.
    pub body: Value,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Failure detail recorded on a block result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlockFailure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

// ---------------------------------------------------------------------------
// Execution log
// ---------------------------------------------------------------------------

/// One durable record per non-test execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionLog {
    pub id: String,
    pub flow_id: String,
    /// Flow version at execution time, so post-hoc reads stay
    /// interpretable after republish.
    pub flow_version: u32,
    pub request: LogRequest,
    pub result: LogResult,
    #[serde(default)]
    pub blocks: Vec<BlockLogEntry>,
    pub performance: LogPerformance,
}

/// What the caller sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LogRequest {
    pub inputs: Value,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// How the invocation ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LogResult {
    pub status: FlowRunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BlockFailure>,
}

/// Terminal status of a whole flow invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum FlowRunStatus {
    Success,
    Failure,
}

/// One executed block inside a log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlockLogEntry {
    pub block_id: String,
    pub result: BlockExecutionResult,
}

/// Timing envelope for a log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LogPerformance {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}
