//! Block dispatcher — invokes a single block with timeout and retry.
//!
//! The dispatcher never returns an error: every outcome, including
//! failures, is a [`BlockExecutionResult`]. Whether a failure aborts the
//! flow is the executor's decision (per-instance `continue_on_error`).

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::errors::BlockError;
use crate::projection;
use crate::types::{
    BlockDef, BlockExecutionResult, BlockFailure, BlockInputDef, BlockInstanceConfig, BlockSource,
    BlockStatus, BlockType, FlowConfig, ParamLocation, RawResponse,
};

/// Exponential backoff base between retry attempts.
const RETRY_BASE_MS: u64 = 100;
/// Backoff ceiling.
const RETRY_CAP_MS: u64 = 2_000;

// ---------------------------------------------------------------------------
// Dispatch policy
// ---------------------------------------------------------------------------

/// Effective timeout and attempt budget for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub timeout_ms: u64,
    /// Total attempts; 1 means no retry.
    pub attempts: u32,
}

impl DispatchPolicy {
    /// Timeout precedence: instance config, then flow config, then the
    /// engine default. Retry budget comes from the instance only.
    pub fn resolve(
        instance: Option<&BlockInstanceConfig>,
        flow: &FlowConfig,
        default_timeout_ms: u64,
    ) -> Self {
        let timeout_ms = instance
            .and_then(|c| c.timeout_ms)
            .or(flow.timeout_ms)
            .unwrap_or(default_timeout_ms);
        let attempts = instance.and_then(|c| c.retry_count).unwrap_or(0).max(1);
        Self {
            timeout_ms,
            attempts,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Invokes blocks. One instance per engine; the inner client pools
/// connections process-wide.
pub struct Dispatcher {
    http: reqwest::Client,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Execute one block with resolved inputs.
    ///
    /// Test invocations short-circuit before any upstream traffic;
    /// `transform` blocks pass their inputs through; the remaining local
    /// types are reserved and fail dispatch. Wall-clock duration covers
    /// all attempts.
    pub async fn dispatch(
        &self,
        def: &BlockDef,
        instance_id: &str,
        inputs: &Map<String, Value>,
        policy: DispatchPolicy,
        is_test: bool,
    ) -> BlockExecutionResult {
        let start = Instant::now();

        if is_test {
            let mut outputs = Map::new();
            outputs.insert("_test".into(), Value::Bool(true));
            outputs.insert("block_id".into(), Value::String(instance_id.to_string()));
            return success_result(outputs, None, elapsed_ms(start));
        }

        match def.block_type {
            BlockType::Transform => success_result(inputs.clone(), None, elapsed_ms(start)),
            BlockType::ApiCall => match self.call_upstream(def, inputs, policy).await {
                Ok((outputs, raw)) => success_result(outputs, Some(raw), elapsed_ms(start)),
                Err((error, raw)) => failure_result(&error, raw, elapsed_ms(start)),
            },
            other => failure_result(
                &BlockError::UnsupportedType {
                    block_type: other.as_str().to_string(),
                },
                None,
                elapsed_ms(start),
            ),
        }
    }

    async fn call_upstream(
        &self,
        def: &BlockDef,
        inputs: &Map<String, Value>,
        policy: DispatchPolicy,
    ) -> Result<(Map<String, Value>, RawResponse), (BlockError, Option<RawResponse>)> {
        let source = def.source.as_ref().ok_or_else(|| {
            (
                BlockError::InvalidSource {
                    message: "api_call block has no upstream source".into(),
                },
                None,
            )
        })?;

        let request = UpstreamRequest::build(source, &def.inputs, inputs).map_err(|e| (e, None))?;

        let deadline = Duration::from_millis(policy.timeout_ms);
        let outcome = tokio::time::timeout(
            deadline,
            self.attempt_loop(source, &request, policy.attempts),
        )
        .await;

        match outcome {
            Ok(Ok((raw, parsed_json))) => {
                let outputs = if parsed_json {
                    project_outputs(def, &raw.body)
                } else {
                    Map::new()
                };
                if (200..300).contains(&raw.status_code) {
                    Ok((outputs, raw))
                } else {
                    let status = raw.status_code;
                    Err((BlockError::Http { status }, Some(raw)))
                }
            }
            Ok(Err(error)) => Err((error, None)),
            Err(_elapsed) => Err((
                BlockError::Timeout {
                    elapsed_ms: policy.timeout_ms,
                },
                None,
            )),
        }
    }

    /// Send until a non-retryable outcome or the attempt budget runs out.
    /// Retries apply to transport failures and 5xx responses only.
    async fn attempt_loop(
        &self,
        source: &BlockSource,
        request: &UpstreamRequest,
        attempts: u32,
    ) -> Result<(RawResponse, bool), BlockError> {
        let mut attempt = 1u32;
        loop {
            match self.send_once(source, request).await {
                Ok((raw, parsed_json)) => {
                    if raw.status_code < 500 || attempt >= attempts {
                        return Ok((raw, parsed_json));
                    }
                    tracing::debug!(
                        status = raw.status_code,
                        attempt,
                        url = %request.url,
                        "upstream returned 5xx, retrying"
                    );
                }
                Err(error) => {
                    if attempt >= attempts {
                        return Err(error);
                    }
                    tracing::debug!(
                        error = %error,
                        attempt,
                        url = %request.url,
                        "upstream request failed, retrying"
                    );
                }
            }
            tokio::time::sleep(backoff_delay(attempt)).await;
            attempt += 1;
        }
    }

    async fn send_once(
        &self,
        source: &BlockSource,
        request: &UpstreamRequest,
    ) -> Result<(RawResponse, bool), BlockError> {
        let method = reqwest::Method::from_bytes(source.method.to_uppercase().as_bytes())
            .unwrap_or(reqwest::Method::GET);

        let mut builder = self.http.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body).map_err(|e| BlockError::Transport {
                message: format!("request body serialization failed: {e}"),
            })?;
            builder = builder.body(bytes);
        }

        let response = builder.send().await.map_err(|e| BlockError::Transport {
            message: e.to_string(),
        })?;

        let status_code = response.status().as_u16();
        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(text) = value.to_str() {
                headers.insert(name.as_str().to_string(), text.to_string());
            }
        }
        let text = response.text().await.map_err(|e| BlockError::Transport {
            message: format!("failed to read response body: {e}"),
        })?;

        // Non-JSON bodies stay opaque; outputs projected against them
        // resolve to nothing.
        let (body, parsed_json) = match serde_json::from_str::<Value>(&text) {
            Ok(value) => (value, true),
            Err(_) => (Value::String(text), false),
        };

        Ok((
            RawResponse {
                status_code,
                body,
                headers,
            },
            parsed_json,
        ))
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Request assembly
// ---------------------------------------------------------------------------

struct UpstreamRequest {
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl UpstreamRequest {
    fn build(
        source: &BlockSource,
        input_defs: &[BlockInputDef],
        inputs: &Map<String, Value>,
    ) -> Result<Self, BlockError> {
        let mut url = format!(
            "{}{}",
            source.server_url.as_deref().unwrap_or(""),
            source.path
        );

        for def in input_defs
            .iter()
            .filter(|d| d.location == ParamLocation::Path)
        {
            let placeholder = format!("{{{}}}", def.name);
            match inputs.get(&def.name) {
                Some(value) => {
                    let encoded: String =
                        url::form_urlencoded::byte_serialize(scalar_text(value).as_bytes())
                            .collect();
                    url = url.replace(&placeholder, &encoded);
                }
                // An unresolved placeholder is an error only when the
                // input was required.
                None if def.required && url.contains(&placeholder) => {
                    return Err(BlockError::MissingPathParam {
                        name: def.name.clone(),
                    });
                }
                None => {}
            }
        }

        let query = input_defs
            .iter()
            .filter(|d| d.location == ParamLocation::Query)
            .filter_map(|d| inputs.get(&d.name).map(|v| (d.name.clone(), scalar_text(v))))
            .collect();

        let mut headers: Vec<(String, String)> = input_defs
            .iter()
            .filter(|d| d.location == ParamLocation::Header)
            .filter_map(|d| inputs.get(&d.name).map(|v| (d.name.clone(), scalar_text(v))))
            .collect();
        if !headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            headers.push(("Content-Type".into(), "application/json".into()));
        }

        // Exactly one declared body input carries the JSON body; any other
        // arrangement sends none.
        let body_defs: Vec<&BlockInputDef> = input_defs
            .iter()
            .filter(|d| d.location == ParamLocation::Body)
            .collect();
        let body = match body_defs.as_slice() {
            [only] => inputs.get(&only.name).cloned(),
            _ => None,
        };

        Ok(Self {
            url,
            query,
            headers,
            body,
        })
    }
}

/// String form used for path, query, and header values. Strings go in
/// bare; everything else uses its JSON text.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let ms = RETRY_BASE_MS
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(RETRY_CAP_MS)
        .min(RETRY_CAP_MS);
    Duration::from_millis(ms)
}

fn project_outputs(def: &BlockDef, body: &Value) -> Map<String, Value> {
    let mut outputs = Map::new();
    for out in &def.outputs {
        if let Some(value) = projection::project(body, &out.path) {
            outputs.insert(out.name.clone(), value);
        }
    }
    outputs
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn success_result(
    outputs: Map<String, Value>,
    raw: Option<RawResponse>,
    duration_ms: u64,
) -> BlockExecutionResult {
    BlockExecutionResult {
        status: BlockStatus::Success,
        outputs,
        raw,
        error: None,
        duration_ms,
    }
}

/// Build a failure result from a [`BlockError`]. Also used by the executor
/// for failures that never reach the dispatcher (missing definitions,
/// strict-mode mappings).
pub(crate) fn failure_result(
    error: &BlockError,
    raw: Option<RawResponse>,
    duration_ms: u64,
) -> BlockExecutionResult {
    BlockExecutionResult {
        status: BlockStatus::Failure,
        outputs: Map::new(),
        raw,
        error: Some(BlockFailure {
            message: error.to_string(),
            code: Some(error.code().to_string()),
        }),
        duration_ms,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
