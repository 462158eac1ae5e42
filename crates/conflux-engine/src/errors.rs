//! Error types for the engine and its collaborators.

use thiserror::Error;

/// Errors from durable store operations
/// ([`FlowStore`](crate::traits::FlowStore) and friends).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store error: {message}")]
    Store { message: String },
}

/// Errors from [`Cache`](crate::traits::Cache) implementations.
///
/// Never fatal to a request: the definition cache degrades to direct store
/// reads.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {message}")]
    Unavailable { message: String },
}

/// Per-block failures. These end up on a
/// [`BlockExecutionResult`](crate::types::BlockExecutionResult) and are
/// subject to the instance's `continue_on_error` containment.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum BlockError {
    #[error("block definition not found: {id}")]
    DefMissing { id: String },
    #[error("unsupported block type: {block_type}")]
    UnsupportedType { block_type: String },
    #[error("block source is incomplete: {message}")]
    InvalidSource { message: String },
    #[error("unresolved required path parameter: {name}")]
    MissingPathParam { name: String },
    #[error("upstream timeout after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    #[error("upstream request failed: {message}")]
    Transport { message: String },
    #[error("upstream returned HTTP {status}")]
    Http { status: u16 },
    #[error("unsupported mapping: {message}")]
    UnsupportedMapping { message: String },
}

impl BlockError {
    /// Stable machine-readable code recorded on failure results.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DefMissing { .. } => "BLOCK_NOT_FOUND",
            Self::UnsupportedType { .. } => "UNSUPPORTED_BLOCK_TYPE",
            Self::InvalidSource { .. } => "INVALID_BLOCK_SOURCE",
            Self::MissingPathParam { .. } => "MISSING_PATH_PARAM",
            Self::Timeout { .. } => "UPSTREAM_TIMEOUT",
            Self::Transport { .. } => "UPSTREAM_UNREACHABLE",
            Self::Http { .. } => "UPSTREAM_HTTP_ERROR",
            Self::UnsupportedMapping { .. } => "UNSUPPORTED_MAPPING",
        }
    }

    /// Whether another attempt may succeed: transport-level failures and
    /// 5xx responses. 4xx responses never retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Http { status } => *status >= 500,
            _ => false,
        }
    }
}

/// Errors from the flow execution entry point.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// No published flow at the requested slug.
    #[error("no published flow at slug: {slug}")]
    SlugNotFound { slug: String },
    /// A required caller input was absent and had no default.
    #[error("Missing required input: {name}")]
    InputMissing { name: String },
    /// The connection graph is not a DAG. Names the blocks left with
    /// positive indegree.
    #[error("flow graph contains a cycle involving: {}", blocks.join(", "))]
    CycleDetected { blocks: Vec<String> },
    /// A block failed and its instance did not opt into
    /// `continue_on_error`.
    #[error("block {block_id} failed: {message}")]
    BlockFailed {
        block_id: String,
        code: String,
        message: String,
    },
    /// The whole-flow deadline expired.
    #[error("flow timed out after {elapsed_ms}ms")]
    FlowTimeout { elapsed_ms: u64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Error code carried in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SlugNotFound { .. } => "FLOW_NOT_FOUND",
            Self::InputMissing { .. } => "INPUT_MISSING",
            Self::CycleDetected { .. } => "FLOW_INVALID",
            Self::BlockFailed { code, .. } if code == "BLOCK_NOT_FOUND" => "BLOCK_NOT_FOUND",
            Self::BlockFailed { .. } => "EXECUTION_ERROR",
            Self::FlowTimeout { .. } => "EXECUTION_ERROR",
            Self::Store(_) => "EXECUTION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_error_retryability() {
        assert!(BlockError::Transport {
            message: "connection refused".into()
        }
        .is_retryable());
        assert!(BlockError::Http { status: 503 }.is_retryable());
        assert!(!BlockError::Http { status: 404 }.is_retryable());
        assert!(!BlockError::Timeout { elapsed_ms: 30_000 }.is_retryable());
    }

    #[test]
    fn engine_error_codes() {
        assert_eq!(
            EngineError::SlugNotFound { slug: "x".into() }.code(),
            "FLOW_NOT_FOUND"
        );
        assert_eq!(
            EngineError::InputMissing { name: "msg".into() }.code(),
            "INPUT_MISSING"
        );
        assert_eq!(
            EngineError::CycleDetected {
                blocks: vec!["a".into(), "b".into()]
            }
            .code(),
            "FLOW_INVALID"
        );
        assert_eq!(
            EngineError::BlockFailed {
                block_id: "a".into(),
                code: "BLOCK_NOT_FOUND".into(),
                message: "block definition not found: b1".into(),
            }
            .code(),
            "BLOCK_NOT_FOUND"
        );
    }

    #[test]
    fn input_missing_message_shape() {
        let err = EngineError::InputMissing { name: "msg".into() };
        assert_eq!(err.to_string(), "Missing required input: msg");
    }

    #[test]
    fn cycle_message_names_blocks() {
        let err = EngineError::CycleDetected {
            blocks: vec!["a".into(), "b".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("a"), "got: {msg}");
        assert!(msg.contains("b"), "got: {msg}");
    }
}
