//! Foundational types for the flow execution model.
//!
//! Every type here is `Serialize + Deserialize + Debug + Clone` with
//! `snake_case` field naming. Enums that are expected to grow are
//! `#[non_exhaustive]` so adding variants is never a breaking change for
//! downstream consumers.

pub mod block;
pub mod execution;
pub mod flow;

pub use block::*;
pub use execution::*;
pub use flow::*;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default per-block dispatch timeout in milliseconds.
pub const DEFAULT_BLOCK_TIMEOUT_MS: u64 = 30_000;

/// Default whole-flow deadline in milliseconds.
pub const DEFAULT_FLOW_TIMEOUT_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// Shared declarations
// ---------------------------------------------------------------------------

/// Declared value type of a flow or block input.
///
/// Informational in this release: presence and defaults are enforced, the
/// type tag is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

/// Where an input travels in the upstream HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Body,
}

pub(crate) fn default_true() -> bool {
    true
}
