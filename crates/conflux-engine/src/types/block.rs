//! Block definition types — reusable wrappers over upstream HTTP
//! operations.

use serde::{Deserialize, Serialize};

use super::{default_true, ParamLocation, ValueType};

/// A reusable block definition with typed inputs and outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlockDef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub block_type: BlockType,
    /// Required for `api_call` blocks; absent for local transforms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<BlockSource>,
    #[serde(default)]
    pub inputs: Vec<BlockInputDef>,
    #[serde(default)]
    pub outputs: Vec<BlockOutputDef>,
}

/// What the dispatcher does with a block.
///
/// Only `api_call` and `transform` execute in this release; the rest are
/// authoring-time placeholders that fail dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum BlockType {
    ApiCall,
    Transform,
    Condition,
    Loop,
    Aggregate,
    Custom,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiCall => "api_call",
            Self::Transform => "transform",
            Self::Condition => "condition",
            Self::Loop => "loop",
            Self::Aggregate => "aggregate",
            Self::Custom => "custom",
        }
    }
}

/// The upstream operation an `api_call` block wraps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlockSource {
    /// URL of the OpenAPI document this block was ingested from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Path template with `{name}` placeholders.
    pub path: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
}

/// A typed input of a block definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlockInputDef {
    pub name: String,
    pub value_type: ValueType,
    #[serde(default = "default_true")]
    pub required: bool,
    pub location: ParamLocation,
}

/// A typed output of a block definition, projected from the upstream
/// response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlockOutputDef {
    pub name: String,
    pub value_type: ValueType,
    /// JSONPath subset: `$`, dotted keys, `[n]` indexing.
    pub path: String,
}
