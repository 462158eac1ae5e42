//! Flow schema types — the contract between the authoring layer and the
//! engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ParamLocation, ValueType};

/// The complete definition of a composed flow: declared inputs and outputs,
/// block instances, and the directed connections between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FlowDef {
    pub id: String,
    pub name: String,
    /// URL-safe identifier, `^[a-z0-9-]+$`. The execute endpoint resolves
    /// flows by this value.
    pub slug: String,
    /// Monotonically increasing; bumped by publish.
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub status: FlowStatus,
    #[serde(default)]
    pub inputs: Vec<FlowInput>,
    #[serde(default)]
    pub outputs: Vec<FlowOutput>,
    #[serde(default)]
    pub blocks: Vec<BlockInstance>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub config: FlowConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Lifecycle state of a flow. Only `published` flows are executable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum FlowStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// A declared caller-facing input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FlowInput {
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Hint for OpenAPI generation; the engine does not consume it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ParamLocation>,
}

/// A declared flow output, sourced from one block's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FlowOutput {
    pub name: String,
    pub source_block: String,
    pub source_output: String,
}

/// A placement of a block definition inside a flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlockInstance {
    /// Unique within the flow.
    pub id: String,
    /// References a [`BlockDef`](super::BlockDef) by id.
    pub block_id: String,
    #[serde(default)]
    pub mappings: Vec<InputMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<BlockInstanceConfig>,
    /// Editor-only canvas position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<(f64, f64)>,
}

/// Per-instance execution tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlockInstanceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Total attempts (1 = no retry).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    /// When true, a failure of this block is recorded and the flow keeps
    /// going; downstream mappings from it resolve to nothing.
    #[serde(default)]
    pub continue_on_error: bool,
}

/// A rule producing one named input to a block instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InputMapping {
    /// Must match an input name of the referenced block definition.
    pub target_input: String,
    pub source: MappingSource,
}

/// Where a mapped input value comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
#[non_exhaustive]
pub enum MappingSource {
    /// A caller-supplied flow input by name.
    FlowInput { name: String },
    /// An output of a previously executed block.
    BlockOutput {
        block_id: String,
        output_name: String,
    },
    /// A literal value, passed through unchanged.
    Constant { value: serde_json::Value },
    /// Reserved. Resolution behaviour is governed by
    /// [`ExpressionMode`](crate::resolver::ExpressionMode).
    Expression { text: String },
}

/// A directed edge between two block instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Connection {
    pub id: String,
    pub from_block: String,
    pub to_block: String,
    /// Reserved condition expression; not evaluated in this release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Flow-level execution configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FlowConfig {
    /// Whole-flow deadline, and the fallback per-block timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// When true, blocks of the same plan layer dispatch concurrently.
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub error_handling: ErrorHandling,
}

/// How the flow reacts to a block failure. `continue` and `rollback` are
/// reserved and currently honoured as `stop`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorHandling {
    #[default]
    Stop,
    Continue,
    Rollback,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mapping_source_tagged_round_trip() {
        let sources = vec![
            MappingSource::FlowInput { name: "msg".into() },
            MappingSource::BlockOutput {
                block_id: "a".into(),
                output_name: "email".into(),
            },
            MappingSource::Constant {
                value: json!("hello"),
            },
            MappingSource::Expression {
                text: "inputs.a + 1".into(),
            },
        ];
        for s in &sources {
            let json_str = serde_json::to_string(s).unwrap();
            let rt: MappingSource = serde_json::from_str(&json_str).unwrap();
            assert_eq!(json_str, serde_json::to_string(&rt).unwrap());
        }
    }

    #[test]
    fn mapping_source_kind_tag() {
        let s = MappingSource::FlowInput { name: "id".into() };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["kind"], "flow_input");
        assert_eq!(v["name"], "id");
    }

    #[test]
    fn flow_def_minimal_deserializes() {
        let flow: FlowDef = serde_json::from_str(
            r#"{"id":"f1","name":"Echo","slug":"echo"}"#,
        )
        .unwrap();
        assert_eq!(flow.status, FlowStatus::Draft);
        assert_eq!(flow.version, 0);
        assert!(flow.blocks.is_empty());
        assert!(!flow.config.parallel);
        assert_eq!(flow.config.error_handling, ErrorHandling::Stop);
    }

    #[test]
    fn block_instance_config_defaults() {
        let cfg: BlockInstanceConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.timeout_ms.is_none());
        assert!(cfg.retry_count.is_none());
        assert!(!cfg.continue_on_error);
    }
}
