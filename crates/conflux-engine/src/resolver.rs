//! Mapping resolver — materialises a block instance's input object from
//! the execution context.

use serde_json::{Map, Value};

use crate::errors::BlockError;
use crate::types::{BlockInstance, BlockStatus, ExecutionContext, MappingSource};

/// How reserved `expression` mappings resolve.
///
/// `Passthrough` (the default) yields the raw expression text as a string
/// value. `Strict` fails the owning block with `UNSUPPORTED_MAPPING`;
/// containment applies as for any block failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpressionMode {
    #[default]
    Passthrough,
    Strict,
}

/// Resolve a block's input mappings against the current context.
///
/// A source that resolves to nothing — an absent flow input, a missing or
/// failed upstream block, an unknown output name — leaves the target input
/// absent rather than inserting a null. A later mapping targeting the same
/// input overrides an earlier one, including overriding it with absence.
pub fn resolve_inputs(
    block: &BlockInstance,
    ctx: &ExecutionContext,
    mode: ExpressionMode,
) -> Result<Map<String, Value>, BlockError> {
    let mut inputs = Map::new();
    for mapping in &block.mappings {
        let value = match &mapping.source {
            MappingSource::FlowInput { name } => ctx.inputs.get(name).cloned(),
            MappingSource::BlockOutput {
                block_id,
                output_name,
            } => ctx
                .results
                .get(block_id)
                .filter(|r| r.status == BlockStatus::Success)
                .and_then(|r| r.outputs.get(output_name))
                .cloned(),
            MappingSource::Constant { value } => Some(value.clone()),
            MappingSource::Expression { text } => match mode {
                ExpressionMode::Passthrough => Some(Value::String(text.clone())),
                ExpressionMode::Strict => {
                    return Err(BlockError::UnsupportedMapping {
                        message: format!("expression mappings are not evaluated: {text}"),
                    })
                }
            },
        };
        match value {
            Some(v) => {
                inputs.insert(mapping.target_input.clone(), v);
            }
            None => {
                inputs.remove(&mapping.target_input);
            }
        }
    }
    Ok(inputs)
}
