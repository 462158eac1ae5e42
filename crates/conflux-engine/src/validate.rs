//! Structural validation of flow definitions.
//!
//! These checks run in the authoring layer on create/update; the engine
//! re-checks only the graph shape (via the planner) at execute time.
//! Returns the full list of human-readable problems rather than stopping
//! at the first.

use std::collections::{HashMap, HashSet};

use crate::planner;
use crate::types::{BlockDef, FlowDef, MappingSource};

/// `^[a-z0-9-]+$`
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Validate a flow against its referenced block definitions.
///
/// `defs` must contain every definition the flow's instances reference;
/// absent entries are reported as errors rather than skipped.
pub fn validate_flow(flow: &FlowDef, defs: &HashMap<String, BlockDef>) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if !is_valid_slug(&flow.slug) {
        errors.push(format!("Invalid slug: {:?}", flow.slug));
    }

    // Unique flow input names.
    let mut seen_inputs = HashSet::new();
    for input in &flow.inputs {
        if !seen_inputs.insert(input.name.as_str()) {
            errors.push(format!("Duplicate flow input: {}", input.name));
        }
    }

    // Unique block instance ids.
    let mut seen_blocks = HashSet::new();
    for block in &flow.blocks {
        if !seen_blocks.insert(block.id.as_str()) {
            errors.push(format!("Duplicate block ID: {}", block.id));
        }
    }

    let block_ids: HashSet<&str> = flow.blocks.iter().map(|b| b.id.as_str()).collect();

    // Mappings reference known inputs of the instance's definition, and no
    // two mappings target the same input.
    for block in &flow.blocks {
        let Some(def) = defs.get(&block.block_id) else {
            errors.push(format!(
                "Block {} references unknown definition: {}",
                block.id, block.block_id
            ));
            continue;
        };
        let input_names: HashSet<&str> = def.inputs.iter().map(|i| i.name.as_str()).collect();
        let mut seen_targets = HashSet::new();
        for mapping in &block.mappings {
            if !input_names.contains(mapping.target_input.as_str()) {
                errors.push(format!(
                    "Block {} maps unknown input: {}",
                    block.id, mapping.target_input
                ));
            }
            if !seen_targets.insert(mapping.target_input.as_str()) {
                errors.push(format!(
                    "Block {} maps input {} more than once",
                    block.id, mapping.target_input
                ));
            }
            if let MappingSource::BlockOutput { block_id, .. } = &mapping.source {
                if !block_ids.contains(block_id.as_str()) {
                    errors.push(format!(
                        "Block {} maps output of unknown block: {}",
                        block.id, block_id
                    ));
                }
            }
        }
    }

    // Connections reference existing blocks; no self-loops.
    for conn in &flow.connections {
        if !block_ids.contains(conn.from_block.as_str()) {
            errors.push(format!(
                "Connection {} references unknown source block: {}",
                conn.id, conn.from_block
            ));
        }
        if !block_ids.contains(conn.to_block.as_str()) {
            errors.push(format!(
                "Connection {} references unknown target block: {}",
                conn.id, conn.to_block
            ));
        }
        if conn.from_block == conn.to_block {
            errors.push(format!("Connection {} is a self-loop", conn.id));
        }
    }

    // Output declarations: block exists and exposes the named output.
    for output in &flow.outputs {
        let Some(instance) = flow.blocks.iter().find(|b| b.id == output.source_block) else {
            errors.push(format!(
                "Output {} references unknown block: {}",
                output.name, output.source_block
            ));
            continue;
        };
        if let Some(def) = defs.get(&instance.block_id) {
            if !def.outputs.iter().any(|o| o.name == output.source_output) {
                errors.push(format!(
                    "Output {} references unknown block output: {}.{}",
                    output.name, output.source_block, output.source_output
                ));
            }
        }
    }

    // The connection graph must be a DAG.
    if let Err(e) = planner::plan(flow) {
        errors.push(e.to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BlockInputDef, BlockInstance, BlockOutputDef, BlockType, Connection, FlowInput,
        FlowOutput, InputMapping, ParamLocation, ValueType,
    };
    use serde_json::json;

    fn def(id: &str, inputs: &[&str], outputs: &[&str]) -> BlockDef {
        BlockDef {
            id: id.into(),
            name: id.into(),
            description: None,
            block_type: BlockType::ApiCall,
            source: None,
            inputs: inputs
                .iter()
                .map(|n| BlockInputDef {
                    name: n.to_string(),
                    value_type: ValueType::String,
                    required: false,
                    location: ParamLocation::Query,
                })
                .collect(),
            outputs: outputs
                .iter()
                .map(|n| BlockOutputDef {
                    name: n.to_string(),
                    value_type: ValueType::String,
                    path: format!("$.{n}"),
                })
                .collect(),
        }
    }

    fn instance(id: &str, block_id: &str, mappings: Vec<InputMapping>) -> BlockInstance {
        BlockInstance {
            id: id.into(),
            block_id: block_id.into(),
            mappings,
            config: None,
            position: None,
        }
    }

    fn mapping(target: &str) -> InputMapping {
        InputMapping {
            target_input: target.into(),
            source: MappingSource::Constant { value: json!(1) },
        }
    }

    fn base_flow() -> FlowDef {
        FlowDef {
            id: "f1".into(),
            name: "Flow".into(),
            slug: "my-flow-1".into(),
            version: 1,
            status: Default::default(),
            inputs: vec![],
            outputs: vec![],
            blocks: vec![],
            connections: vec![],
            config: Default::default(),
            created_at: None,
            updated_at: None,
            published_at: None,
        }
    }

    fn defs_for(flow_defs: Vec<BlockDef>) -> HashMap<String, BlockDef> {
        flow_defs.into_iter().map(|d| (d.id.clone(), d)).collect()
    }

    #[test]
    fn slug_format() {
        assert!(is_valid_slug("echo"));
        assert!(is_valid_slug("my-flow-2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("My-Flow"));
        assert!(!is_valid_slug("flow_1"));
        assert!(!is_valid_slug("flow one"));
    }

    #[test]
    fn valid_flow_passes() {
        let mut flow = base_flow();
        flow.blocks = vec![
            instance("a", "d1", vec![mapping("q")]),
            instance("b", "d1", vec![]),
        ];
        flow.connections = vec![Connection {
            id: "c1".into(),
            from_block: "a".into(),
            to_block: "b".into(),
            condition: None,
        }];
        flow.outputs = vec![FlowOutput {
            name: "out".into(),
            source_block: "b".into(),
            source_output: "r".into(),
        }];
        let defs = defs_for(vec![def("d1", &["q"], &["r"])]);
        assert!(validate_flow(&flow, &defs).is_ok());
    }

    #[test]
    fn duplicate_mapping_target_rejected() {
        let mut flow = base_flow();
        flow.blocks = vec![instance("a", "d1", vec![mapping("q"), mapping("q")])];
        let defs = defs_for(vec![def("d1", &["q"], &[])]);
        let errors = validate_flow(&flow, &defs).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("more than once")));
    }

    #[test]
    fn unknown_mapping_target_rejected() {
        let mut flow = base_flow();
        flow.blocks = vec![instance("a", "d1", vec![mapping("ghost")])];
        let defs = defs_for(vec![def("d1", &["q"], &[])]);
        let errors = validate_flow(&flow, &defs).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("unknown input: ghost")));
    }

    #[test]
    fn connection_endpoints_must_exist() {
        let mut flow = base_flow();
        flow.blocks = vec![instance("a", "d1", vec![])];
        flow.connections = vec![Connection {
            id: "c1".into(),
            from_block: "a".into(),
            to_block: "missing".into(),
            condition: None,
        }];
        let defs = defs_for(vec![def("d1", &[], &[])]);
        let errors = validate_flow(&flow, &defs).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("unknown target block")));
    }

    #[test]
    fn self_loop_rejected() {
        let mut flow = base_flow();
        flow.blocks = vec![instance("a", "d1", vec![])];
        flow.connections = vec![Connection {
            id: "c1".into(),
            from_block: "a".into(),
            to_block: "a".into(),
            condition: None,
        }];
        let defs = defs_for(vec![def("d1", &[], &[])]);
        let errors = validate_flow(&flow, &defs).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("self-loop")));
    }

    #[test]
    fn cycle_rejected() {
        let mut flow = base_flow();
        flow.blocks = vec![instance("a", "d1", vec![]), instance("b", "d1", vec![])];
        flow.connections = vec![
            Connection {
                id: "c1".into(),
                from_block: "a".into(),
                to_block: "b".into(),
                condition: None,
            },
            Connection {
                id: "c2".into(),
                from_block: "b".into(),
                to_block: "a".into(),
                condition: None,
            },
        ];
        let defs = defs_for(vec![def("d1", &[], &[])]);
        let errors = validate_flow(&flow, &defs).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("cycle")));
    }

    #[test]
    fn output_referential_integrity() {
        let mut flow = base_flow();
        flow.blocks = vec![instance("a", "d1", vec![])];
        flow.outputs = vec![FlowOutput {
            name: "out".into(),
            source_block: "a".into(),
            source_output: "ghost".into(),
        }];
        let defs = defs_for(vec![def("d1", &[], &["r"])]);
        let errors = validate_flow(&flow, &defs).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("unknown block output")));
    }

    #[test]
    fn unknown_definition_reported() {
        let mut flow = base_flow();
        flow.blocks = vec![instance("a", "missing-def", vec![])];
        let errors = validate_flow(&flow, &HashMap::new()).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("unknown definition")));
    }

    #[test]
    fn duplicate_input_names_rejected() {
        let mut flow = base_flow();
        flow.inputs = vec![
            FlowInput {
                name: "msg".into(),
                value_type: ValueType::String,
                required: true,
                default: None,
                location: None,
            },
            FlowInput {
                name: "msg".into(),
                value_type: ValueType::Number,
                required: false,
                default: None,
                location: None,
            },
        ];
        let errors = validate_flow(&flow, &HashMap::new()).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("Duplicate flow input")));
    }
}
