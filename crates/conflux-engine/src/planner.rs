//! Topological planner — Kahn ordering of block instances.
//!
//! Blocks are represented as integer indices into the flow's block array
//! with an adjacency list built from the connections; no shared node
//! objects. The tie-break within a pass is the insertion order of blocks
//! on the flow, which makes planning deterministic: `plan(flow)` is
//! identical across runs of the same definition.

use std::collections::HashMap;

use crate::errors::EngineError;
use crate::types::FlowDef;

/// The emitted plan: a flat dispatch order plus the layer partition.
///
/// `order` is the concatenation of `layers`. Blocks within one layer have
/// no ordering between themselves and may dispatch concurrently when the
/// flow opts into parallel execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub order: Vec<String>,
    pub layers: Vec<Vec<String>>,
}

/// Compute the execution plan for a flow.
///
/// Connections referencing unknown blocks are ignored here — the validator
/// rejects them at authoring time. If the graph is cyclic the error names
/// every block left with positive indegree, in insertion order.
pub fn plan(flow: &FlowDef) -> Result<ExecutionPlan, EngineError> {
    let n = flow.blocks.len();
    let index: HashMap<&str, usize> = flow
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.id.as_str(), i))
        .collect();

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut indegree: Vec<usize> = vec![0; n];
    for conn in &flow.connections {
        let (Some(&from), Some(&to)) = (
            index.get(conn.from_block.as_str()),
            index.get(conn.to_block.as_str()),
        ) else {
            continue;
        };
        adjacency[from].push(to);
        indegree[to] += 1;
    }

    let mut emitted = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut layers = Vec::new();

    loop {
        // One Kahn pass: everything whose indegree reached zero, scanned
        // in insertion order.
        let ready: Vec<usize> = (0..n).filter(|&i| !emitted[i] && indegree[i] == 0).collect();
        if ready.is_empty() {
            break;
        }
        for &i in &ready {
            emitted[i] = true;
            for &succ in &adjacency[i] {
                indegree[succ] -= 1;
            }
        }
        let layer: Vec<String> = ready.iter().map(|&i| flow.blocks[i].id.clone()).collect();
        order.extend(layer.iter().cloned());
        layers.push(layer);
    }

    if order.len() < n {
        let blocks = flow
            .blocks
            .iter()
            .enumerate()
            .filter(|(i, _)| !emitted[*i])
            .map(|(_, b)| b.id.clone())
            .collect();
        return Err(EngineError::CycleDetected { blocks });
    }

    Ok(ExecutionPlan { order, layers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockInstance, Connection, FlowDef};

    fn block(id: &str) -> BlockInstance {
        BlockInstance {
            id: id.into(),
            block_id: format!("def-{id}"),
            mappings: vec![],
            config: None,
            position: None,
        }
    }

    fn conn(id: &str, from: &str, to: &str) -> Connection {
        Connection {
            id: id.into(),
            from_block: from.into(),
            to_block: to.into(),
            condition: None,
        }
    }

    fn flow(blocks: Vec<BlockInstance>, connections: Vec<Connection>) -> FlowDef {
        FlowDef {
            id: "f1".into(),
            name: "Test".into(),
            slug: "test".into(),
            version: 1,
            status: Default::default(),
            inputs: vec![],
            outputs: vec![],
            blocks,
            connections,
            config: Default::default(),
            created_at: None,
            updated_at: None,
            published_at: None,
        }
    }

    #[test]
    fn linear_chain() {
        let f = flow(
            vec![block("a"), block("b"), block("c")],
            vec![conn("e1", "a", "b"), conn("e2", "b", "c")],
        );
        let p = plan(&f).unwrap();
        assert_eq!(p.order, vec!["a", "b", "c"]);
        assert_eq!(p.layers.len(), 3);
    }

    #[test]
    fn diamond_layers() {
        let f = flow(
            vec![block("a"), block("b"), block("c"), block("d")],
            vec![
                conn("e1", "a", "b"),
                conn("e2", "a", "c"),
                conn("e3", "b", "d"),
                conn("e4", "c", "d"),
            ],
        );
        let p = plan(&f).unwrap();
        assert_eq!(p.layers, vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
        assert_eq!(p.order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn tie_break_is_insertion_order() {
        // c comes before b on the flow, so it dispatches first within the
        // shared layer.
        let f = flow(
            vec![block("c"), block("b"), block("a")],
            vec![conn("e1", "a", "b"), conn("e2", "a", "c")],
        );
        let p = plan(&f).unwrap();
        assert_eq!(p.layers[0], vec!["a"]);
        assert_eq!(p.layers[1], vec!["c", "b"]);
    }

    #[test]
    fn isolated_blocks_run_in_insertion_order() {
        let f = flow(vec![block("z"), block("m"), block("a")], vec![]);
        let p = plan(&f).unwrap();
        assert_eq!(p.order, vec!["z", "m", "a"]);
        assert_eq!(p.layers.len(), 1);
    }

    #[test]
    fn cycle_names_remaining_blocks() {
        let f = flow(
            vec![block("a"), block("b")],
            vec![conn("e1", "a", "b"), conn("e2", "b", "a")],
        );
        let err = plan(&f).unwrap_err();
        match err {
            EngineError::CycleDetected { blocks } => {
                assert_eq!(blocks, vec!["a", "b"]);
            }
            other => panic!("expected CycleDetected, got: {other}"),
        }
    }

    #[test]
    fn cycle_downstream_of_valid_prefix() {
        let f = flow(
            vec![block("a"), block("b"), block("c")],
            vec![conn("e1", "a", "b"), conn("e2", "b", "c"), conn("e3", "c", "b")],
        );
        let err = plan(&f).unwrap_err();
        match err {
            EngineError::CycleDetected { blocks } => {
                assert_eq!(blocks, vec!["b", "c"]);
            }
            other => panic!("expected CycleDetected, got: {other}"),
        }
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let f = flow(vec![block("a")], vec![conn("e1", "a", "a")]);
        assert!(matches!(plan(&f), Err(EngineError::CycleDetected { .. })));
    }

    #[test]
    fn planning_is_idempotent() {
        let f = flow(
            vec![block("a"), block("b"), block("c")],
            vec![conn("e1", "a", "c"), conn("e2", "b", "c")],
        );
        assert_eq!(plan(&f).unwrap(), plan(&f).unwrap());
    }

    #[test]
    fn empty_flow_plans_empty() {
        let p = plan(&flow(vec![], vec![])).unwrap();
        assert!(p.order.is_empty());
        assert!(p.layers.is_empty());
    }
}
