use std::collections::{HashMap, HashSet, VecDeque};

use crate::compiler::graph::CompiledGraph;
use crate::compiler::result::CompileError;

/// Structural checks on a finished graph: every connection joins known nodes
/// through a port its source actually has, and every node is reachable from
/// the entry node.
pub fn validate(graph: &CompiledGraph) -> Vec<CompileError> {
    let mut errors = Vec::new();
    let nodes: HashMap<&str, _> = graph
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), node))
        .collect();

    if !nodes.contains_key(graph.entry.as_str()) {
        errors.push(CompileError::GraphIntegrity {
            node: graph.entry.clone(),
            message: "entry node is missing".to_string(),
        });
        return errors;
    }

    for connection in &graph.connections {
        let Some(source) = nodes.get(connection.from.as_str()) else {
            errors.push(CompileError::GraphIntegrity {
                node: connection.from.clone(),
                message: "connection leaves an unknown node".to_string(),
            });
            continue;
        };
        if !source.outputs().contains(&connection.port) {
            errors.push(CompileError::GraphIntegrity {
                node: connection.from.clone(),
                message: format!(
                    "{:?} node has no {:?} output",
                    source.kind, connection.port
                ),
            });
        }
        if !nodes.contains_key(connection.to.as_str()) {
            errors.push(CompileError::GraphIntegrity {
                node: connection.to.clone(),
                message: format!(
                    "connection from {} targets an unknown node",
                    connection.from
                ),
            });
        }
    }

    let mut reached: HashSet<&str> = HashSet::new();
    let mut queue = VecDeque::from([graph.entry.as_str()]);
    while let Some(id) = queue.pop_front() {
        if !reached.insert(id) {
            continue;
        }
        for connection in graph.outgoing(id) {
            queue.push_back(connection.to.as_str());
        }
    }
    for node in &graph.nodes {
        if !reached.contains(node.id.as_str()) {
            errors.push(CompileError::GraphIntegrity {
                node: node.id.clone(),
                message: "not reachable from the entry node".to_string(),
            });
        }
    }

    errors
}
