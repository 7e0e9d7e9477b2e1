//! n8n workflow JSON.

use serde_json::{Map, Value, json};

use crate::compiler::graph::{CompiledGraph, CompiledNode};

const TYPE_VERSION: u32 = 1;

impl CompiledGraph {
    /// Renders the graph as an importable n8n workflow named `name`.
    /// Connections are keyed by source node name, with one array per output
    /// index in the order of [`CompiledNode::outputs`].
    pub fn to_workflow_json(&self, name: &str) -> Value {
        let nodes: Vec<Value> = self.nodes.iter().map(workflow_node).collect();

        let mut connections = Map::new();
        for node in &self.nodes {
            let outputs = node.outputs();
            let mut lanes: Vec<Vec<(usize, &str)>> =
                vec![Vec::new(); outputs.len()];
            let mut any = false;
            for connection in self.outgoing(&node.id) {
                let Some(lane) =
                    outputs.iter().position(|port| *port == connection.port)
                else {
                    continue;
                };
                let Some(target) = self.node(&connection.to) else {
                    continue;
                };
                lanes[lane].push((connection.index, target.name.as_str()));
                any = true;
            }
            if !any {
                continue;
            }
            let lanes: Vec<Value> = lanes
                .into_iter()
                .map(|mut lane| {
                    lane.sort_by_key(|(index, _)| *index);
                    Value::Array(
                        lane.into_iter()
                            .map(|(_, target)| {
                                json!({ "node": target, "type": "main", "index": 0 })
                            })
                            .collect(),
                    )
                })
                .collect();
            connections.insert(node.name.clone(), json!({ "main": lanes }));
        }

        json!({
            "name": name,
            "nodes": nodes,
            "connections": connections,
            "active": false,
            "settings": { "executionOrder": "v1" },
        })
    }
}

fn workflow_node(node: &CompiledNode) -> Value {
    let mut value = json!({
        "id": node.id,
        "name": node.name,
        "type": node.kind.workflow_type(),
        "typeVersion": TYPE_VERSION,
        "position": [node.position.x, node.position.y],
        "parameters": node.parameters,
        "onError": node.error_policy.workflow_value(),
    });
    if let Some(retry) = node.retry
        && let Some(fields) = value.as_object_mut()
    {
        fields.insert("retryOnFail".to_string(), json!(true));
        fields.insert("maxTries".to_string(), json!(retry.max_retries));
        fields.insert(
            "waitBetweenTries".to_string(),
            json!(retry.wait_between_retries),
        );
    }
    value
}
