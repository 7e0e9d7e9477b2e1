use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Start,
    Navigate,
    Click,
    Input,
    Wait,
    ConditionalBranch,
    ErrorStop,
    Merge,
}

impl NodeKind {
    /// Prefix of the node's display name.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Start => "Start",
            NodeKind::Navigate => "Navigate",
            NodeKind::Click => "Click",
            NodeKind::Input => "Input",
            NodeKind::Wait => "Wait",
            NodeKind::ConditionalBranch => "Condition",
            NodeKind::ErrorStop => "Stop on Error",
            NodeKind::Merge => "Merge",
        }
    }

    /// Node type identifier in exported workflows.
    pub fn workflow_type(&self) -> &'static str {
        match self {
            NodeKind::Start => "n8n-nodes-base.manualTrigger",
            NodeKind::Navigate => "n8n-nodes-tracegraph.navigate",
            NodeKind::Click => "n8n-nodes-tracegraph.click",
            NodeKind::Input => "n8n-nodes-tracegraph.input",
            NodeKind::Wait => "n8n-nodes-base.wait",
            NodeKind::ConditionalBranch => "n8n-nodes-base.if",
            NodeKind::ErrorStop => "n8n-nodes-base.stopAndError",
            NodeKind::Merge => "n8n-nodes-base.merge",
        }
    }

    fn regular_outputs(&self) -> &'static [OutputPort] {
        match self {
            NodeKind::ConditionalBranch => &[OutputPort::True, OutputPort::False],
            NodeKind::ErrorStop => &[],
            _ => &[OutputPort::Main],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    #[default]
    StopWorkflow,
    ContinueDefaultOutput,
    ContinueErrorOutput,
}

impl ErrorPolicy {
    /// The `onError` value of exported workflows.
    pub fn workflow_value(&self) -> &'static str {
        match self {
            ErrorPolicy::StopWorkflow => "stopWorkflow",
            ErrorPolicy::ContinueDefaultOutput => "continueRegularOutput",
            ErrorPolicy::ContinueErrorOutput => "continueErrorOutput",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputPort {
    Main,
    True,
    False,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    pub max_retries: u32,
    /// Milliseconds.
    pub wait_between_retries: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledNode {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub position: Position,
    pub parameters: Map<String, Value>,
    pub error_policy: ErrorPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySettings>,
}

impl CompiledNode {
    /// Output ports in output-index order. The error port exists only on
    /// nodes that route failures to it, and always comes last.
    pub fn outputs(&self) -> Vec<OutputPort> {
        let mut outputs = self.kind.regular_outputs().to_vec();
        if self.error_policy == ErrorPolicy::ContinueErrorOutput {
            outputs.push(OutputPort::Error);
        }
        outputs
    }

    pub fn retry_count(&self) -> u32 {
        self.retry.map(|retry| retry.max_retries).unwrap_or(0)
    }
}

/// Edge from `from`'s `port` into `to`. `index` orders the edges leaving the
/// same port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: String,
    pub port: OutputPort,
    pub to: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledGraph {
    pub entry: String,
    pub nodes: Vec<CompiledNode>,
    pub connections: Vec<Connection>,
}

impl CompiledGraph {
    pub fn new(entry: CompiledNode) -> Self {
        CompiledGraph {
            entry: entry.id.clone(),
            nodes: vec![entry],
            connections: Vec::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&CompiledNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn add_node(&mut self, node: CompiledNode) {
        self.nodes.push(node);
    }

    pub fn connect(&mut self, from: &str, port: OutputPort, to: &str) {
        let index = self
            .connections
            .iter()
            .filter(|connection| connection.from == from && connection.port == port)
            .count();
        self.connections.push(Connection {
            from: from.to_string(),
            port,
            to: to.to_string(),
            index,
        });
    }

    pub fn outgoing<'a>(
        &'a self,
        from: &'a str,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .iter()
            .filter(move |connection| connection.from == from)
    }
}

const ORIGIN_X: i64 = 240;
const ORIGIN_Y: i64 = 300;
const SPACING: i64 = 220;
const COLUMNS: usize = 8;

/// Grid positions handed out in node order, wrapping every eight nodes.
#[derive(Debug, Default)]
pub struct LayoutCursor {
    index: usize,
}

impl LayoutCursor {
    pub fn position(index: usize) -> Position {
        Position {
            x: ORIGIN_X + (index % COLUMNS) as i64 * SPACING,
            y: ORIGIN_Y + (index / COLUMNS) as i64 * SPACING,
        }
    }

    pub fn next_position(&mut self) -> Position {
        let position = LayoutCursor::position(self.index);
        self.index += 1;
        position
    }
}
