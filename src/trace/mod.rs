use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::locator::LocatorCandidate;

pub mod recorder;

pub use recorder::Recorder;

/// What the user did. Unknown action names survive deserialization as
/// `Unmapped` so the compiler can report them instead of the parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Click,
    Input,
    Navigate,
    Scroll,
    Wait,
    Screenshot,
    Upload,
    Download,
    ConditionalCheckpoint,
    Unmapped(String),
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::Click => "click",
            Action::Input => "input",
            Action::Navigate => "navigate",
            Action::Scroll => "scroll",
            Action::Wait => "wait",
            Action::Screenshot => "screenshot",
            Action::Upload => "upload",
            Action::Download => "download",
            Action::ConditionalCheckpoint => "conditional_checkpoint",
            Action::Unmapped(name) => name,
        }
    }

    /// Whether the action acts on an element and therefore needs at least
    /// one locator candidate.
    pub fn requires_target(&self) -> bool {
        !matches!(
            self,
            Action::Navigate
                | Action::Scroll
                | Action::Wait
                | Action::Unmapped(_)
        )
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        match name.as_str() {
            "click" => Action::Click,
            "input" => Action::Input,
            "navigate" | "navigation" => Action::Navigate,
            "scroll" => Action::Scroll,
            "wait" => Action::Wait,
            "screenshot" => Action::Screenshot,
            "upload" => Action::Upload,
            "download" => Action::Download,
            "conditional_checkpoint" | "conditional-checkpoint" => {
                Action::ConditionalCheckpoint
            }
            _ => Action::Unmapped(name),
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Unmapped(name) => name,
            other => other.name().to_string(),
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    #[default]
    Text,
    Password,
    Email,
    Number,
    Tel,
    Url,
    Search,
    Textarea,
    Select,
    Checkbox,
    Radio,
    File,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    Static,
    Variable,
    Secret,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPayload {
    pub value: String,
    #[serde(default)]
    pub kind: InputKind,
    #[serde(default)]
    pub source: DataSource,
    #[serde(default)]
    pub sensitive: bool,
    /// Key under which a masked value is looked up at execution time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl InputPayload {
    pub fn is_masked(&self) -> bool {
        self.sensitive || self.source == DataSource::Secret
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub wait_between_retries: u64,
}

/// Which way a conditional checkpoint went while recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchOutcome {
    True,
    False,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub critical: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_outcome: Option<BranchOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub id: String,
    pub action: Action,
    /// Ranked best first, as produced by the locator engine.
    #[serde(default)]
    pub candidates: Vec<LocatorCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_position: Option<ScrollPosition>,
    /// Logical time; strictly increasing within a trace.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_ms: Option<u64>,
    #[serde(default)]
    pub metadata: StepMetadata,
}

impl TraceStep {
    pub fn new(id: impl Into<String>, action: Action, timestamp: u64) -> Self {
        TraceStep {
            id: id.into(),
            action,
            candidates: Vec::new(),
            input: None,
            scroll_position: None,
            timestamp,
            url: None,
            wait_ms: None,
            metadata: StepMetadata::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    OutOfOrder {
        step: String,
        timestamp: u64,
        previous: u64,
    },
    DuplicateId(String),
}

impl Display for TraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceError::OutOfOrder {
                step,
                timestamp,
                previous,
            } => write!(
                f,
                "step {} has timestamp {} which is not after {}",
                step, timestamp, previous
            ),
            TraceError::DuplicateId(id) => {
                write!(f, "step id {} is already in the trace", id)
            }
        }
    }
}

impl std::error::Error for TraceError {}

/// Steps in strictly increasing timestamp order. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TraceStep>", into = "Vec<TraceStep>")]
pub struct Trace {
    steps: Vec<TraceStep>,
}

impl Trace {
    pub fn new() -> Self {
        Trace::default()
    }

    pub fn push(&mut self, step: TraceStep) -> Result<(), TraceError> {
        if let Some(last) = self.steps.last()
            && step.timestamp <= last.timestamp
        {
            return Err(TraceError::OutOfOrder {
                step: step.id,
                timestamp: step.timestamp,
                previous: last.timestamp,
            });
        }
        if self.steps.iter().any(|existing| existing.id == step.id) {
            return Err(TraceError::DuplicateId(step.id));
        }
        self.steps.push(step);
        Ok(())
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.steps.last().map(|step| step.timestamp)
    }
}

impl TryFrom<Vec<TraceStep>> for Trace {
    type Error = TraceError;

    fn try_from(steps: Vec<TraceStep>) -> Result<Self, Self::Error> {
        let mut trace = Trace::new();
        for step in steps {
            trace.push(step)?;
        }
        Ok(trace)
    }
}

impl From<Trace> for Vec<TraceStep> {
    fn from(trace: Trace) -> Self {
        trace.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_action_names() {
        let parse = |name: &str| Action::from(name.to_string());
        assert_eq!(parse("navigation"), Action::Navigate);
        assert_eq!(parse("conditional-checkpoint"), Action::ConditionalCheckpoint);
        assert_eq!(parse("hover"), Action::Unmapped("hover".to_string()));
        assert_eq!(String::from(Action::Navigate), "navigate");
        assert_eq!(String::from(parse("hover")), "hover");
    }

    #[test]
    fn test_targeted_actions() {
        assert!(Action::Click.requires_target());
        assert!(Action::Screenshot.requires_target());
        assert!(Action::ConditionalCheckpoint.requires_target());
        assert!(!Action::Navigate.requires_target());
        assert!(!Action::Scroll.requires_target());
        assert!(!Action::Wait.requires_target());
    }

    #[test]
    fn test_deserialize_trace() {
        let trace: Trace = serde_json::from_str(indoc! { r##"
            [
              {"id": "s1", "action": "navigation", "timestamp": 1, "url": "https://shop.test/"},
              {
                "id": "s2",
                "action": "input",
                "timestamp": 2,
                "candidates": [{
                  "locator": {"kind": "css", "value": "#password"},
                  "confidence": 100,
                  "strategy": "attribute-priority",
                  "verification": "passed"
                }],
                "input": {"value": "hunter2", "kind": "password", "sensitive": true},
                "metadata": {"critical": true, "retry": {"maxRetries": 1, "waitBetweenRetries": 250}}
              },
              {"id": "s3", "action": "hover", "timestamp": 3}
            ]
            "## })
        .unwrap();

        assert_eq!(trace.len(), 3);
        let steps = trace.steps();
        assert_eq!(steps[0].action, Action::Navigate);
        let input = steps[1].input.as_ref().unwrap();
        assert_eq!(input.kind, InputKind::Password);
        assert_eq!(input.source, DataSource::Static);
        assert!(input.is_masked());
        assert_eq!(
            steps[1].metadata.retry,
            Some(RetryPolicy {
                max_retries: 1,
                wait_between_retries: 250
            })
        );
        assert_eq!(steps[2].action, Action::Unmapped("hover".to_string()));
    }

    #[test]
    fn test_rejects_out_of_order_steps() {
        let mut trace = Trace::new();
        trace.push(TraceStep::new("a", Action::Click, 5)).unwrap();
        assert_eq!(
            trace.push(TraceStep::new("b", Action::Click, 5)),
            Err(TraceError::OutOfOrder {
                step: "b".to_string(),
                timestamp: 5,
                previous: 5
            })
        );
        assert_eq!(
            trace.push(TraceStep::new("a", Action::Click, 6)),
            Err(TraceError::DuplicateId("a".to_string()))
        );
        assert_eq!(trace.len(), 1);
    }

    #[test]
    fn test_deserialize_rejects_out_of_order() {
        let result: Result<Trace, _> = serde_json::from_str(
            r#"[{"id": "a", "action": "wait", "timestamp": 2},
                {"id": "b", "action": "wait", "timestamp": 1}]"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_serialized_action_round_trips_unmapped_names() {
        let step = TraceStep::new("x", Action::Unmapped("drag".to_string()), 1);
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["action"], "drag");
    }
}
