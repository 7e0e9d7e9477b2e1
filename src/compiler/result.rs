use std::fmt::Display;
use std::time::Duration;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::compiler::graph::CompiledGraph;

/// A hard compilation failure. Any one of these makes the result
/// unsuccessful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    UnmappedAction { step: String, action: String },
    MissingTarget { step: String, action: String },
    GraphIntegrity { node: String, message: String },
}

impl CompileError {
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnmappedAction { .. } => "unmapped-action",
            CompileError::MissingTarget { .. } => "missing-target",
            CompileError::GraphIntegrity { .. } => "graph-integrity",
        }
    }

    pub fn step_id(&self) -> Option<&str> {
        match self {
            CompileError::UnmappedAction { step, .. }
            | CompileError::MissingTarget { step, .. } => Some(step),
            CompileError::GraphIntegrity { .. } => None,
        }
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::UnmappedAction { step, action } => {
                write!(f, "step {}: action {:?} has no node mapping", step, action)
            }
            CompileError::MissingTarget { step, action } => write!(
                f,
                "step {}: {} needs a target element but has no locator candidates",
                step, action
            ),
            CompileError::GraphIntegrity { node, message } => {
                write!(f, "node {}: {}", node, message)
            }
        }
    }
}

impl std::error::Error for CompileError {}

impl Serialize for CompileError {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let step = self.step_id();
        let fields = if step.is_some() { 3 } else { 2 };
        let mut state = serializer.serialize_struct("CompileError", fields)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        if let Some(step) = step {
            state.serialize_field("stepId", step)?;
        }
        state.end()
    }
}

/// Config-driven behavior that at least one node actually ended up using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    RetriesEnabled,
    ScreenshotCheckpoints,
    ErrorRecovery,
    FallbackLocators,
    MaskedInputs,
    ConditionalBranches,
}

impl Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Feature::RetriesEnabled => "retries-enabled",
            Feature::ScreenshotCheckpoints => "screenshot-checkpoints",
            Feature::ErrorRecovery => "error-recovery",
            Feature::FallbackLocators => "fallback-locators",
            Feature::MaskedInputs => "masked-inputs",
            Feature::ConditionalBranches => "conditional-branches",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationMetadata {
    pub original_steps: usize,
    /// Steps compiled into nodes before compilation stopped.
    pub processed_steps: usize,
    pub generated_nodes: usize,
    #[serde(rename = "compilationTime", serialize_with = "as_millis")]
    pub compilation_time: Duration,
    pub features: Vec<Feature>,
}

fn as_millis<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<CompiledGraph>,
    pub errors: Vec<CompileError>,
    pub warnings: Vec<String>,
    pub metadata: CompilationMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_wire_format() {
        let error = CompileError::MissingTarget {
            step: "step-0002".to_string(),
            action: "click".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({
                "code": "missing-target",
                "message": "step step-0002: click needs a target element but has no locator candidates",
                "stepId": "step-0002",
            })
        );

        let error = CompileError::GraphIntegrity {
            node: "node-004".to_string(),
            message: "not reachable from the entry node".to_string(),
        };
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["code"], "graph-integrity");
        assert!(value.get("stepId").is_none());
    }

    #[test]
    fn test_metadata_wire_format() {
        let metadata = CompilationMetadata {
            original_steps: 2,
            processed_steps: 2,
            generated_nodes: 3,
            compilation_time: Duration::from_micros(2_500),
            features: vec![Feature::ErrorRecovery, Feature::MaskedInputs],
        };
        assert_eq!(
            serde_json::to_value(&metadata).unwrap(),
            json!({
                "originalSteps": 2,
                "processedSteps": 2,
                "generatedNodes": 3,
                "compilationTime": 2,
                "features": ["error-recovery", "masked-inputs"],
            })
        );
    }
}
