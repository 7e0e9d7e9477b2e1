//! Step to node translation: which node kind an action becomes and what goes
//! into the node's parameter bag.

use serde_json::{Map, Value, json};
use url::Url;

use crate::compiler::config::StepMappingConfig;
use crate::compiler::graph::NodeKind;
use crate::compiler::selection::LocatorSelection;
use crate::locator::LocatorCandidate;
use crate::trace::{Action, InputPayload, TraceStep};

/// Stands in for a masked input value in compiled parameters.
pub const MASK: &str = "********";

pub fn node_kind(action: &Action) -> Option<NodeKind> {
    match action {
        Action::Click => Some(NodeKind::Click),
        Action::Input => Some(NodeKind::Input),
        Action::Navigate => Some(NodeKind::Navigate),
        Action::Wait
        | Action::Scroll
        | Action::Screenshot
        | Action::Upload
        | Action::Download => Some(NodeKind::Wait),
        Action::ConditionalCheckpoint => Some(NodeKind::ConditionalBranch),
        Action::Unmapped(_) => None,
    }
}

/// Actions with no control-flow meaning of their own are compiled to wait
/// nodes annotated with what was recorded.
pub fn annotation(action: &Action) -> Option<&'static str> {
    match action {
        Action::Scroll => Some("scroll"),
        Action::Screenshot => Some("screenshot"),
        Action::Upload => Some("upload"),
        Action::Download => Some("download"),
        _ => None,
    }
}

/// A node's parameters plus what the compiler needs to know about them.
#[derive(Debug, Default)]
pub struct MappedParameters {
    pub parameters: Map<String, Value>,
    pub masked: bool,
    pub screenshot: bool,
    pub warnings: Vec<String>,
}

pub fn parameters(
    step: &TraceStep,
    kind: NodeKind,
    selection: Option<&LocatorSelection>,
    config: &StepMappingConfig,
) -> MappedParameters {
    let mut mapped = MappedParameters::default();
    let parameters = &mut mapped.parameters;

    parameters.insert("stepId".to_string(), json!(step.id));
    parameters.insert("timeoutMs".to_string(), json!(config.timeout_ms));
    if let Some(description) = &step.metadata.description {
        parameters.insert("description".to_string(), json!(description));
    }
    if !step.metadata.tags.is_empty() {
        parameters.insert("tags".to_string(), json!(step.metadata.tags));
    }

    if let Some(selection) = selection {
        parameters.insert("locator".to_string(), locator(selection.primary));
        if !selection.fallbacks.is_empty() {
            let fallbacks: Vec<Value> = selection
                .fallbacks
                .iter()
                .map(|candidate| locator(candidate))
                .collect();
            parameters
                .insert("fallbackLocators".to_string(), Value::Array(fallbacks));
        }
    }

    match kind {
        NodeKind::Navigate => {
            if let Some(raw) = &step.url {
                if let Err(error) = Url::parse(raw) {
                    mapped.warnings.push(format!(
                        "step {}: url {:?} is not a valid absolute url ({}); kept as recorded",
                        step.id, raw, error
                    ));
                }
                parameters.insert("url".to_string(), json!(raw));
            }
        }
        NodeKind::Wait => {
            let duration = step.wait_ms.unwrap_or(config.timeout_ms);
            parameters.insert("durationMs".to_string(), json!(duration));
            if let Some(annotation) = annotation(&step.action) {
                parameters.insert("annotation".to_string(), json!(annotation));
            }
            if let Some(position) = step.scroll_position {
                parameters.insert(
                    "scrollPosition".to_string(),
                    json!({ "x": position.x, "y": position.y }),
                );
            }
        }
        NodeKind::ConditionalBranch => {
            parameters
                .insert("condition".to_string(), json!("locator-resolves"));
        }
        _ => {}
    }

    if let Some(input) = &step.input {
        mapped.masked = input.is_masked();
        input_parameters(&step.id, input, &mut mapped.parameters);
    }

    let screenshot_worthy = step.metadata.critical
        || matches!(step.action, Action::Click | Action::Navigate);
    if config.enable_screenshots && screenshot_worthy {
        mapped.parameters.insert("screenshot".to_string(), json!(true));
        mapped.screenshot = true;
    }

    mapped
}

fn locator(candidate: &LocatorCandidate) -> Value {
    json!({
        "kind": candidate.locator.kind,
        "value": candidate.locator.value,
        "confidence": candidate.confidence,
    })
}

/// Masked values are replaced by `MASK` and a reference key; the recorded
/// value is never copied.
fn input_parameters(
    step_id: &str,
    input: &InputPayload,
    parameters: &mut Map<String, Value>,
) {
    let masked = input.is_masked();
    parameters.insert("inputKind".to_string(), json!(input.kind));
    parameters.insert("source".to_string(), json!(input.source));
    parameters.insert("masked".to_string(), json!(masked));
    if masked {
        let reference = input
            .reference
            .clone()
            .unwrap_or_else(|| format!("secret_{}", step_id));
        parameters.insert("value".to_string(), json!(MASK));
        parameters.insert("reference".to_string(), json!(reference));
    } else {
        parameters.insert("value".to_string(), json!(input.value));
        if let Some(reference) = &input.reference {
            parameters.insert("reference".to_string(), json!(reference));
        }
    }
}
