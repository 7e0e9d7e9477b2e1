//! Trace to node graph compilation.
//!
//! Compilation is a pure function of the trace and the config: node ids,
//! names and positions depend only on the order nodes are created in, so an
//! unchanged trace always compiles to the same graph. Only the measured
//! duration differs between runs.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use serde_json::{Map, json};

use crate::trace::{BranchOutcome, Trace, TraceStep};

pub mod config;
pub mod export;
pub mod graph;
pub mod mapping;
pub mod result;
pub mod selection;
pub mod validate;

pub use config::{SelectorStrategy, StepMappingConfig, StepMappingOverride};
pub use graph::{
    CompiledGraph, CompiledNode, Connection, ErrorPolicy, NodeKind,
    OutputPort, Position, RetrySettings,
};
pub use result::{
    CompilationMetadata, CompilationResult, CompileError, Feature,
};

use graph::LayoutCursor;

pub fn compile(trace: &Trace, config: &StepMappingConfig) -> CompilationResult {
    let started = Instant::now();
    log::info!("compiling {} steps", trace.len());

    let mut builder = GraphBuilder::new(config);
    let outcome = trace
        .steps()
        .iter()
        .try_for_each(|step| builder.add_step(step));

    let errors = match outcome {
        Ok(()) => {
            builder.finish();
            validate::validate(&builder.graph)
        }
        Err(error) => vec![error],
    };
    let success = errors.is_empty();

    let metadata = CompilationMetadata {
        original_steps: trace.len(),
        processed_steps: builder.steps,
        generated_nodes: builder.graph.nodes.len(),
        compilation_time: started.elapsed(),
        features: if success {
            builder.features.iter().copied().collect()
        } else {
            Vec::new()
        },
    };

    if success {
        log::info!(
            "compiled {} steps into {} nodes in {:?}",
            metadata.original_steps,
            metadata.generated_nodes,
            metadata.compilation_time
        );
    } else {
        for error in &errors {
            log::warn!("compilation failed: {}", error);
        }
    }

    CompilationResult {
        success,
        graph: success.then_some(builder.graph),
        errors,
        warnings: builder.warnings,
        metadata,
    }
}

/// Where the next node gets attached, and whether that attachment relies on
/// a defaulted branch outcome.
struct Attachment {
    node: String,
    port: OutputPort,
    defaulted_from: Option<String>,
}

struct GraphBuilder<'a> {
    config: &'a StepMappingConfig,
    graph: CompiledGraph,
    counter: usize,
    steps: usize,
    layout: LayoutCursor,
    names: HashMap<&'static str, usize>,
    attachment: Attachment,
    error_outputs: Vec<String>,
    warnings: Vec<String>,
    features: BTreeSet<Feature>,
}

impl<'a> GraphBuilder<'a> {
    fn new(config: &'a StepMappingConfig) -> Self {
        let mut layout = LayoutCursor::default();
        let mut parameters = Map::new();
        parameters.insert("timeoutMs".to_string(), json!(config.timeout_ms));
        let entry = CompiledNode {
            id: node_id(0),
            name: NodeKind::Start.label().to_string(),
            kind: NodeKind::Start,
            position: layout.next_position(),
            parameters,
            error_policy: ErrorPolicy::StopWorkflow,
            retry: None,
        };
        let attachment = Attachment {
            node: entry.id.clone(),
            port: OutputPort::Main,
            defaulted_from: None,
        };
        GraphBuilder {
            config,
            graph: CompiledGraph::new(entry),
            counter: 1,
            steps: 0,
            layout,
            names: HashMap::new(),
            attachment,
            error_outputs: Vec::new(),
            warnings: Vec::new(),
            features: BTreeSet::new(),
        }
    }

    fn add_step(&mut self, step: &TraceStep) -> Result<(), CompileError> {
        let kind = mapping::node_kind(&step.action).ok_or_else(|| {
            CompileError::UnmappedAction {
                step: step.id.clone(),
                action: step.action.to_string(),
            }
        })?;
        if step.action.requires_target() && step.candidates.is_empty() {
            return Err(CompileError::MissingTarget {
                step: step.id.clone(),
                action: step.action.to_string(),
            });
        }

        let selection =
            selection::select(&step.candidates, self.config.selector_strategy);
        let mapped =
            mapping::parameters(step, kind, selection.as_ref(), self.config);
        if selection.is_some_and(|selection| !selection.fallbacks.is_empty()) {
            self.features.insert(Feature::FallbackLocators);
        }
        if mapped.masked {
            self.features.insert(Feature::MaskedInputs);
        }
        if mapped.screenshot {
            self.features.insert(Feature::ScreenshotCheckpoints);
        }
        self.warnings.extend(mapped.warnings);

        let error_policy = self.error_policy(step);
        let retry = self.retry(step);
        let label = mapping::annotation(&step.action)
            .map(annotation_label)
            .unwrap_or_else(|| kind.label());
        let node = CompiledNode {
            id: node_id(self.counter),
            name: self.name(label),
            kind,
            position: self.layout.next_position(),
            parameters: mapped.parameters,
            error_policy,
            retry,
        };
        self.counter += 1;
        log::debug!("{} -> {} ({})", step.id, node.id, node.name);

        if error_policy == ErrorPolicy::ContinueErrorOutput {
            self.features.insert(Feature::ErrorRecovery);
            self.error_outputs.push(node.id.clone());
        }
        if retry.is_some() {
            self.features.insert(Feature::RetriesEnabled);
        }
        if kind == NodeKind::ConditionalBranch {
            self.features.insert(Feature::ConditionalBranches);
        }

        let next = match kind {
            NodeKind::ConditionalBranch => match step.metadata.branch_outcome {
                Some(BranchOutcome::True) => (OutputPort::True, None),
                Some(BranchOutcome::False) => (OutputPort::False, None),
                None => (OutputPort::True, Some(step.id.clone())),
            },
            _ => (OutputPort::Main, None),
        };
        self.attach(&node.id, &node.name);
        self.attachment = Attachment {
            node: node.id.clone(),
            port: next.0,
            defaulted_from: next.1,
        };
        self.graph.add_node(node);
        self.steps += 1;
        Ok(())
    }

    fn attach(&mut self, id: &str, name: &str) {
        if let Some(checkpoint) = self.attachment.defaulted_from.take() {
            let warning = format!(
                "step {} has no recorded branch outcome; {} was attached to its true output",
                checkpoint, name
            );
            log::warn!("{}", warning);
            self.warnings.push(warning);
        }
        let from = self.attachment.node.clone();
        self.graph.connect(&from, self.attachment.port, id);
    }

    /// Adds the shared stop node that every error output drains into.
    fn finish(&mut self) {
        if self.error_outputs.is_empty() {
            return;
        }
        let mut parameters = Map::new();
        parameters.insert(
            "errorMessage".to_string(),
            json!("A recorded step failed after exhausting its retries"),
        );
        parameters.insert("timeoutMs".to_string(), json!(self.config.timeout_ms));
        let stop = CompiledNode {
            id: node_id(self.counter),
            name: NodeKind::ErrorStop.label().to_string(),
            kind: NodeKind::ErrorStop,
            position: self.layout.next_position(),
            parameters,
            error_policy: ErrorPolicy::StopWorkflow,
            retry: None,
        };
        self.counter += 1;
        for source in std::mem::take(&mut self.error_outputs) {
            self.graph.connect(&source, OutputPort::Error, &stop.id);
        }
        self.graph.add_node(stop);
    }

    fn error_policy(&self, step: &TraceStep) -> ErrorPolicy {
        if self.config.enable_error_recovery && !step.metadata.critical {
            ErrorPolicy::ContinueErrorOutput
        } else {
            ErrorPolicy::StopWorkflow
        }
    }

    fn retry(&self, step: &TraceStep) -> Option<RetrySettings> {
        if !self.config.enable_retries {
            return None;
        }
        let settings = match step.metadata.retry {
            Some(policy) => RetrySettings {
                max_retries: policy.max_retries,
                wait_between_retries: policy.wait_between_retries,
            },
            None => RetrySettings {
                max_retries: self.config.max_retries,
                wait_between_retries: self.config.wait_between_retries,
            },
        };
        (settings.max_retries > 0).then_some(settings)
    }

    fn name(&mut self, label: &'static str) -> String {
        let count = self.names.entry(label).or_insert(0);
        *count += 1;
        format!("{} {}", label, count)
    }
}

fn node_id(index: usize) -> String {
    format!("node-{:03}", index)
}

fn annotation_label(annotation: &str) -> &'static str {
    match annotation {
        "scroll" => "Scroll",
        "screenshot" => "Screenshot",
        "upload" => "Upload",
        "download" => "Download",
        _ => "Wait",
    }
}
