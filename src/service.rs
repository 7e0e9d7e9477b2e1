//! Compiling stored workflows: fetch the workflow, announce, compile, persist
//! the artifact, announce again.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::compiler::{
    CompilationResult, StepMappingConfig, StepMappingOverride, compile,
};
use crate::trace::Trace;

pub mod store;

pub use store::{DirectoryStore, DocumentStore, MemoryStore, StoreError};

pub const WORKFLOWS: &str = "workflows";
pub const COMPILED: &str = "compiled";

/// A recorded workflow as kept in the `workflows` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub trace: Trace,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<StepMappingOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum CompilationEvent {
    #[serde(rename_all = "camelCase")]
    CompilationStarted { workflow_id: String, steps: usize },
    #[serde(rename_all = "camelCase")]
    CompilationCompleted {
        workflow_id: String,
        success: bool,
        generated_nodes: usize,
        errors: usize,
        warnings: usize,
    },
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: &CompilationEvent);
}

/// Writes events to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &CompilationEvent) {
        match event {
            CompilationEvent::CompilationStarted { workflow_id, steps } => {
                log::info!("compiling workflow {} ({} steps)", workflow_id, steps)
            }
            CompilationEvent::CompilationCompleted {
                workflow_id,
                success: true,
                generated_nodes,
                warnings,
                ..
            } => log::info!(
                "compiled workflow {} into {} nodes with {} warnings",
                workflow_id,
                generated_nodes,
                warnings
            ),
            CompilationEvent::CompilationCompleted {
                workflow_id, errors, ..
            } => log::warn!(
                "workflow {} failed to compile with {} errors",
                workflow_id,
                errors
            ),
        }
    }
}

/// What ends up in the `compiled` collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledArtifact<'a> {
    pub workflow_id: &'a str,
    pub name: &'a str,
    pub result: &'a CompilationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<serde_json::Value>,
}

pub struct CompileService<S, N> {
    store: S,
    notifier: N,
    base: StepMappingConfig,
}

impl<S: DocumentStore, N: Notifier> CompileService<S, N> {
    /// `base` is the config before any workflow or caller overrides.
    pub fn new(store: S, notifier: N, base: StepMappingConfig) -> Self {
        CompileService {
            store,
            notifier,
            base,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn workflow(&self, id: &str) -> Result<Workflow> {
        let document = self
            .store
            .read(WORKFLOWS, id)
            .with_context(|| format!("could not load workflow {}", id))?;
        serde_json::from_value(document)
            .with_context(|| format!("workflow {} is malformed", id))
    }

    /// Compiles a stored workflow. Config layers apply in order: the
    /// service's base, the workflow's own override, then `overrides`.
    pub fn compile(
        &self,
        id: &str,
        overrides: Option<&StepMappingOverride>,
    ) -> Result<CompilationResult> {
        let workflow = self.workflow(id)?;
        let mut config = self.base.clone();
        if let Some(embedded) = &workflow.config {
            config.apply(embedded);
        }
        if let Some(overrides) = overrides {
            config.apply(overrides);
        }

        self.notifier.notify(&CompilationEvent::CompilationStarted {
            workflow_id: workflow.id.clone(),
            steps: workflow.trace.len(),
        });
        let result = compile(&workflow.trace, &config);

        let artifact = CompiledArtifact {
            workflow_id: &workflow.id,
            name: &workflow.name,
            result: &result,
            workflow: result
                .graph
                .as_ref()
                .map(|graph| graph.to_workflow_json(&workflow.name)),
        };
        let document = serde_json::to_value(&artifact)?;
        self.store
            .put(COMPILED, &workflow.id, &document)
            .with_context(|| {
                format!("could not store compiled workflow {}", workflow.id)
            })?;

        self.notifier.notify(&CompilationEvent::CompilationCompleted {
            workflow_id: workflow.id.clone(),
            success: result.success,
            generated_nodes: result.metadata.generated_nodes,
            errors: result.errors.len(),
            warnings: result.warnings.len(),
        });
        Ok(result)
    }
}
