//! Turns interactions on a page into trace steps.
//!
//! The recorder owns the session's trace and a logical clock. Each targeted
//! interaction runs the locator engine once, at the moment it happens, so the
//! candidates describe the page as the user saw it.

use std::fmt::Display;

use crate::locator::{ElementSnapshot, InfrastructureError, LocatorEngine};
use crate::page::{NodeId, Page};
use crate::trace::{
    Action, BranchOutcome, InputPayload, ScrollPosition, Trace, TraceError,
    TraceStep,
};

#[derive(Debug)]
pub enum RecordError {
    Locator(InfrastructureError),
    Trace(TraceError),
}

impl Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::Locator(error) => {
                write!(f, "could not locate element: {}", error)
            }
            RecordError::Trace(error) => {
                write!(f, "could not append step: {}", error)
            }
        }
    }
}

impl std::error::Error for RecordError {}

impl From<InfrastructureError> for RecordError {
    fn from(error: InfrastructureError) -> Self {
        RecordError::Locator(error)
    }
}

impl From<TraceError> for RecordError {
    fn from(error: TraceError) -> Self {
        RecordError::Trace(error)
    }
}

pub type Result<T> = std::result::Result<T, RecordError>;

pub struct Recorder {
    engine: LocatorEngine,
    trace: Trace,
    clock: u64,
}

impl Default for Recorder {
    fn default() -> Self {
        Recorder::new(LocatorEngine::default())
    }
}

impl Recorder {
    pub fn new(engine: LocatorEngine) -> Self {
        Recorder {
            engine,
            trace: Trace::new(),
            clock: 0,
        }
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Ends the session.
    pub fn finish(self) -> Trace {
        self.trace
    }

    /// Records one step. `target` is the element acted on, if any; `edit`
    /// fills in the action-specific fields before the step is sealed.
    pub fn record(
        &mut self,
        action: Action,
        target: Option<(&Page, NodeId)>,
        edit: impl FnOnce(&mut TraceStep),
    ) -> Result<&TraceStep> {
        let timestamp = self.clock + 1;
        let id = format!("step-{:04}", self.trace.len() + 1);
        let mut step = TraceStep::new(id, action, timestamp);

        if let Some((page, node)) = target {
            let element = ElementSnapshot::capture(page, node)?;
            step.candidates = self.engine.extract(&element, page)?;
        }
        edit(&mut step);

        log::debug!(
            "recorded {} {} with {} candidates",
            step.id,
            step.action,
            step.candidates.len()
        );
        self.trace.push(step)?;
        self.clock = timestamp;
        Ok(&self.trace.steps()[self.trace.len() - 1])
    }

    pub fn click(&mut self, page: &Page, node: NodeId) -> Result<&TraceStep> {
        self.record(Action::Click, Some((page, node)), |_| {})
    }

    pub fn input(
        &mut self,
        page: &Page,
        node: NodeId,
        payload: InputPayload,
    ) -> Result<&TraceStep> {
        self.record(Action::Input, Some((page, node)), |step| {
            step.input = Some(payload);
        })
    }

    pub fn navigate(&mut self, url: &str) -> Result<&TraceStep> {
        self.record(Action::Navigate, None, |step| {
            step.url = Some(url.to_string());
        })
    }

    pub fn scroll(&mut self, position: ScrollPosition) -> Result<&TraceStep> {
        self.record(Action::Scroll, None, |step| {
            step.scroll_position = Some(position);
        })
    }

    pub fn wait(&mut self, duration_ms: u64) -> Result<&TraceStep> {
        self.record(Action::Wait, None, |step| {
            step.wait_ms = Some(duration_ms);
        })
    }

    pub fn checkpoint(
        &mut self,
        page: &Page,
        node: NodeId,
        outcome: Option<BranchOutcome>,
    ) -> Result<&TraceStep> {
        self.record(Action::ConditionalCheckpoint, Some((page, node)), |step| {
            step.metadata.branch_outcome = outcome;
        })
    }
}
