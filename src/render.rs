use crate::compiler::{CompilationResult, CompiledGraph, OutputPort};

pub fn render_report(result: &CompilationResult) -> String {
    format!("{}", RenderedReport(result))
}

struct RenderedReport<'a>(&'a CompilationResult);

impl<'a> std::fmt::Display for RenderedReport<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = self.0;
        let metadata = &result.metadata;
        if result.success {
            writeln!(
                f,
                "compiled {} steps into {} nodes in {}ms",
                metadata.original_steps,
                metadata.generated_nodes,
                metadata.compilation_time.as_millis()
            )?;
        } else {
            writeln!(
                f,
                "compilation failed after {} of {} steps",
                metadata.processed_steps,
                metadata.original_steps
            )?;
        }

        if !metadata.features.is_empty() {
            let features: Vec<String> =
                metadata.features.iter().map(ToString::to_string).collect();
            writeln!(f, "features: {}", features.join(", "))?;
        }
        for error in &result.errors {
            writeln!(f, "error[{}]: {}", error.code(), error)?;
        }
        for warning in &result.warnings {
            writeln!(f, "warning: {}", warning)?;
        }
        if let Some(graph) = &result.graph {
            write!(f, "{}", RenderedGraph(graph))?;
        }
        Ok(())
    }
}

struct RenderedGraph<'a>(&'a CompiledGraph);

impl<'a> std::fmt::Display for RenderedGraph<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let graph = self.0;
        for node in &graph.nodes {
            write!(f, "  {} {}", node.id, node.name)?;
            if node.retry_count() > 0 {
                write!(f, " (retries: {})", node.retry_count())?;
            }
            writeln!(f)?;
            for connection in graph.outgoing(&node.id) {
                let target = graph
                    .node(&connection.to)
                    .map(|node| node.name.as_str())
                    .unwrap_or(connection.to.as_str());
                match connection.port {
                    OutputPort::Main => writeln!(f, "    -> {}", target)?,
                    port => {
                        let port = format!("{:?}", port).to_lowercase();
                        writeln!(f, "    -[{}]-> {}", port, target)?
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{
        CompilationMetadata, CompileError, StepMappingConfig, compile,
    };
    use crate::locator::{
        Locator, LocatorCandidate, StrategyKind, Verification,
    };
    use crate::trace::{Action, Trace, TraceStep};
    use insta::assert_snapshot;

    fn click(id: &str, timestamp: u64) -> TraceStep {
        let mut step = TraceStep::new(id, Action::Click, timestamp);
        step.candidates.push(LocatorCandidate {
            locator: Locator::css(format!("#{}", id)),
            confidence: 100,
            strategy: StrategyKind::AttributePriority,
            verification: Verification::Passed,
            bounds: Default::default(),
            attributes: Default::default(),
        });
        step
    }

    fn without_timing(report: String) -> String {
        report
            .lines()
            .map(|line| match line.split_once(" nodes in ") {
                Some((head, _)) => format!("{} nodes in <t>", head),
                None => line.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_success_report() {
        let mut checkpoint =
            TraceStep::new("check", Action::ConditionalCheckpoint, 1);
        checkpoint.candidates = click("banner", 0).candidates;
        let trace =
            Trace::try_from(vec![checkpoint, click("accept", 2)]).unwrap();
        let config = StepMappingConfig {
            enable_retries: false,
            ..StepMappingConfig::default()
        };
        let report = render_report(&compile(&trace, &config));
        assert_snapshot!(without_timing(report), @r"
        compiled 2 steps into 4 nodes in <t>
        features: error-recovery, conditional-branches
        warning: step check has no recorded branch outcome; Click 1 was attached to its true output
          node-000 Start
            -> Condition 1
          node-001 Condition 1
            -[true]-> Click 1
            -[error]-> Stop on Error
          node-002 Click 1
            -[error]-> Stop on Error
          node-003 Stop on Error
        ");
    }

    #[test]
    fn test_failure_report() {
        let trace = Trace::try_from(vec![
            click("a", 1),
            TraceStep::new("b", Action::Upload, 2),
        ])
        .unwrap();
        let report = render_report(&compile(&trace, &StepMappingConfig::default()));
        assert_snapshot!(report, @r"
        compilation failed after 1 of 2 steps
        error[missing-target]: step b: upload needs a target element but has no locator candidates
        ");
    }

    #[test]
    fn test_integrity_failure_counts_steps_not_nodes() {
        let result = CompilationResult {
            success: false,
            graph: None,
            errors: vec![CompileError::GraphIntegrity {
                node: "node-002".to_string(),
                message: "not reachable from the entry node".to_string(),
            }],
            warnings: Vec::new(),
            metadata: CompilationMetadata {
                original_steps: 2,
                processed_steps: 2,
                generated_nodes: 4,
                ..CompilationMetadata::default()
            },
        };
        assert_snapshot!(render_report(&result), @r"
        compilation failed after 2 of 2 steps
        error[graph-integrity]: node node-002: not reachable from the entry node
        ");
    }
}
