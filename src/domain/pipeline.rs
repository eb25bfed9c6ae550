//! End-to-end analysis run: build, extract, analyze, synthesize.

use crate::domain::builder::GraphBuilder;
use crate::domain::diagnostics::{AnalysisError, Diagnostic};
use crate::domain::graph::GraphSnapshot;
use crate::domain::propagation::{ErrorContract, ErrorPropagationAnalyzer};
use crate::domain::synthesis::{ScenarioTag, TestScenario, TestSynthesisEngine};
use crate::domain::unit::{UnitId, UnitModel};
use crate::domain::workflow::{Workflow, WorkflowExtractor};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Everything one run produces. Serializes byte-identically for identical input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisReport {
    pub graph: GraphSnapshot,
    pub workflows: Vec<Workflow>,
    pub contracts: BTreeMap<UnitId, ErrorContract>,
    pub error_passes: usize,
    pub errors_converged: bool,
    pub scenarios: Vec<TestScenario>,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisReport {
    pub fn scenarios_tagged(&self, tag: ScenarioTag) -> impl Iterator<Item = &TestScenario> {
        self.scenarios.iter().filter(move |s| s.tag == tag)
    }

    pub fn count_by_tag(&self) -> BTreeMap<ScenarioTag, usize> {
        let mut counts = BTreeMap::new();
        for scenario in &self.scenarios {
            *counts.entry(scenario.tag).or_insert(0) += 1;
        }
        counts
    }
}

/// The four stages wired together.
pub struct Pipeline {
    builder: GraphBuilder,
    extractor: WorkflowExtractor,
    analyzer: ErrorPropagationAnalyzer,
    synthesizer: TestSynthesisEngine,
}

impl Pipeline {
    pub fn new(
        builder: GraphBuilder,
        extractor: WorkflowExtractor,
        analyzer: ErrorPropagationAnalyzer,
        synthesizer: TestSynthesisEngine,
    ) -> Self {
        Self {
            builder,
            extractor,
            analyzer,
            synthesizer,
        }
    }

    pub fn run(&self, model: &UnitModel) -> Result<AnalysisReport, AnalysisError> {
        let built = self.builder.build(model)?;
        let graph = built.graph;

        let workflows = self.extractor.extract(&graph);
        let errors = self.analyzer.analyze(&graph);
        let scenarios = self.synthesizer.synthesize(&graph, &workflows, &errors);

        let mut diagnostics = built.diagnostics;
        diagnostics.extend(workflows.diagnostics);
        diagnostics.extend(errors.diagnostics.iter().cloned());
        diagnostics.sort();
        diagnostics.dedup();
        report_diagnostics(&diagnostics);

        info!(
            units = graph.unit_count(),
            boundaries = graph.boundary_count(),
            edges = graph.edge_count(),
            workflows = workflows.workflows.len(),
            scenarios = scenarios.len(),
            diagnostics = diagnostics.len(),
            "Analysis complete"
        );

        Ok(AnalysisReport {
            graph: graph.snapshot(),
            workflows: workflows.workflows,
            contracts: errors.contracts,
            error_passes: errors.passes,
            errors_converged: errors.converged,
            scenarios,
            diagnostics,
        })
    }
}

/// One warning per diagnostic class.
fn report_diagnostics(diagnostics: &[Diagnostic]) {
    let mut by_code: BTreeMap<&str, usize> = BTreeMap::new();
    for d in diagnostics {
        *by_code.entry(d.code()).or_insert(0) += 1;
    }
    for (code, count) in by_code {
        warn!(kind = code, count, "Analysis diagnostics reported");
    }
}
