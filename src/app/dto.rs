use crate::app::config::AnalysisConfig;
use crate::domain::diagnostics::Diagnostic;
use crate::domain::propagation::ErrorContract;
use crate::domain::synthesis::{ScenarioTag, TestScenario};
use crate::domain::unit::UnitModelDocument;
use crate::domain::workflow::Workflow;
use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthResponse {
    /// Model file the engine was loaded from (empty for in-memory models).
    pub model_path: String,
    pub unit_count: usize,
    pub boundary_count: usize,
    pub edge_count: usize,
    pub scenario_count: usize,
    pub diagnostic_count: usize,
}

/// Inline analysis of a unit model document, independent of the loaded model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeRequest {
    pub model: UnitModelDocument,
    /// Overrides the engine's configuration for this request.
    #[serde(default)]
    pub config: Option<AnalysisConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SummaryResponse {
    pub unit_count: usize,
    pub boundary_count: usize,
    /// Edge count per edge kind.
    pub edges: BTreeMap<String, usize>,
    pub workflow_count: usize,
    /// Scenario count per tag.
    pub scenarios: BTreeMap<String, usize>,
    pub error_passes: usize,
    pub errors_converged: bool,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioQuery {
    pub tag: Option<ScenarioTag>,
    /// Only scenarios exercising this unit.
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScenariosResponse {
    pub scenarios: Vec<TestScenario>,
    pub total: usize,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowQuery {
    pub entry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowsResponse {
    pub workflows: Vec<Workflow>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ContractQuery {
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContractsResponse {
    pub contracts: Vec<ErrorContract>,
    pub passes: usize,
    pub converged: bool,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DiagnosticsResponse {
    pub diagnostics: Vec<Diagnostic>,
}
