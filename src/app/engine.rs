use crate::adapters::json::source::JsonUnitModelSource;
use crate::app::config::AnalysisConfig;
use crate::app::dto::*;
use crate::domain::pipeline::AnalysisReport;
use crate::domain::ports::UnitModelSource;
use crate::domain::unit::UnitModel;
use anyhow::{Context as _, Result, anyhow, bail};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tracing::info;

/// Application service shared by the CLI, HTTP and MCP surfaces. Holds the report of
/// the last analysis run; `reload` re-reads the model file and swaps it atomically.
#[derive(Clone)]
pub struct AnalysisEngine {
    inner: Arc<RwLock<EngineData>>,
}

struct EngineData {
    model_path: Option<PathBuf>,
    config: AnalysisConfig,
    report: Arc<AnalysisReport>,
}

/// Runs the whole pipeline over `model` with `config`.
pub fn analyze_model(model: UnitModel, config: &AnalysisConfig) -> Result<AnalysisReport> {
    let pipeline = config.pipeline().context("Invalid analysis configuration")?;
    let model = config.prepare(model);
    pipeline.run(&model).context("Analysis failed")
}

impl AnalysisEngine {
    /// Construct an engine from an in-memory model.
    ///
    /// Used for testing or when the model comes from a front end running in-process.
    pub fn from_model(model: UnitModel, config: AnalysisConfig) -> Result<Self> {
        let report = analyze_model(model, &config)?;
        Ok(Self::with_report(None, config, report))
    }

    pub fn load(model_path: &Path, config: AnalysisConfig) -> Result<Self> {
        let report = Self::analyze_file(model_path, &config)?;
        Ok(Self::with_report(
            Some(model_path.to_path_buf()),
            config,
            report,
        ))
    }

    fn with_report(model_path: Option<PathBuf>, config: AnalysisConfig, report: AnalysisReport) -> Self {
        Self {
            inner: Arc::new(RwLock::new(EngineData {
                model_path,
                config,
                report: Arc::new(report),
            })),
        }
    }

    fn analyze_file(model_path: &Path, config: &AnalysisConfig) -> Result<AnalysisReport> {
        info!(path = %model_path.display(), "Loading unit model");
        let model = JsonUnitModelSource::new(model_path).load()?;
        analyze_model(model, config)
    }

    fn data(&self) -> Result<RwLockReadGuard<'_, EngineData>> {
        self.inner
            .read()
            .map_err(|_| anyhow!("engine state lock poisoned"))
    }

    /// Snapshot of the current report.
    pub fn report(&self) -> Result<Arc<AnalysisReport>> {
        Ok(self.data()?.report.clone())
    }

    pub fn config(&self) -> Result<AnalysisConfig> {
        Ok(self.data()?.config.clone())
    }

    pub fn reload(&self) -> Result<HealthResponse> {
        let (path, config) = {
            let data = self.data()?;
            let Some(path) = data.model_path.clone() else {
                bail!("Engine was built from an in-memory model; nothing to reload");
            };
            (path, data.config.clone())
        };
        // Analysis runs without holding the lock; readers keep the previous report.
        let report = Self::analyze_file(&path, &config)?;

        {
            let mut data = self
                .inner
                .write()
                .map_err(|_| anyhow!("engine state lock poisoned"))?;
            data.report = Arc::new(report);
        }
        self.health()
    }

    pub fn health(&self) -> Result<HealthResponse> {
        let data = self.data()?;
        let report = &data.report;
        Ok(HealthResponse {
            model_path: data
                .model_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default(),
            unit_count: report.graph.units.len(),
            boundary_count: report.graph.boundaries.len(),
            edge_count: report.graph.edges.len(),
            scenario_count: report.scenarios.len(),
            diagnostic_count: report.diagnostics.len(),
        })
    }

    /// Analyzes an inline document without touching the loaded report.
    pub fn analyze(&self, req: AnalyzeRequest) -> Result<AnalysisReport> {
        let config = match req.config {
            Some(config) => config,
            None => self.config()?,
        };
        let model = UnitModel::from_document(req.model).context("Invalid unit model")?;
        analyze_model(model, &config)
    }

    pub fn summary(&self) -> Result<SummaryResponse> {
        let report = self.report()?;
        Ok(summarize(&report))
    }

    pub fn scenarios(&self, query: ScenarioQuery) -> Result<ScenariosResponse> {
        let report = self.report()?;
        if let Some(unit) = &query.unit {
            ensure_unit(&report, unit)?;
        }
        let unit_element = query.unit.as_ref().map(|u| format!("unit:{u}"));
        let scenarios: Vec<_> = report
            .scenarios
            .iter()
            .filter(|s| query.tag.is_none_or(|tag| s.tag == tag))
            .filter(|s| {
                unit_element
                    .as_ref()
                    .is_none_or(|element| s.elements.contains(element))
            })
            .cloned()
            .collect();
        Ok(ScenariosResponse {
            total: scenarios.len(),
            scenarios,
            diagnostics: report.diagnostics.clone(),
        })
    }

    pub fn workflows(&self, query: WorkflowQuery) -> Result<WorkflowsResponse> {
        let report = self.report()?;
        if let Some(entry) = &query.entry {
            ensure_unit(&report, entry)?;
        }
        Ok(WorkflowsResponse {
            workflows: report
                .workflows
                .iter()
                .filter(|w| query.entry.as_ref().is_none_or(|e| &w.entry == e))
                .cloned()
                .collect(),
            diagnostics: report.diagnostics.clone(),
        })
    }

    pub fn contracts(&self, query: ContractQuery) -> Result<ContractsResponse> {
        let report = self.report()?;
        let contracts = match &query.unit {
            Some(unit) => {
                let contract = report
                    .contracts
                    .get(unit)
                    .ok_or_else(|| anyhow!("Unit not found: {unit}"))?;
                vec![contract.clone()]
            }
            None => report.contracts.values().cloned().collect(),
        };
        Ok(ContractsResponse {
            contracts,
            passes: report.error_passes,
            converged: report.errors_converged,
            diagnostics: report.diagnostics.clone(),
        })
    }

    pub fn diagnostics(&self) -> Result<DiagnosticsResponse> {
        Ok(DiagnosticsResponse {
            diagnostics: self.report()?.diagnostics.clone(),
        })
    }
}

fn ensure_unit(report: &AnalysisReport, id: &str) -> Result<()> {
    if report.graph.units.iter().any(|u| u.id == id) {
        Ok(())
    } else {
        bail!("Unit not found: {id}")
    }
}

pub fn summarize(report: &AnalysisReport) -> SummaryResponse {
    let mut edges = BTreeMap::new();
    for edge in &report.graph.edges {
        *edges.entry(edge.kind.as_str().to_string()).or_insert(0) += 1;
    }
    let scenarios = report
        .count_by_tag()
        .into_iter()
        .map(|(tag, count)| (tag.as_str().to_string(), count))
        .collect();
    SummaryResponse {
        unit_count: report.graph.units.len(),
        boundary_count: report.graph.boundaries.len(),
        edges,
        workflow_count: report.workflows.len(),
        scenarios,
        error_passes: report.error_passes,
        errors_converged: report.errors_converged,
        diagnostics: report.diagnostics.clone(),
    }
}
