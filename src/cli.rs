use crate::adapters::emitter::json::JsonScenarioEmitter;
use crate::app::dto::{ContractQuery, ScenarioQuery, WorkflowQuery};
use crate::app::engine::{AnalysisEngine, summarize};
use crate::domain::diagnostics::Diagnostic;
use crate::domain::ports::ScenarioEmitter;
use crate::domain::propagation::ErrorOrigin;
use crate::domain::synthesis::ScenarioTag;
use anyhow::{Context as _, Result};
use std::io::Write;
use std::path::Path;

/// Writes scenarios as JSON to `output` (stdout when `None`).
pub fn generate_scenarios(
    engine: &AnalysisEngine,
    tag: Option<ScenarioTag>,
    output: Option<&Path>,
) -> Result<()> {
    let result = engine.scenarios(ScenarioQuery { tag, unit: None })?;
    let emitter = JsonScenarioEmitter::default();

    match output {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            emitter.emit(&result.scenarios, &mut file)?;
            eprintln!("Wrote {} scenario(s) to {}", result.total, path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            emitter.emit(&result.scenarios, &mut lock)?;
            lock.flush()?;
        }
    }

    diagnostics_banner(&result.diagnostics);
    Ok(())
}

/// Build graph and print the deterministic snapshot as JSON.
pub fn debug_graph(engine: &AnalysisEngine) -> Result<()> {
    let report = engine.report()?;
    println!("{}", serde_json::to_string_pretty(&report.graph)?);
    Ok(())
}

pub fn print_summary(engine: &AnalysisEngine) -> Result<()> {
    let report = engine.report()?;
    let summary = summarize(&report);

    println!("Interaction Graph:");
    println!("  Units:      {}", summary.unit_count);
    println!("  Boundaries: {}", summary.boundary_count);
    for (kind, count) in &summary.edges {
        println!("  {:<12}{}", format!("{kind}:"), count);
    }
    println!("\nWorkflows: {}", summary.workflow_count);
    println!(
        "Error propagation: {} pass(es), {}",
        summary.error_passes,
        if summary.errors_converged {
            "converged"
        } else {
            "NOT converged"
        }
    );

    println!("\nScenarios:");
    for tag in ScenarioTag::all() {
        let count = summary.scenarios.get(tag.as_str()).copied().unwrap_or(0);
        println!("  {:<22}{}", tag.as_str(), count);
    }

    diagnostics_banner(&summary.diagnostics);
    Ok(())
}

pub fn print_workflows(engine: &AnalysisEngine, entry: Option<&str>) -> Result<()> {
    let result = engine.workflows(WorkflowQuery {
        entry: entry.map(String::from),
    })?;

    println!("Retained workflows: {}", result.workflows.len());
    println!("{}", "=".repeat(80));
    for (i, w) in result.workflows.iter().enumerate() {
        println!(
            "{}. [{:?}] length {} | units {} | categories {}",
            i + 1,
            w.termination,
            w.length,
            w.score.distinct_units,
            w.score.distinct_boundary_categories
        );
        println!("   {}", w.nodes.join(" -> "));
        println!();
    }

    diagnostics_banner(&result.diagnostics);
    Ok(())
}

pub fn print_error_contracts(engine: &AnalysisEngine, unit: Option<&str>) -> Result<()> {
    let result = engine.contracts(ContractQuery {
        unit: unit.map(String::from),
    })?;

    println!(
        "Error contracts ({} pass(es){})",
        result.passes,
        if result.converged { "" } else { ", not converged" }
    );
    println!("{}", "=".repeat(80));

    for contract in result.contracts.iter().filter(|c| unit.is_some() || !c.errors.is_empty()) {
        println!("\n{}", contract.unit);
        if contract.errors.is_empty() {
            println!("  (no error kinds surface)");
        }
        for (kind, entry) in &contract.errors {
            let origin = match &entry.origin {
                ErrorOrigin::Local => "local".to_string(),
                ErrorOrigin::Propagated => "propagated".to_string(),
                ErrorOrigin::Wrapped { from } => format!("wrapped from {from}"),
            };
            println!("  {kind} ({origin})");
            for witness in &entry.witnesses {
                println!("    via {}", witness.path.join(" -> "));
            }
        }
        for (kind, edges) in &contract.suppressed {
            let from: Vec<&str> = edges.iter().map(|e| e.target.as_str()).collect();
            println!("  suppresses {kind} from {}", from.join(", "));
        }
    }

    diagnostics_banner(&result.diagnostics);
    Ok(())
}

pub fn print_diagnostics(engine: &AnalysisEngine) -> Result<()> {
    let result = engine.diagnostics()?;
    if result.diagnostics.is_empty() {
        println!("No diagnostics.");
        return Ok(());
    }
    for d in &result.diagnostics {
        println!("[{}] {}", d.code(), d);
    }
    Ok(())
}

/// Stderr notice so diagnostics are never lost behind machine-readable stdout.
fn diagnostics_banner(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    let run_level: Vec<&Diagnostic> = diagnostics.iter().filter(|d| d.affects_run()).collect();
    eprintln!(
        "warning: {} diagnostic(s) reported ({} affect the whole run); see the `diagnostics` command",
        diagnostics.len(),
        run_level.len()
    );
    for d in run_level {
        eprintln!("  {d}");
    }
}
