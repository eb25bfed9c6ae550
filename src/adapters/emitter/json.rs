use crate::domain::ports::ScenarioEmitter;
use crate::domain::synthesis::TestScenario;
use anyhow::{Context, Result};

/// Writes scenarios as a JSON array. Framework-neutral: renderers for concrete test
/// frameworks consume this output.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonScenarioEmitter {
    pub compact: bool,
}

impl ScenarioEmitter for JsonScenarioEmitter {
    fn emit(&self, scenarios: &[TestScenario], out: &mut dyn std::io::Write) -> Result<()> {
        if self.compact {
            serde_json::to_writer(&mut *out, scenarios)
        } else {
            serde_json::to_writer_pretty(&mut *out, scenarios)
        }
        .context("Failed to serialize scenarios")?;
        writeln!(out).context("Failed to write scenarios")?;
        Ok(())
    }
}
