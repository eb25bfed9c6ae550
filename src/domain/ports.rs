use crate::domain::synthesis::TestScenario;
use crate::domain::unit::UnitModel;
use anyhow::Result;

/// Unit model source port (implemented by Infrastructure)
pub trait UnitModelSource {
    fn load(&self) -> Result<UnitModel>;
}

/// Scenario output port. Renderers for concrete test frameworks plug in here.
pub trait ScenarioEmitter {
    fn emit(&self, scenarios: &[TestScenario], out: &mut dyn std::io::Write) -> Result<()>;
}
