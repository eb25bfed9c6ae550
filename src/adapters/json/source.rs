use crate::domain::ports::UnitModelSource;
use crate::domain::unit::{UnitModel, UnitModelDocument};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Unit model source reading the JSON document written by the parsing front end.
pub struct JsonUnitModelSource {
    pub path: PathBuf,
}

impl JsonUnitModelSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl UnitModelSource for JsonUnitModelSource {
    fn load(&self) -> Result<UnitModel> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read unit model: {}", self.path.display()))?;
        parse_unit_model(&content)
            .with_context(|| format!("Invalid unit model: {}", self.path.display()))
    }
}

/// Parses a unit model document from JSON text.
pub fn parse_unit_model(json: &str) -> Result<UnitModel> {
    let document: UnitModelDocument =
        serde_json::from_str(json).context("Failed to parse unit model JSON")?;
    Ok(UnitModel::from_document(document)?)
}
