use crate::adapters::signatures::builtin_signatures;
use crate::adapters::test_detector::UniversalTestDetector;
use crate::domain::boundary::{BoundaryDetector, SignatureTable};
use crate::domain::builder::GraphBuilder;
use crate::domain::diagnostics::AnalysisError;
use crate::domain::pipeline::Pipeline;
use crate::domain::propagation::ErrorPropagationAnalyzer;
use crate::domain::synthesis::TestSynthesisEngine;
use crate::domain::unit::UnitModel;
use crate::domain::workflow::{WorkflowExtractor, WorkflowLimits};
use anyhow::{Context, Result};
use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Tunables of one analysis run. Every field has a default; a config file only needs
/// the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum number of edges on a workflow path.
    pub max_path_length: usize,
    /// Workflows retained per entry unit.
    pub per_entry_cap: usize,
    /// Node expansions allowed per entry unit.
    pub max_expansions_per_entry: usize,
    /// Optional wall-clock bound per entry unit. Runs using it may not be reproducible.
    pub traversal_timeout_ms: Option<u64>,
    /// Error propagation iteration cap.
    pub max_fixed_point_iterations: usize,
    /// Minimum edge confidence score for `class_interaction` scenarios.
    pub confidence_threshold: f64,
    /// Keep units recognised as existing test code.
    pub include_tests: bool,
    /// Boundary signature table.
    pub signatures: SignatureTable,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let limits = WorkflowLimits::default();
        Self {
            max_path_length: limits.max_path_length,
            per_entry_cap: limits.per_entry_cap,
            max_expansions_per_entry: limits.max_expansions_per_entry,
            traversal_timeout_ms: None,
            max_fixed_point_iterations: 64,
            confidence_threshold: 0.5,
            include_tests: false,
            signatures: builtin_signatures(),
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let positive = [
            ("max_path_length", self.max_path_length),
            ("per_entry_cap", self.per_entry_cap),
            ("max_expansions_per_entry", self.max_expansions_per_entry),
            ("max_fixed_point_iterations", self.max_fixed_point_iterations),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "{name} must be greater than zero"
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AnalysisError::InvalidConfig(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.traversal_timeout_ms == Some(0) {
            return Err(AnalysisError::InvalidConfig(
                "traversal_timeout_ms must be greater than zero when set".into(),
            ));
        }
        Ok(())
    }

    pub fn workflow_limits(&self) -> WorkflowLimits {
        WorkflowLimits {
            max_path_length: self.max_path_length,
            per_entry_cap: self.per_entry_cap,
            max_expansions_per_entry: self.max_expansions_per_entry,
            timeout: self.traversal_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Wires the stages for this configuration.
    pub fn pipeline(&self) -> Result<Pipeline, AnalysisError> {
        self.validate()?;
        let detector = BoundaryDetector::from_table(&self.signatures)?;
        Ok(Pipeline::new(
            GraphBuilder::new(detector),
            WorkflowExtractor::new(self.workflow_limits()),
            ErrorPropagationAnalyzer::new(self.max_fixed_point_iterations),
            TestSynthesisEngine::new(self.confidence_threshold),
        ))
    }

    /// Applies test-code filtering unless `include_tests` is set.
    pub fn prepare(&self, model: UnitModel) -> UnitModel {
        if self.include_tests {
            return model;
        }
        let detector = UniversalTestDetector::new();
        let filtered = model.without_units(|u| detector.is_test_unit(u));
        let removed = model.len() - filtered.len();
        if removed > 0 {
            info!(removed, "Excluded existing test code from analysis");
        }
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::unit::{Unit, UnitKind};

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"max_path_length": 3, "include_tests": true}"#).unwrap();
        assert_eq!(config.max_path_length, 3);
        assert!(config.include_tests);
        assert_eq!(config.per_entry_cap, 5);
        assert_eq!(config.signatures, builtin_signatures());
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        let zero_cap = AnalysisConfig {
            per_entry_cap: 0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            zero_cap.validate(),
            Err(AnalysisError::InvalidConfig(msg)) if msg.contains("per_entry_cap")
        ));

        let threshold = AnalysisConfig {
            confidence_threshold: 1.5,
            ..AnalysisConfig::default()
        };
        assert!(threshold.validate().is_err());
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_pipeline_rejects_invalid_config() {
        let config = AnalysisConfig {
            max_fixed_point_iterations: 0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.pipeline(),
            Err(AnalysisError::InvalidConfig(_))
        ));
        assert!(AnalysisConfig::default().pipeline().is_ok());
    }

    #[test]
    fn test_prepare_excludes_test_units() {
        let mut model = UnitModel::new();
        model
            .insert_unit(Unit::new("app.run", UnitKind::Function).with_file("app/run.py", 1))
            .unwrap();
        model
            .insert_unit(
                Unit::new("tests.test_run", UnitKind::Function).with_file("tests/test_run.py", 1),
            )
            .unwrap();

        let config = AnalysisConfig::default();
        assert_eq!(config.prepare(model.clone()).len(), 1);

        let keep = AnalysisConfig {
            include_tests: true,
            ..AnalysisConfig::default()
        };
        assert_eq!(keep.prepare(model).len(), 2);
    }
}
