//! Test code detection adapters
//!
//! Existing test code is not a synthesis target. Each language has its own conventions
//! for where tests live and how they are named; a detector looks at a unit's file path
//! and dotted id segments.

mod go;
mod java;
mod javascript;
mod python;
mod rust;

pub use go::GoTestDetector;
pub use java::JavaTestDetector;
pub use javascript::JavaScriptTestDetector;
pub use python::PythonTestDetector;
pub use rust::RustTestDetector;

use crate::domain::unit::Unit;

/// Trait for detecting test code based on language conventions
pub trait TestDetector: Send + Sync {
    /// Whether the unit is (part of) existing test code.
    fn is_test_unit(&self, unit: &Unit) -> bool;

    /// Get the language this detector is for
    fn language(&self) -> &str;

    /// File extensions this detector owns.
    fn extensions(&self) -> &[&str];
}

/// Multi-language test detector that routes to language-specific detectors
pub struct UniversalTestDetector {
    detectors: Vec<Box<dyn TestDetector>>,
}

impl UniversalTestDetector {
    pub fn new() -> Self {
        Self {
            detectors: vec![
                Box::new(PythonTestDetector),
                Box::new(RustTestDetector),
                Box::new(JavaScriptTestDetector),
                Box::new(JavaTestDetector),
                Box::new(GoTestDetector),
            ],
        }
    }

    pub fn is_test_unit(&self, unit: &Unit) -> bool {
        if let Some(detector) = self.detect_language(&unit.file_path) {
            return detector.is_test_unit(unit);
        }

        // Unknown or missing extension: any convention counts
        self.detectors.iter().any(|d| d.is_test_unit(unit))
    }

    fn detect_language(&self, file_path: &str) -> Option<&dyn TestDetector> {
        let ext = file_path.rsplit_once('.').map(|(_, ext)| ext)?;
        self.detectors
            .iter()
            .find(|d| d.extensions().contains(&ext))
            .map(|d| d.as_ref())
    }
}

impl Default for UniversalTestDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn file_name(file_path: &str) -> &str {
    file_path.rsplit('/').next().unwrap_or(file_path)
}

/// True when any directory component of `file_path` is one of `dirs`.
fn in_directory(file_path: &str, dirs: &[&str]) -> bool {
    let mut parts: Vec<&str> = file_path.split('/').collect();
    parts.pop();
    parts.iter().any(|p| dirs.contains(p))
}
