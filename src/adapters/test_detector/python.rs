use super::{TestDetector, file_name, in_directory};
use crate::domain::unit::Unit;

/// Python test code detector
///
/// Conventions:
/// - test_*.py, *_test.py and conftest.py files
/// - tests/ and test/ directories
/// - test_* functions
/// - Test* classes
pub struct PythonTestDetector;

impl TestDetector for PythonTestDetector {
    fn is_test_unit(&self, unit: &Unit) -> bool {
        let path = unit.file_path.as_str();
        if in_directory(path, &["tests", "test"]) {
            return true;
        }

        let name = file_name(path);
        if name.starts_with("test_") || name.ends_with("_test.py") || name == "conftest.py" {
            return true;
        }

        // Dotted id: package.module.Class.method
        unit.id.split('.').any(|segment| {
            segment.starts_with("test_") || segment == "tests" || segment.starts_with("Test")
        })
    }

    fn language(&self) -> &str {
        "python"
    }

    fn extensions(&self) -> &[&str] {
        &["py"]
    }
}
