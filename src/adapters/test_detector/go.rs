use super::TestDetector;
use crate::domain::unit::Unit;

/// Go test code detector
///
/// Conventions:
/// - *_test.go files
pub struct GoTestDetector;

impl TestDetector for GoTestDetector {
    fn is_test_unit(&self, unit: &Unit) -> bool {
        // Go test files always end with _test.go
        unit.file_path.ends_with("_test.go")
    }

    fn language(&self) -> &str {
        "go"
    }

    fn extensions(&self) -> &[&str] {
        &["go"]
    }
}
