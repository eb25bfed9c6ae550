use super::{TestDetector, file_name, in_directory};
use crate::domain::unit::Unit;

/// Rust test code detector
///
/// Conventions:
/// - tests/ directories (integration tests)
/// - *_test.rs files
/// - `tests` modules (`#[cfg(test)] mod tests`)
pub struct RustTestDetector;

impl TestDetector for RustTestDetector {
    fn is_test_unit(&self, unit: &Unit) -> bool {
        let path = unit.file_path.as_str();
        if in_directory(path, &["tests"]) {
            return true;
        }

        if file_name(path).ends_with("_test.rs") {
            return true;
        }

        // `#[test]` attributes are not part of the unit model; the module name is.
        unit.id
            .split(['.', ':'])
            .any(|segment| segment == "tests" || segment == "test")
    }

    fn language(&self) -> &str {
        "rust"
    }

    fn extensions(&self) -> &[&str] {
        &["rs"]
    }
}
