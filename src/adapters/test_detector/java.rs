use super::{TestDetector, file_name};
use crate::domain::unit::Unit;

/// Java test code detector
///
/// Conventions:
/// - src/test/ source roots
/// - *Test.java, *Tests.java and *IT.java classes
pub struct JavaTestDetector;

impl TestDetector for JavaTestDetector {
    fn is_test_unit(&self, unit: &Unit) -> bool {
        let path = unit.file_path.as_str();
        if path.contains("src/test/") {
            return true;
        }

        let stem = file_name(path).trim_end_matches(".java");
        if !stem.is_empty() && is_test_class_name(stem) {
            return true;
        }

        unit.id.split('.').any(is_test_class_name)
    }

    fn language(&self) -> &str {
        "java"
    }

    fn extensions(&self) -> &[&str] {
        &["java"]
    }
}

fn is_test_class_name(name: &str) -> bool {
    let integration = name
        .strip_suffix("IT")
        .is_some_and(|stem| stem.ends_with(char::is_lowercase));
    integration || name.len() > 4 && (name.ends_with("Test") || name.ends_with("Tests"))
}
