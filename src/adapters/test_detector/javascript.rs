use super::{TestDetector, file_name, in_directory};
use crate::domain::unit::Unit;

/// JavaScript/TypeScript test code detector
///
/// Conventions:
/// - *.test.{js,ts,jsx,tsx} and *.spec.{js,ts,jsx,tsx} files
/// - __tests__/, test/ and tests/ directories
pub struct JavaScriptTestDetector;

impl TestDetector for JavaScriptTestDetector {
    fn is_test_unit(&self, unit: &Unit) -> bool {
        let path = unit.file_path.as_str();
        if in_directory(path, &["__tests__", "__mocks__", "test", "tests"]) {
            return true;
        }

        let name = file_name(path);
        let stem = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);
        stem.ends_with(".test") || stem.ends_with(".spec")
    }

    fn language(&self) -> &str {
        "javascript"
    }

    fn extensions(&self) -> &[&str] {
        &["js", "jsx", "ts", "tsx", "mjs", "cjs"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::unit::UnitKind;

    fn unit(file: &str) -> Unit {
        Unit::new("app.cart.total", UnitKind::Function).with_file(file, 1)
    }

    #[test]
    fn test_detects_js_tests() {
        let detector = JavaScriptTestDetector;
        assert!(detector.is_test_unit(&unit("src/cart.test.ts")));
        assert!(detector.is_test_unit(&unit("src/cart.spec.jsx")));
        assert!(detector.is_test_unit(&unit("src/__tests__/cart.js")));
        assert!(!detector.is_test_unit(&unit("src/cart.ts")));
        assert!(!detector.is_test_unit(&unit("src/contest.ts")));
    }
}
