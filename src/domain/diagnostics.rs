//! Error taxonomy.
//!
//! Non-fatal conditions are [`Diagnostic`] values accumulated by the stage that detects
//! them and returned next to its output. Only input contract violations are fatal and
//! surface as [`AnalysisError`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::unit::{CallSite, UnitId};

/// Non-fatal analysis finding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Reference dropped: no unit, boundary signature or external module matched.
    UnresolvedReference {
        source: UnitId,
        callee: String,
        site: CallSite,
    },
    /// Reference matched several units with equal qualification; low-confidence edges
    /// were added to every candidate.
    AmbiguousReference {
        source: UnitId,
        callee: String,
        site: CallSite,
        candidates: Vec<UnitId>,
    },
    /// Error propagation hit its iteration cap; the last completed pass is reported.
    FixedPointNotConverged { iterations: usize },
    /// Workflow traversal from `entry` stopped on its expansion budget or timeout;
    /// retained workflows for it may be incomplete.
    TraversalBudgetExhausted { entry: UnitId, expansions: usize },
}

impl Diagnostic {
    pub fn code(&self) -> &'static str {
        match self {
            Diagnostic::UnresolvedReference { .. } => "unresolved_reference",
            Diagnostic::AmbiguousReference { .. } => "ambiguous_reference",
            Diagnostic::FixedPointNotConverged { .. } => "fixed_point_not_converged",
            Diagnostic::TraversalBudgetExhausted { .. } => "traversal_budget_exhausted",
        }
    }

    /// Whether the finding weakens completeness claims of the whole run rather than
    /// of one reference.
    pub fn affects_run(&self) -> bool {
        matches!(
            self,
            Diagnostic::FixedPointNotConverged { .. } | Diagnostic::TraversalBudgetExhausted { .. }
        )
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::UnresolvedReference {
                source,
                callee,
                site,
            } => write!(f, "unresolved reference `{callee}` in {source} at {site}"),
            Diagnostic::AmbiguousReference {
                source,
                callee,
                site,
                candidates,
            } => write!(
                f,
                "ambiguous reference `{callee}` in {source} at {site}: {}",
                candidates.join(", ")
            ),
            Diagnostic::FixedPointNotConverged { iterations } => write!(
                f,
                "error propagation did not converge after {iterations} passes (possible cyclic error amplification)"
            ),
            Diagnostic::TraversalBudgetExhausted { entry, expansions } => write!(
                f,
                "workflow traversal from {entry} stopped after {expansions} expansions"
            ),
        }
    }
}

/// Fatal analysis error.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The unit model violates its input contract.
    #[error("malformed unit model: {reason}")]
    MalformedUnitModel { reason: String },

    /// A boundary signature pattern could not be compiled.
    #[error("invalid boundary signature pattern `{pattern}`: {source}")]
    InvalidSignaturePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Configuration values out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnalysisError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        AnalysisError::MalformedUnitModel {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_serializes_with_kind_tag() {
        let d = Diagnostic::FixedPointNotConverged { iterations: 3 };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "fixed_point_not_converged");
        assert_eq!(json["iterations"], 3);
        assert!(d.affects_run());
    }

    #[test]
    fn test_display_mentions_candidates() {
        let d = Diagnostic::AmbiguousReference {
            source: "a.f".into(),
            callee: "save".into(),
            site: CallSite::new("a.py", 4),
            candidates: vec!["a.X.save".into(), "a.Y.save".into()],
        };
        let text = d.to_string();
        assert!(text.contains("a.X.save, a.Y.save"));
        assert!(text.contains("a.py:4"));
        assert_eq!(d.code(), "ambiguous_reference");
    }

    #[test]
    fn test_malformed_error_message() {
        let e = AnalysisError::malformed("unknown unit `x`");
        assert_eq!(e.to_string(), "malformed unit model: unknown unit `x`");
    }
}
