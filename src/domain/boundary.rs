//! External Boundary Detector.
//!
//! Classifies raw references that leave the analyzed codebase. Classification looks only
//! at the reference's static signature, so the same source always yields the same set of
//! boundary nodes regardless of traversal or worker scheduling order.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::diagnostics::AnalysisError;
use crate::domain::unit::RawReference;

/// Category of external system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryCategory {
    Network,
    Storage,
    Process,
    Unknown,
}

impl BoundaryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryCategory::Network => "network",
            BoundaryCategory::Storage => "storage",
            BoundaryCategory::Process => "process",
            BoundaryCategory::Unknown => "unknown",
        }
    }
}

/// Synthetic node standing in for an external system. Not a unit; only reachable
/// through `external_call` edges.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct BoundaryNode {
    pub id: String,
    pub category: BoundaryCategory,
    /// Signature pattern that triggered classification (external module root for
    /// `unknown`).
    pub pattern: String,
}

impl BoundaryNode {
    pub fn new(category: BoundaryCategory, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Self {
            id: format!("boundary:{}:{}", category.as_str(), pattern),
            category,
            pattern,
        }
    }
}

/// Patterns mapped to one category. Patterns are dotted names where `*` matches any
/// run of characters (`requests.*`, `*.execute`, `open`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SignatureRule {
    pub category: BoundaryCategory,
    pub patterns: Vec<String>,
}

/// Configurable boundary-signature table: category -> pattern list. Rules are tried in
/// order; the first matching pattern wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SignatureTable {
    pub rules: Vec<SignatureRule>,
}

impl SignatureTable {
    pub fn new(rules: Vec<SignatureRule>) -> Self {
        Self { rules }
    }

    pub fn with_rule(mut self, category: BoundaryCategory, patterns: &[&str]) -> Self {
        self.rules.push(SignatureRule {
            category,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    pub fn pattern_count(&self) -> usize {
        self.rules.iter().map(|r| r.patterns.len()).sum()
    }
}

/// Result of classifying one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryMatch {
    pub node: BoundaryNode,
    /// False for `unknown` classifications derived from an external module hint.
    pub from_table: bool,
}

struct CompiledPattern {
    category: BoundaryCategory,
    source: String,
    regex: Regex,
}

/// Compiled signature table.
pub struct BoundaryDetector {
    patterns: Vec<CompiledPattern>,
}

impl BoundaryDetector {
    pub fn from_table(table: &SignatureTable) -> Result<Self, AnalysisError> {
        let mut patterns = Vec::with_capacity(table.pattern_count());
        for rule in &table.rules {
            for pattern in &rule.patterns {
                let regex = compile_glob(pattern).map_err(|source| {
                    AnalysisError::InvalidSignaturePattern {
                        pattern: pattern.clone(),
                        source,
                    }
                })?;
                patterns.push(CompiledPattern {
                    category: rule.category,
                    source: pattern.clone(),
                    regex,
                });
            }
        }
        Ok(Self { patterns })
    }

    /// Table lookup against the reference's static signature.
    pub fn classify(&self, reference: &RawReference) -> Option<BoundaryMatch> {
        self.classify_signature(&reference.static_signature())
    }

    pub fn classify_signature(&self, signature: &str) -> Option<BoundaryMatch> {
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(signature))
            .map(|p| BoundaryMatch {
                node: BoundaryNode::new(p.category, p.source.clone()),
                from_table: true,
            })
    }

    /// `unknown` boundary keyed by the root of the external module the reference was
    /// imported from.
    pub fn classify_unknown(&self, external_module: &str) -> BoundaryMatch {
        let root = external_module
            .split('.')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(external_module);
        BoundaryMatch {
            node: BoundaryNode::new(BoundaryCategory::Unknown, root),
            from_table: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// `requests.*` -> `^requests\..*$`
fn compile_glob(pattern: &str) -> Result<Regex, regex::Error> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$"))
}
