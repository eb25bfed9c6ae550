use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::unit::CallSite;

/// Edge kind - classification of an interaction between two graph nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    DirectCall,  // Unit → Unit
    SharedState, // Reader(Unit) → Writer(Unit) of the same state symbol
    ExternalCall, // Unit → BoundaryNode
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::DirectCall => "direct_call",
            EdgeKind::SharedState => "shared_state",
            EdgeKind::ExternalCall => "external_call",
        }
    }
}

/// How the target of an edge was resolved.
///
/// Ordered from weakest to strongest so merged edges keep the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// One of several equally qualified candidates.
    Ambiguous,
    /// Unique unqualified-name match or unknown external module.
    Inferred,
    /// Exact qualified-name or signature-table match.
    Exact,
}

impl Confidence {
    pub fn score(&self) -> f64 {
        match self {
            Confidence::Exact => 1.0,
            Confidence::Inferred => 0.75,
            Confidence::Ambiguous => 0.25,
        }
    }
}

/// Deduplication key of an edge: (source, target, kind).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

impl EdgeKey {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }

    /// Graph element id used by scenarios.
    pub fn element_id(&self) -> String {
        format!("edge:{}->{}#{}", self.source, self.target, self.kind.as_str())
    }
}

/// Directed interaction between a calling unit and a unit or boundary node.
/// Multiple call sites for the same key are aggregated into `sites`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InteractionEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub sites: Vec<CallSite>,
    pub confidence: Confidence,
}

impl InteractionEdge {
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.source.clone(), self.target.clone(), self.kind)
    }

    /// Folds another occurrence of the same key into this edge.
    pub fn absorb(&mut self, other: InteractionEdge) {
        debug_assert_eq!(self.key(), other.key());
        self.sites.extend(other.sites);
        self.sites.sort();
        self.confidence = self.confidence.max(other.confidence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_aggregates_sites_and_keeps_best_confidence() {
        let mut a = InteractionEdge {
            source: "m.a".into(),
            target: "m.b".into(),
            kind: EdgeKind::DirectCall,
            sites: vec![CallSite::new("m.py", 9)],
            confidence: Confidence::Ambiguous,
        };
        let b = InteractionEdge {
            sites: vec![CallSite::new("m.py", 3)],
            confidence: Confidence::Exact,
            ..a.clone()
        };
        a.absorb(b);
        assert_eq!(a.sites, vec![CallSite::new("m.py", 3), CallSite::new("m.py", 9)]);
        assert_eq!(a.confidence, Confidence::Exact);
    }

    #[test]
    fn test_element_id_format() {
        let key = EdgeKey::new("m.a", "m.b", EdgeKind::SharedState);
        assert_eq!(key.element_id(), "edge:m.a->m.b#shared_state");
    }
}
