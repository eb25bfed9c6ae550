//! Error Propagation Analyzer.
//!
//! Each unit's total error set is its local set plus, for every outgoing `direct_call`
//! edge, the callee's total set after local suppression and wrapping. Call graphs may be
//! cyclic, so the sets are computed as a fixed point: every pass reads the complete
//! result of the previous pass, and the iteration stops when a pass changes nothing or
//! the iteration cap is reached.

use crate::domain::diagnostics::Diagnostic;
use crate::domain::edge::{EdgeKey, EdgeKind};
use crate::domain::graph::InteractionGraph;
use crate::domain::unit::{Unit, UnitId};
use petgraph::graph::NodeIndex;
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Where an error kind observed at a unit comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorOrigin {
    /// Raised by the unit's own logic.
    Local,
    /// Propagated unchanged from a callee.
    Propagated,
    /// Raised in place of a callee's error kind.
    Wrapped { from: String },
}

/// Evidence for a propagated error kind: the edge it arrived through and the origin
/// path down to the raising unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Witness {
    pub edge: EdgeKey,
    /// Kind as observed at the callee (differs from the entry kind when wrapped).
    pub source_kind: String,
    /// Unit ids from this unit down to the unit raising the error.
    pub path: Vec<UnitId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorEntry {
    pub origin: ErrorOrigin,
    /// One witness per contributing edge; empty for purely local kinds.
    pub witnesses: Vec<Witness>,
}

/// Per-unit record of which error kinds can surface when the unit is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorContract {
    pub unit: UnitId,
    pub local: BTreeSet<String>,
    /// Total error set: kind -> origin and witnesses.
    pub errors: BTreeMap<String, ErrorEntry>,
    /// Kinds that reached the unit from callees and were suppressed, with the edges they
    /// arrived through.
    pub suppressed: BTreeMap<String, Vec<EdgeKey>>,
}

impl ErrorContract {
    fn local_only(unit: &Unit) -> Self {
        Self {
            unit: unit.id.clone(),
            local: unit.raises.clone(),
            errors: unit
                .raises
                .iter()
                .map(|kind| {
                    (
                        kind.clone(),
                        ErrorEntry {
                            origin: ErrorOrigin::Local,
                            witnesses: Vec::new(),
                        },
                    )
                })
                .collect(),
            suppressed: BTreeMap::new(),
        }
    }

    pub fn total(&self) -> BTreeSet<&str> {
        self.errors.keys().map(String::as_str).collect()
    }

    /// Origin path for `kind`: the first witness path, or just this unit when local.
    fn origin_path(&self, kind: &str) -> Vec<UnitId> {
        self.errors
            .get(kind)
            .and_then(|e| e.witnesses.first())
            .map(|w| w.path.clone())
            .unwrap_or_else(|| vec![self.unit.clone()])
    }
}

/// Result of the fixed-point computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorAnalysis {
    pub contracts: BTreeMap<UnitId, ErrorContract>,
    /// Passes computed, including the final pass that confirmed convergence.
    pub passes: usize,
    pub converged: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl ErrorAnalysis {
    pub fn contract(&self, unit: &str) -> Option<&ErrorContract> {
        self.contracts.get(unit)
    }
}

pub struct ErrorPropagationAnalyzer {
    max_iterations: usize,
}

impl Default for ErrorPropagationAnalyzer {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ErrorPropagationAnalyzer {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn analyze(&self, graph: &InteractionGraph) -> ErrorAnalysis {
        let units: Vec<(NodeIndex, &Unit)> = graph
            .id_to_node
            .values()
            .filter_map(|&idx| graph.node(idx).as_unit().map(|u| (idx, u)))
            .collect();

        let mut current: BTreeMap<UnitId, ErrorContract> = units
            .iter()
            .map(|(_, u)| (u.id.clone(), ErrorContract::local_only(u)))
            .collect();

        let mut passes = 0;
        let mut converged = false;
        while passes < self.max_iterations {
            passes += 1;
            let snapshot = &current;
            let next: BTreeMap<UnitId, ErrorContract> = units
                .par_iter()
                .map(|&(idx, unit)| (unit.id.clone(), evaluate(graph, idx, unit, snapshot)))
                .collect::<Vec<_>>()
                .into_iter()
                .collect();
            if next == current {
                converged = true;
                break;
            }
            current = next;
        }

        let mut diagnostics = Vec::new();
        if !converged {
            warn!(
                iterations = passes,
                "Error propagation hit its iteration cap; using the last completed pass"
            );
            diagnostics.push(Diagnostic::FixedPointNotConverged { iterations: passes });
        }

        info!(
            units = current.len(),
            passes,
            converged,
            "Error contracts computed"
        );

        ErrorAnalysis {
            contracts: current,
            passes,
            converged,
            diagnostics,
        }
    }
}

/// One unit, one pass: local kinds plus callee kinds from the previous snapshot.
fn evaluate(
    graph: &InteractionGraph,
    idx: NodeIndex,
    unit: &Unit,
    snapshot: &BTreeMap<UnitId, ErrorContract>,
) -> ErrorContract {
    let mut contract = ErrorContract::local_only(unit);

    for (_, edge) in graph.outgoing(idx) {
        if edge.kind != EdgeKind::DirectCall {
            continue;
        }
        let Some(callee) = snapshot.get(&edge.target) else {
            continue;
        };
        let key = edge.key();

        for kind in callee.errors.keys() {
            if unit.suppresses.contains(kind) {
                let edges = contract.suppressed.entry(kind.clone()).or_default();
                if !edges.contains(&key) {
                    edges.push(key.clone());
                }
                continue;
            }

            let callee_path = callee.origin_path(kind);
            // A witness through a path that already visits this unit is circular.
            if callee_path.contains(&unit.id) {
                continue;
            }

            let (surfaced, origin) = match unit.wraps.get(kind) {
                Some(wrapped) => (
                    wrapped.clone(),
                    ErrorOrigin::Wrapped { from: kind.clone() },
                ),
                None => (kind.clone(), ErrorOrigin::Propagated),
            };

            let entry = contract
                .errors
                .entry(surfaced)
                .or_insert_with(|| ErrorEntry {
                    origin,
                    witnesses: Vec::new(),
                });
            if entry.witnesses.iter().any(|w| w.edge == key) {
                continue;
            }
            let mut path = Vec::with_capacity(callee_path.len() + 1);
            path.push(unit.id.clone());
            path.extend(callee_path);
            entry.witnesses.push(Witness {
                edge: key.clone(),
                source_kind: kind.clone(),
                path,
            });
        }
    }
    contract
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::edge::{Confidence, InteractionEdge};
    use crate::domain::graph::GraphNode;
    use crate::domain::unit::{CallSite, UnitKind};

    fn graph(units: Vec<Unit>, calls: &[(&str, &str)]) -> InteractionGraph {
        let mut g = InteractionGraph::new();
        for u in units {
            g.add_node(GraphNode::Unit(u));
        }
        for (a, b) in calls {
            g.add_edge(InteractionEdge {
                source: a.to_string(),
                target: b.to_string(),
                kind: EdgeKind::DirectCall,
                sites: vec![CallSite::new("m.py", 1)],
                confidence: Confidence::Exact,
            });
        }
        g
    }

    fn f(id: &str) -> Unit {
        Unit::new(id, UnitKind::Function)
    }

    #[test]
    fn test_chain_propagates_with_origin_path() {
        let g = graph(
            vec![f("m.a"), f("m.b"), f("m.c").raising("IOError")],
            &[("m.a", "m.b"), ("m.b", "m.c")],
        );
        let analysis = ErrorPropagationAnalyzer::default().analyze(&g);
        assert!(analysis.converged);
        assert_eq!(analysis.passes, 3);

        let a = analysis.contract("m.a").unwrap();
        let entry = &a.errors["IOError"];
        assert_eq!(entry.origin, ErrorOrigin::Propagated);
        assert_eq!(entry.witnesses[0].path, vec!["m.a", "m.b", "m.c"]);
        assert_eq!(
            entry.witnesses[0].edge,
            EdgeKey::new("m.a", "m.b", EdgeKind::DirectCall)
        );
    }

    #[test]
    fn test_suppression_stops_propagation() {
        let g = graph(
            vec![
                f("m.a"),
                f("m.b").suppressing("NotFound"),
                f("m.c").raising("NotFound"),
            ],
            &[("m.a", "m.b"), ("m.b", "m.c")],
        );
        let analysis = ErrorPropagationAnalyzer::default().analyze(&g);
        let b = analysis.contract("m.b").unwrap();
        assert!(b.errors.is_empty());
        assert_eq!(
            b.suppressed["NotFound"],
            vec![EdgeKey::new("m.b", "m.c", EdgeKind::DirectCall)]
        );
        assert!(analysis.contract("m.a").unwrap().errors.is_empty());
    }

    #[test]
    fn test_wrapping_renames_kind() {
        let g = graph(
            vec![
                f("m.api").wrapping("KeyError", "HttpNotFound"),
                f("m.repo").raising("KeyError"),
            ],
            &[("m.api", "m.repo")],
        );
        let analysis = ErrorPropagationAnalyzer::default().analyze(&g);
        let api = analysis.contract("m.api").unwrap();
        assert!(!api.errors.contains_key("KeyError"));
        let entry = &api.errors["HttpNotFound"];
        assert_eq!(
            entry.origin,
            ErrorOrigin::Wrapped {
                from: "KeyError".into()
            }
        );
        assert_eq!(entry.witnesses[0].source_kind, "KeyError");
    }

    #[test]
    fn test_cycle_converges() {
        let g = graph(
            vec![f("m.a").raising("A"), f("m.b").raising("B")],
            &[("m.a", "m.b"), ("m.b", "m.a")],
        );
        let analysis = ErrorPropagationAnalyzer::default().analyze(&g);
        assert!(analysis.converged);
        assert!(analysis.diagnostics.is_empty());
        assert_eq!(
            analysis.contract("m.a").unwrap().total(),
            BTreeSet::from(["A", "B"])
        );
        assert_eq!(
            analysis.contract("m.b").unwrap().total(),
            BTreeSet::from(["A", "B"])
        );
    }

    #[test]
    fn test_iteration_cap_reports_diagnostic() {
        let g = graph(
            vec![f("m.a"), f("m.b"), f("m.c"), f("m.d").raising("E")],
            &[("m.a", "m.b"), ("m.b", "m.c"), ("m.c", "m.d")],
        );
        let analysis = ErrorPropagationAnalyzer::new(2).analyze(&g);
        assert!(!analysis.converged);
        assert_eq!(
            analysis.diagnostics,
            vec![Diagnostic::FixedPointNotConverged { iterations: 2 }]
        );
        // Last completed pass: c and b know about E, a does not yet.
        assert!(analysis.contract("m.b").unwrap().errors.contains_key("E"));
        assert!(analysis.contract("m.a").unwrap().errors.is_empty());
    }

    #[test]
    fn test_diamond_keeps_one_witness_per_edge() {
        let g = graph(
            vec![f("m.top"), f("m.left"), f("m.right"), f("m.leaf").raising("E")],
            &[
                ("m.top", "m.left"),
                ("m.top", "m.right"),
                ("m.left", "m.leaf"),
                ("m.right", "m.leaf"),
            ],
        );
        let analysis = ErrorPropagationAnalyzer::default().analyze(&g);
        let top = analysis.contract("m.top").unwrap();
        let targets: Vec<&str> = top.errors["E"]
            .witnesses
            .iter()
            .map(|w| w.edge.target.as_str())
            .collect();
        assert_eq!(targets, vec!["m.left", "m.right"]);
    }
}
