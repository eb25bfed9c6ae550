//! Workflow Extractor.
//!
//! Enumerating every simple path is exponential in graph branching, so extraction is a
//! bounded depth-first traversal from each entry unit that keeps only the highest
//! scoring paths. The result is a heuristic coverage sample, not an exhaustive set of
//! end-to-end scenarios.

use crate::domain::boundary::BoundaryCategory;
use crate::domain::diagnostics::Diagnostic;
use crate::domain::edge::EdgeKey;
use crate::domain::graph::{GraphNode, InteractionGraph};
use petgraph::graph::NodeIndex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Why a retained path stopped where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Reached a boundary node.
    Boundary,
    /// Reached a unit without outgoing edges.
    TerminalUnit,
    /// Every successor was already on the path.
    CycleCut,
    /// Hit the maximum path length.
    LengthLimit,
}

/// Interestingness, compared lexicographically in field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct InterestingnessScore {
    pub terminates_at_boundary: bool,
    pub distinct_units: usize,
    pub distinct_boundary_categories: usize,
}

/// Simple path from an entry unit to a terminal unit or boundary node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Workflow {
    pub entry: String,
    /// Node ids in path order (entry first).
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeKey>,
    pub length: usize,
    pub score: InterestingnessScore,
    pub termination: Termination,
}

impl Workflow {
    /// Stable identifier: node ids joined by `->`.
    pub fn id(&self) -> String {
        self.nodes.join("->")
    }

    pub fn terminal(&self) -> &str {
        self.nodes.last().map(String::as_str).unwrap_or(&self.entry)
    }
}

/// Retained workflows plus traversal diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowSet {
    pub workflows: Vec<Workflow>,
    pub diagnostics: Vec<Diagnostic>,
}

impl WorkflowSet {
    pub fn for_entry<'a>(&'a self, entry: &'a str) -> impl Iterator<Item = &'a Workflow> + 'a {
        self.workflows.iter().filter(move |w| w.entry == entry)
    }
}

/// Traversal limits.
#[derive(Debug, Clone)]
pub struct WorkflowLimits {
    /// Maximum number of edges on a path.
    pub max_path_length: usize,
    /// Workflows retained per entry unit.
    pub per_entry_cap: usize,
    /// Node expansions allowed per entry before traversal stops.
    pub max_expansions_per_entry: usize,
    /// Optional wall-clock bound per entry.
    pub timeout: Option<Duration>,
}

impl Default for WorkflowLimits {
    fn default() -> Self {
        Self {
            max_path_length: 8,
            per_entry_cap: 5,
            max_expansions_per_entry: 10_000,
            timeout: None,
        }
    }
}

pub struct WorkflowExtractor {
    limits: WorkflowLimits,
}

struct Traversal<'g> {
    graph: &'g InteractionGraph,
    limits: &'g WorkflowLimits,
    started: Instant,
    expansions: usize,
    exhausted: bool,
    path_nodes: Vec<NodeIndex>,
    path_edges: Vec<EdgeKey>,
    on_path: BTreeSet<NodeIndex>,
    found: Vec<Workflow>,
}

impl WorkflowExtractor {
    pub fn new(limits: WorkflowLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &WorkflowLimits {
        &self.limits
    }

    pub fn extract(&self, graph: &InteractionGraph) -> WorkflowSet {
        let mut set = WorkflowSet::default();

        for entry in graph.entry_points() {
            let entry_id = graph.node(entry).id().to_string();
            let mut traversal = Traversal {
                graph,
                limits: &self.limits,
                started: Instant::now(),
                expansions: 0,
                exhausted: false,
                path_nodes: vec![entry],
                path_edges: Vec::new(),
                on_path: BTreeSet::from([entry]),
                found: Vec::new(),
            };
            traversal.visit(entry);

            if traversal.exhausted {
                set.diagnostics.push(Diagnostic::TraversalBudgetExhausted {
                    entry: entry_id.clone(),
                    expansions: traversal.expansions,
                });
            }

            let mut found = traversal.found;
            // Stable: equal scores keep discovery order.
            found.sort_by(|a, b| b.score.cmp(&a.score));
            found.truncate(self.limits.per_entry_cap);
            debug!(entry = %entry_id, retained = found.len(), "workflows selected");
            set.workflows.extend(found);
        }

        info!(
            workflows = set.workflows.len(),
            diagnostics = set.diagnostics.len(),
            "Workflows extracted"
        );
        set
    }
}

impl Traversal<'_> {
    fn out_of_budget(&mut self) -> bool {
        if self.exhausted {
            return true;
        }
        let timed_out = self
            .limits
            .timeout
            .is_some_and(|limit| self.started.elapsed() >= limit);
        if self.expansions >= self.limits.max_expansions_per_entry || timed_out {
            self.exhausted = true;
        }
        self.exhausted
    }

    fn visit(&mut self, current: NodeIndex) {
        if self.out_of_budget() {
            return;
        }
        self.expansions += 1;
        let graph = self.graph;

        if matches!(graph.node(current), GraphNode::Boundary(_)) {
            self.record(Termination::Boundary);
            return;
        }

        let outgoing = graph.outgoing(current);
        if outgoing.is_empty() {
            // The entry alone is not a workflow.
            if !self.path_edges.is_empty() {
                self.record(Termination::TerminalUnit);
            }
            return;
        }
        if self.path_edges.len() >= self.limits.max_path_length {
            self.record(Termination::LengthLimit);
            return;
        }

        let mut extended = false;
        for (next, edge) in outgoing {
            if self.on_path.contains(&next) {
                continue;
            }
            extended = true;
            self.path_nodes.push(next);
            self.path_edges.push(edge.key());
            self.on_path.insert(next);

            self.visit(next);

            self.on_path.remove(&next);
            self.path_edges.pop();
            self.path_nodes.pop();
            if self.exhausted {
                return;
            }
        }
        if !extended && !self.path_edges.is_empty() {
            self.record(Termination::CycleCut);
        }
    }

    fn record(&mut self, termination: Termination) {
        let graph = self.graph;
        let categories: BTreeSet<BoundaryCategory> = self
            .path_nodes
            .iter()
            .flat_map(|&idx| match graph.node(idx) {
                GraphNode::Boundary(b) => BTreeSet::from([b.category]),
                GraphNode::Unit(_) => graph.boundary_categories_of(idx),
            })
            .collect();
        let distinct_units = self
            .path_nodes
            .iter()
            .filter(|&&idx| graph.node(idx).as_unit().is_some())
            .count();

        let nodes: Vec<String> = self
            .path_nodes
            .iter()
            .map(|&idx| graph.node(idx).id().to_string())
            .collect();
        self.found.push(Workflow {
            entry: nodes[0].clone(),
            length: self.path_edges.len(),
            edges: self.path_edges.clone(),
            score: InterestingnessScore {
                terminates_at_boundary: termination == Termination::Boundary,
                distinct_units,
                distinct_boundary_categories: categories.len(),
            },
            termination,
            nodes,
        });
    }
}
