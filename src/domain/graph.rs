use crate::domain::boundary::{BoundaryCategory, BoundaryNode};
use crate::domain::edge::{EdgeKey, EdgeKind, InteractionEdge};
use crate::domain::unit::Unit;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Node of the interaction graph: an analyzed unit or a synthetic boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphNode {
    Unit(Unit),
    Boundary(BoundaryNode),
}

impl GraphNode {
    pub fn id(&self) -> &str {
        match self {
            GraphNode::Unit(u) => &u.id,
            GraphNode::Boundary(b) => &b.id,
        }
    }

    pub fn as_unit(&self) -> Option<&Unit> {
        match self {
            GraphNode::Unit(u) => Some(u),
            GraphNode::Boundary(_) => None,
        }
    }

    pub fn as_boundary(&self) -> Option<&BoundaryNode> {
        match self {
            GraphNode::Boundary(b) => Some(b),
            GraphNode::Unit(_) => None,
        }
    }

    /// Graph element id used by scenarios.
    pub fn element_id(&self) -> String {
        match self {
            GraphNode::Unit(u) => format!("unit:{}", u.id),
            GraphNode::Boundary(b) => b.id.clone(),
        }
    }
}

/// Interaction Graph - the core data structure
///
/// Built once per analysis run by the graph builder; every later stage borrows it
/// read-only.
#[derive(Debug, Default)]
pub struct InteractionGraph {
    /// The directed graph of units, boundaries and interactions
    pub graph: DiGraph<GraphNode, InteractionEdge>,

    /// Mapping from unit/boundary id to node index
    pub id_to_node: BTreeMap<String, NodeIndex>,
}

impl InteractionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(&idx) = self.id_to_node.get(node.id()) {
            return idx;
        }
        let id = node.id().to_string();
        let idx = self.graph.add_node(node);
        self.id_to_node.insert(id, idx);
        idx
    }

    /// Adds an edge between two existing nodes, merging with an existing edge of the
    /// same (source, target, kind). Returns false when an endpoint is missing.
    pub fn add_edge(&mut self, edge: InteractionEdge) -> bool {
        let (Some(source), Some(target)) = (
            self.get_node_by_id(&edge.source),
            self.get_node_by_id(&edge.target),
        ) else {
            return false;
        };
        let existing = self
            .graph
            .edges_connecting(source, target)
            .find(|e| e.weight().kind == edge.kind)
            .map(|e| e.id());
        match existing {
            Some(edge_idx) => self.graph[edge_idx].absorb(edge),
            None => {
                self.graph.add_edge(source, target, edge);
            }
        }
        true
    }

    pub fn get_node_by_id(&self, id: &str) -> Option<NodeIndex> {
        self.id_to_node.get(id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.get_node_by_id(id).and_then(|idx| self.node(idx).as_unit())
    }

    pub fn boundary(&self, id: &str) -> Option<&BoundaryNode> {
        self.get_node_by_id(id)
            .and_then(|idx| self.node(idx).as_boundary())
    }

    /// Units ordered by id.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.id_to_node
            .values()
            .filter_map(|&idx| self.graph[idx].as_unit())
    }

    /// Boundary nodes ordered by id.
    pub fn boundaries(&self) -> impl Iterator<Item = &BoundaryNode> {
        self.id_to_node
            .values()
            .filter_map(|&idx| self.graph[idx].as_boundary())
    }

    /// All edges ordered by (source, target, kind).
    pub fn edges(&self) -> Vec<&InteractionEdge> {
        let mut edges: Vec<&InteractionEdge> = self.graph.edge_weights().collect();
        edges.sort_by_key(|e| e.key());
        edges
    }

    pub fn edge(&self, key: &EdgeKey) -> Option<&InteractionEdge> {
        let source = self.get_node_by_id(&key.source)?;
        let target = self.get_node_by_id(&key.target)?;
        self.graph
            .edges_connecting(source, target)
            .map(|e| e.weight())
            .find(|e| e.kind == key.kind)
    }

    /// Outgoing edges ordered by (target id, kind) for deterministic traversal.
    pub fn outgoing(&self, idx: NodeIndex) -> Vec<(NodeIndex, &InteractionEdge)> {
        let mut out: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect();
        out.sort_by(|(_, a), (_, b)| (&a.target, a.kind).cmp(&(&b.target, b.kind)));
        out
    }

    /// Incoming edges ordered by (source id, kind).
    pub fn incoming(&self, idx: NodeIndex) -> Vec<(NodeIndex, &InteractionEdge)> {
        let mut inc: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.source(), e.weight()))
            .collect();
        inc.sort_by(|(_, a), (_, b)| (&a.source, a.kind).cmp(&(&b.source, b.kind)));
        inc
    }

    /// Entry units: explicitly marked, or without incoming edges and with at least one
    /// outgoing edge. Ordered by id.
    pub fn entry_points(&self) -> Vec<NodeIndex> {
        self.id_to_node
            .values()
            .copied()
            .filter(|&idx| match self.node(idx) {
                GraphNode::Unit(u) => {
                    u.is_entry_point
                        || (self
                            .graph
                            .edges_directed(idx, Direction::Incoming)
                            .next()
                            .is_none()
                            && self
                                .graph
                                .edges_directed(idx, Direction::Outgoing)
                                .next()
                                .is_some())
                }
                GraphNode::Boundary(_) => false,
            })
            .collect()
    }

    /// Categories of boundaries called directly by `idx`.
    pub fn boundary_categories_of(&self, idx: NodeIndex) -> BTreeSet<BoundaryCategory> {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| e.weight().kind == EdgeKind::ExternalCall)
            .filter_map(|e| self.node(e.target()).as_boundary())
            .map(|b| b.category)
            .collect()
    }

    pub fn unit_count(&self) -> usize {
        self.units().count()
    }

    pub fn boundary_count(&self) -> usize {
        self.boundaries().count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Serializable, deterministically ordered view of the graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            units: self.units().cloned().collect(),
            boundaries: self.boundaries().cloned().collect(),
            edges: self.edges().into_iter().cloned().collect(),
        }
    }
}

/// Ordered, serializable copy of an [`InteractionGraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GraphSnapshot {
    pub units: Vec<Unit>,
    pub boundaries: Vec<BoundaryNode>,
    pub edges: Vec<InteractionEdge>,
}
