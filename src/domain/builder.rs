use crate::domain::boundary::{BoundaryDetector, BoundaryNode};
use crate::domain::diagnostics::{AnalysisError, Diagnostic};
use crate::domain::edge::{Confidence, EdgeKey, EdgeKind, InteractionEdge};
use crate::domain::graph::{GraphNode, InteractionGraph};
use crate::domain::unit::{
    AccessKind, CallSite, RawReference, Unit, UnitId, UnitModel, last_segment,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// Receivers that refer to the enclosing class instance.
const SELF_RECEIVERS: &[&str] = &["self.", "this.", "cls."];

/// Output of the graph builder: the graph plus non-fatal resolution findings.
#[derive(Debug)]
pub struct BuildOutput {
    pub graph: InteractionGraph,
    pub diagnostics: Vec<Diagnostic>,
}

/// Graph builder - Domain Service for constructing the InteractionGraph
pub struct GraphBuilder {
    detector: BoundaryDetector,
}

/// Read-only lookup tables shared by resolution workers.
struct UnitIndex<'a> {
    model: &'a UnitModel,
    /// module -> unqualified name -> candidate ids (sorted)
    by_module_name: HashMap<String, BTreeMap<&'a str, Vec<&'a str>>>,
    /// Prefixes (modules and packages) that exist in the model.
    known_modules: BTreeSet<String>,
    /// Roots of module hints that name modules absent from the model.
    external_roots: BTreeSet<String>,
}

impl<'a> UnitIndex<'a> {
    fn new(model: &'a UnitModel) -> Self {
        let mut by_module_name: HashMap<String, BTreeMap<&'a str, Vec<&'a str>>> = HashMap::new();
        let mut known_modules = BTreeSet::new();

        for unit in model.units().values() {
            let module = model.module_of(&unit.id);
            if unit.kind.is_callable() {
                by_module_name
                    .entry(module.clone())
                    .or_default()
                    .entry(unit.display_name())
                    .or_default()
                    .push(unit.id.as_str());
            }
            // Every dotted prefix of a module counts as known (packages).
            let mut prefix = String::new();
            for segment in module.split('.').filter(|s| !s.is_empty()) {
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(segment);
                known_modules.insert(prefix.clone());
            }
        }
        for names in by_module_name.values_mut() {
            for ids in names.values_mut() {
                ids.sort_unstable();
            }
        }

        let mut index = Self {
            model,
            by_module_name,
            known_modules,
            external_roots: BTreeSet::new(),
        };
        let external_roots: BTreeSet<String> = model
            .references()
            .values()
            .flatten()
            .filter_map(|r| r.hints.module_hint.as_deref())
            .filter(|hint| !index.is_known_module(hint))
            .filter_map(|hint| hint.split('.').next())
            .filter(|root| !root.is_empty())
            .map(String::from)
            .collect();
        index.external_roots = external_roots;
        index
    }

    fn contains(&self, id: &str) -> bool {
        self.model.unit(id).is_some()
    }

    fn is_known_module(&self, module: &str) -> bool {
        self.known_modules.contains(module)
            || self
                .known_modules
                .iter()
                .any(|m| module.starts_with(&format!("{m}.")))
    }
}

/// A resolved edge before the merge step.
struct PendingEdge {
    edge: InteractionEdge,
    boundary: Option<BoundaryNode>,
}

/// A read access waiting for the shared-state pass.
struct StateRead {
    symbol: String,
    unit: UnitId,
    callee: String,
    site: CallSite,
}

/// Per-worker resolution result.
#[derive(Default)]
struct LocalResolution {
    edges: Vec<PendingEdge>,
    diagnostics: Vec<Diagnostic>,
    reads: Vec<StateRead>,
    /// (state symbol, unit) for write accesses.
    writes: Vec<(String, UnitId)>,
}

enum Resolution {
    Units(Vec<String>, Confidence),
    Boundary(BoundaryNode, Confidence),
    Unresolved,
}

impl GraphBuilder {
    pub fn new(detector: BoundaryDetector) -> Self {
        Self { detector }
    }

    /// Staged build strategy
    ///
    /// 1. validate the model, 2. resolve references per unit in parallel,
    /// 3. merge edge lists single-threaded with deduplication, 4. derive shared-state
    /// edges, 5. materialize the graph in a deterministic order.
    ///
    /// Accesses matching the signature table (`os.environ`) become external calls. A read
    /// of state no unit writes is reported as unresolved; writes nobody reads add nothing.
    pub fn build(&self, model: &UnitModel) -> Result<BuildOutput, AnalysisError> {
        self.validate(model)?;
        let index = UnitIndex::new(model);

        // Pass 1: parallel resolution over a read-only index
        let sources: Vec<&Unit> = model.units().values().collect();
        let locals: Vec<LocalResolution> = sources
            .par_iter()
            .map(|unit| self.resolve_unit(&index, unit))
            .collect::<Result<Vec<_>, _>>()?;

        // Pass 2: single-threaded merge
        let mut edges: BTreeMap<EdgeKey, InteractionEdge> = BTreeMap::new();
        let mut boundaries: BTreeMap<String, BoundaryNode> = BTreeMap::new();
        let mut diagnostics = Vec::new();
        let mut reads = Vec::new();
        let mut writers: BTreeMap<String, BTreeSet<UnitId>> = BTreeMap::new();

        for local in locals {
            for pending in local.edges {
                if let Some(boundary) = pending.boundary {
                    boundaries.entry(boundary.id.clone()).or_insert(boundary);
                }
                merge_edge(&mut edges, pending.edge);
            }
            diagnostics.extend(local.diagnostics);
            reads.extend(local.reads);
            for (symbol, unit) in local.writes {
                writers.entry(symbol).or_default().insert(unit);
            }
        }

        // Pass 3: shared-state edges, reader -> writer
        for read in reads {
            let Some(symbol_writers) = writers.get(&read.symbol) else {
                diagnostics.push(Diagnostic::UnresolvedReference {
                    source: read.unit,
                    callee: read.callee,
                    site: read.site,
                });
                continue;
            };
            for writer in symbol_writers {
                if *writer == read.unit {
                    continue;
                }
                merge_edge(
                    &mut edges,
                    InteractionEdge {
                        source: read.unit.clone(),
                        target: writer.clone(),
                        kind: EdgeKind::SharedState,
                        sites: vec![read.site.clone()],
                        confidence: Confidence::Exact,
                    },
                );
            }
        }

        // Pass 4: materialize
        let mut graph = InteractionGraph::new();
        for unit in model.units().values() {
            graph.add_node(GraphNode::Unit(unit.clone()));
        }
        for boundary in boundaries.into_values() {
            graph.add_node(GraphNode::Boundary(boundary));
        }
        for edge in edges.into_values() {
            let key = edge.key();
            if !graph.add_edge(edge) {
                return Err(AnalysisError::malformed(format!(
                    "edge {} references a node that is neither a unit nor a boundary",
                    key.element_id()
                )));
            }
        }

        diagnostics.sort();
        diagnostics.dedup();

        info!(
            units = graph.unit_count(),
            boundaries = graph.boundary_count(),
            edges = graph.edge_count(),
            diagnostics = diagnostics.len(),
            "Interaction graph built"
        );

        Ok(BuildOutput { graph, diagnostics })
    }

    fn validate(&self, model: &UnitModel) -> Result<(), AnalysisError> {
        for unit in model.units().values() {
            if let Some(owner) = &unit.enclosing
                && model.unit(owner).is_none()
            {
                return Err(AnalysisError::malformed(format!(
                    "unit `{}` is enclosed by unknown unit `{owner}`",
                    unit.id
                )));
            }
            if unit.enclosing.as_deref() == Some(unit.id.as_str()) {
                return Err(AnalysisError::malformed(format!(
                    "unit `{}` encloses itself",
                    unit.id
                )));
            }
        }
        for source in model.references().keys() {
            if model.unit(source).is_none() {
                return Err(AnalysisError::malformed(format!(
                    "references recorded for unknown unit `{source}`"
                )));
            }
        }
        Ok(())
    }

    fn resolve_unit(
        &self,
        index: &UnitIndex<'_>,
        unit: &Unit,
    ) -> Result<LocalResolution, AnalysisError> {
        let mut local = LocalResolution::default();
        let module = index.model.module_of(&unit.id);

        for reference in index.model.references_of(&unit.id) {
            if reference.hints.access != AccessKind::Call
                && let Some(m) = self.detector.classify(reference)
            {
                debug!(source = %unit.id, boundary = %m.node.id, "external state access");
                local.edges.push(external_edge(unit, reference, m.node, Confidence::Exact));
                continue;
            }
            match reference.hints.access {
                AccessKind::Read => {
                    local.reads.push(StateRead {
                        symbol: state_symbol(&module, reference),
                        unit: unit.id.clone(),
                        callee: reference.callee.clone(),
                        site: reference.site.clone(),
                    });
                    continue;
                }
                AccessKind::Write => {
                    local
                        .writes
                        .push((state_symbol(&module, reference), unit.id.clone()));
                    continue;
                }
                AccessKind::Call => {}
            }

            match self.resolve_reference(index, unit, &module, reference)? {
                Resolution::Units(targets, confidence) => {
                    if targets.len() > 1 {
                        local.diagnostics.push(Diagnostic::AmbiguousReference {
                            source: unit.id.clone(),
                            callee: reference.callee.clone(),
                            site: reference.site.clone(),
                            candidates: targets.clone(),
                        });
                    }
                    for target in targets {
                        debug!(source = %unit.id, %target, ?confidence, "resolved call");
                        local.edges.push(PendingEdge {
                            edge: InteractionEdge {
                                source: unit.id.clone(),
                                target,
                                kind: EdgeKind::DirectCall,
                                sites: vec![reference.site.clone()],
                                confidence,
                            },
                            boundary: None,
                        });
                    }
                }
                Resolution::Boundary(boundary, confidence) => {
                    debug!(source = %unit.id, boundary = %boundary.id, "external call");
                    local
                        .edges
                        .push(external_edge(unit, reference, boundary, confidence));
                }
                Resolution::Unresolved => {
                    debug!(source = %unit.id, callee = %reference.callee, "unresolved reference");
                    local.diagnostics.push(Diagnostic::UnresolvedReference {
                        source: unit.id.clone(),
                        callee: reference.callee.clone(),
                        site: reference.site.clone(),
                    });
                }
            }
        }
        Ok(local)
    }

    /// Precedence: (a) exact qualified match, (b) unqualified match in the same module,
    /// (c) boundary signature table, (d) unknown external module or unresolved.
    fn resolve_reference(
        &self,
        index: &UnitIndex<'_>,
        unit: &Unit,
        module: &str,
        reference: &RawReference,
    ) -> Result<Resolution, AnalysisError> {
        // (a)
        if let Some(target) = &reference.hints.target {
            if index.contains(target) {
                return Ok(Resolution::Units(vec![target.clone()], Confidence::Exact));
            }
            return match self.detector.classify(reference) {
                Some(m) => Ok(Resolution::Boundary(m.node, Confidence::Exact)),
                None => Err(AnalysisError::malformed(format!(
                    "reference from `{}` at {} targets unknown unit `{target}`",
                    unit.id, reference.site
                ))),
            };
        }
        if let Some(target) = exact_candidates(index, unit, module, reference)
            .into_iter()
            .find(|c| index.contains(c))
        {
            return Ok(Resolution::Units(vec![target], Confidence::Exact));
        }

        // Receiver root of a qualified callee not reached through self/this/cls.
        let stripped = strip_receiver(&reference.callee);
        let receiver = if stripped.len() == reference.callee.len() {
            stripped.split_once('.').map(|(root, _)| root)
        } else {
            None
        };
        let external_root = receiver.filter(|root| index.external_roots.contains(*root));

        // A qualified callee may name a library; the table wins over a same-named unit.
        if receiver.is_some()
            && let Some(m) = self.detector.classify(reference)
        {
            return Ok(Resolution::Boundary(m.node, Confidence::Exact));
        }

        // (b)
        let name = last_segment(stripped);
        let in_module_hint = reference
            .hints
            .module_hint
            .as_deref()
            .is_none_or(|hint| index.is_known_module(hint));
        if in_module_hint
            && external_root.is_none()
            && let Some(ids) = index
                .by_module_name
                .get(module)
                .and_then(|names| names.get(name))
        {
            let candidates: Vec<String> = ids
                .iter()
                .filter(|id| **id != unit.id)
                .map(|id| id.to_string())
                .collect();
            match candidates.len() {
                0 => {}
                1 => return Ok(Resolution::Units(candidates, Confidence::Inferred)),
                _ => return Ok(Resolution::Units(candidates, Confidence::Ambiguous)),
            }
        }

        // (c)
        if receiver.is_none()
            && let Some(m) = self.detector.classify(reference)
        {
            return Ok(Resolution::Boundary(m.node, Confidence::Exact));
        }

        // (d)
        let external_module = reference
            .hints
            .module_hint
            .as_deref()
            .filter(|hint| !index.is_known_module(hint))
            .or(external_root);
        if let Some(module) = external_module {
            let m = self.detector.classify_unknown(module);
            return Ok(Resolution::Boundary(m.node, Confidence::Inferred));
        }
        Ok(Resolution::Unresolved)
    }
}

fn external_edge(
    unit: &Unit,
    reference: &RawReference,
    boundary: BoundaryNode,
    confidence: Confidence,
) -> PendingEdge {
    PendingEdge {
        edge: InteractionEdge {
            source: unit.id.clone(),
            target: boundary.id.clone(),
            kind: EdgeKind::ExternalCall,
            sites: vec![reference.site.clone()],
            confidence,
        },
        boundary: Some(boundary),
    }
}

fn merge_edge(edges: &mut BTreeMap<EdgeKey, InteractionEdge>, edge: InteractionEdge) {
    match edges.get_mut(&edge.key()) {
        Some(existing) => existing.absorb(edge),
        None => {
            edges.insert(edge.key(), edge);
        }
    }
}

fn strip_receiver(callee: &str) -> &str {
    SELF_RECEIVERS
        .iter()
        .find_map(|r| callee.strip_prefix(r))
        .unwrap_or(callee)
}

/// Fully qualified spellings a reference may denote, most specific first.
fn exact_candidates(
    index: &UnitIndex<'_>,
    unit: &Unit,
    module: &str,
    reference: &RawReference,
) -> Vec<String> {
    let callee = reference.callee.as_str();
    let mut candidates = vec![callee.to_string()];

    if let Some(hint) = &reference.hints.module_hint {
        candidates.push(format!("{hint}.{callee}"));
    }
    let stripped = strip_receiver(callee);
    if stripped != callee
        && let Some(class) = index.model.owning_class(&unit.id)
    {
        candidates.push(format!("{}.{stripped}", class.id));
    }
    if !module.is_empty() {
        candidates.push(format!("{module}.{callee}"));
    }
    candidates
}

/// State symbols are keyed by their qualified name; bare names are scoped to the module.
fn state_symbol(module: &str, reference: &RawReference) -> String {
    let name = strip_receiver(&reference.callee);
    if let Some(hint) = &reference.hints.module_hint {
        return format!("{hint}.{name}");
    }
    if name.contains('.') || module.is_empty() {
        name.to_string()
    } else {
        format!("{module}.{name}")
    }
}
