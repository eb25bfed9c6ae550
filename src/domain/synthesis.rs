//! Test Synthesis Engine.
//!
//! Turns the graph, the retained workflows and the error contracts into
//! framework-agnostic [`TestScenario`] records, one synthesis rule per tag. The output
//! is deduplicated by `(tag, graph-element set)` and sorted by tag, then primary element
//! id, so repeated runs over the same input diff cleanly.

use crate::domain::boundary::{BoundaryCategory, BoundaryNode};
use crate::domain::edge::{Confidence, EdgeKey, EdgeKind, InteractionEdge};
use crate::domain::graph::{GraphNode, InteractionGraph};
use crate::domain::propagation::{ErrorAnalysis, Witness};
use crate::domain::unit::{CallSite, Unit, UnitId, UnitKind};
use crate::domain::workflow::{Workflow, WorkflowSet};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Scenario tag. Declaration order is the output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioTag {
    ClassInteraction,
    Workflow,
    ExternalIntegration,
    ErrorPropagation,
}

impl ScenarioTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioTag::ClassInteraction => "class_interaction",
            ScenarioTag::Workflow => "workflow",
            ScenarioTag::ExternalIntegration => "external_integration",
            ScenarioTag::ErrorPropagation => "error_propagation",
        }
    }

    pub fn all() -> [ScenarioTag; 4] {
        [
            ScenarioTag::ClassInteraction,
            ScenarioTag::Workflow,
            ScenarioTag::ExternalIntegration,
            ScenarioTag::ErrorPropagation,
        ]
    }
}

impl std::str::FromStr for ScenarioTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScenarioTag::all()
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown scenario tag `{s}`"))
    }
}

/// Simulated boundary response in an `external_integration` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryOutcome {
    Success,
    Failure,
}

/// Expected outcome checked by a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Assertion {
    /// `caller` invokes `callee` (at one of `sites`).
    Invokes {
        caller: UnitId,
        callee: UnitId,
        sites: Vec<CallSite>,
    },
    /// `caller` passes arguments and consumes the result per the callee's signature.
    ConsumesContract {
        caller: UnitId,
        callee: UnitId,
        signature: String,
    },
    /// Execution passes through `unit`.
    Reaches { unit: UnitId },
    /// `unit` completes and produces a value.
    ReturnsValue {
        unit: UnitId,
        #[serde(skip_serializing_if = "Option::is_none")]
        return_type: Option<String>,
    },
    /// `caller` invokes the boundary with the expected shape.
    BoundaryInvoked {
        caller: UnitId,
        boundary: String,
        category: BoundaryCategory,
        expected_shape: String,
    },
    /// `unit` handles the simulated boundary response.
    HandlesBoundaryResponse {
        unit: UnitId,
        boundary: String,
        outcome: BoundaryOutcome,
        /// Error kinds the unit may legitimately surface for this outcome.
        allowed_errors: Vec<String>,
    },
    /// `kind` is observed when invoking `at`.
    ErrorSurfaces {
        kind: String,
        at: UnitId,
        raised_by: UnitId,
        via: EdgeKey,
        #[serde(skip_serializing_if = "Option::is_none")]
        wrapped_from: Option<String>,
    },
    /// `kind` does not escape `at`.
    ErrorSuppressed { kind: String, at: UnitId },
}

/// Named sub-scenario with its own setup and assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioVariant {
    pub name: String,
    pub setup: Vec<String>,
    pub assertions: Vec<Assertion>,
}

/// Call that starts the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Trigger {
    pub unit: UnitId,
    pub call: String,
}

/// Synthesized, framework-agnostic integration-test specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestScenario {
    pub id: String,
    pub tag: ScenarioTag,
    /// Primary graph element id (sort key).
    pub primary: String,
    /// Graph elements exercised, sorted (dedup key together with `tag`).
    pub elements: Vec<String>,
    pub intent: String,
    pub setup: Vec<String>,
    pub trigger: Trigger,
    pub assertions: Vec<Assertion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<ScenarioVariant>,
    /// Weakest resolution confidence among the edges exercised.
    pub confidence: Confidence,
}

pub struct TestSynthesisEngine {
    confidence_threshold: f64,
}

impl Default for TestSynthesisEngine {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl TestSynthesisEngine {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
        }
    }

    pub fn synthesize(
        &self,
        graph: &InteractionGraph,
        workflows: &WorkflowSet,
        errors: &ErrorAnalysis,
    ) -> Vec<TestScenario> {
        let mut scenarios = Vec::new();
        scenarios.extend(self.class_interactions(graph));
        scenarios.extend(workflows.workflows.iter().map(|w| workflow_scenario(graph, w)));
        scenarios.extend(external_integrations(graph, errors));
        scenarios.extend(error_propagations(graph, errors));

        let produced = scenarios.len();
        let mut unique: BTreeMap<(ScenarioTag, Vec<String>), TestScenario> = BTreeMap::new();
        for scenario in scenarios {
            unique
                .entry((scenario.tag, scenario.elements.clone()))
                .or_insert(scenario);
        }
        let mut out: Vec<TestScenario> = unique.into_values().collect();
        out.sort_by(|a, b| {
            (a.tag, &a.primary, &a.elements).cmp(&(b.tag, &b.primary, &b.elements))
        });

        info!(
            scenarios = out.len(),
            collapsed = produced - out.len(),
            "Test scenarios synthesized"
        );
        out
    }

    fn class_interactions(&self, graph: &InteractionGraph) -> Vec<TestScenario> {
        graph
            .edges()
            .into_iter()
            .filter(|e| e.kind == EdgeKind::DirectCall)
            .filter(|e| e.confidence.score() >= self.confidence_threshold)
            .filter_map(|edge| {
                let caller = graph.unit(&edge.source)?;
                let callee = graph.unit(&edge.target)?;
                let key = edge.key();
                Some(TestScenario {
                    id: format!("class_interaction:{}->{}", caller.id, callee.id),
                    tag: ScenarioTag::ClassInteraction,
                    primary: key.element_id(),
                    elements: sorted(vec![
                        unit_element(&caller.id),
                        unit_element(&callee.id),
                        key.element_id(),
                    ]),
                    intent: format!(
                        "{} {} invokes {} {} and consumes its declared contract {}",
                        caller.kind.as_str(),
                        caller.id,
                        callee.kind.as_str(),
                        callee.id,
                        callee.signature.render()
                    ),
                    setup: preconditions(graph, caller),
                    trigger: trigger(caller),
                    assertions: vec![
                        Assertion::Invokes {
                            caller: caller.id.clone(),
                            callee: callee.id.clone(),
                            sites: edge.sites.clone(),
                        },
                        Assertion::ConsumesContract {
                            caller: caller.id.clone(),
                            callee: callee.id.clone(),
                            signature: callee.signature.render(),
                        },
                    ],
                    variants: Vec::new(),
                    confidence: edge.confidence,
                })
            })
            .collect()
    }
}

fn workflow_scenario(graph: &InteractionGraph, workflow: &Workflow) -> TestScenario {
    let entry = graph.unit(&workflow.entry);
    let mut setup = entry.map(|u| preconditions(graph, u)).unwrap_or_default();
    let mut assertions = Vec::new();
    let mut elements: Vec<String> = workflow.edges.iter().map(EdgeKey::element_id).collect();

    for (pos, id) in workflow.nodes.iter().enumerate() {
        let Some(idx) = graph.get_node_by_id(id) else {
            continue;
        };
        let node = graph.node(idx);
        elements.push(node.element_id());
        let is_last = pos + 1 == workflow.nodes.len();
        match node {
            GraphNode::Boundary(boundary) => {
                setup.push(intercept_boundary(boundary));
                if is_last && pos > 0 {
                    assertions.push(boundary_invoked(&workflow.nodes[pos - 1], boundary));
                }
            }
            GraphNode::Unit(unit) if is_last => {
                assertions.push(Assertion::Reaches {
                    unit: unit.id.clone(),
                });
                assertions.push(Assertion::ReturnsValue {
                    unit: unit.id.clone(),
                    return_type: unit.signature.return_type.clone(),
                });
            }
            GraphNode::Unit(unit) if pos > 0 => assertions.push(Assertion::Reaches {
                unit: unit.id.clone(),
            }),
            GraphNode::Unit(_) => {}
        }
    }

    let confidence = workflow
        .edges
        .iter()
        .filter_map(|k| graph.edge(k))
        .map(|e| e.confidence)
        .min()
        .unwrap_or(Confidence::Exact);

    TestScenario {
        id: format!("workflow:{}", workflow.id()),
        tag: ScenarioTag::Workflow,
        primary: unit_element(&workflow.entry),
        elements: sorted(elements),
        intent: format!(
            "end-to-end workflow from {} through {} step(s) ending at {}",
            workflow.entry,
            workflow.length,
            workflow.terminal()
        ),
        setup,
        trigger: entry.map(trigger).unwrap_or_else(|| Trigger {
            unit: workflow.entry.clone(),
            call: format!("{}()", workflow.entry),
        }),
        assertions,
        variants: Vec::new(),
        confidence,
    }
}

fn external_integrations(graph: &InteractionGraph, errors: &ErrorAnalysis) -> Vec<TestScenario> {
    graph
        .edges()
        .into_iter()
        .filter(|e| e.kind == EdgeKind::ExternalCall)
        .filter_map(|edge| {
            let unit = graph.unit(&edge.source)?;
            let boundary = graph.boundary(&edge.target)?;
            Some(external_scenario(graph, errors, edge, unit, boundary))
        })
        .collect()
}

fn external_scenario(
    graph: &InteractionGraph,
    errors: &ErrorAnalysis,
    edge: &InteractionEdge,
    unit: &Unit,
    boundary: &BoundaryNode,
) -> TestScenario {
    let key = edge.key();
    let allowed_errors: Vec<String> = errors
        .contract(&unit.id)
        .map(|c| c.errors.keys().cloned().collect())
        .unwrap_or_default();
    let category = boundary.category.as_str();

    let success = ScenarioVariant {
        name: "success".to_string(),
        setup: vec![format!(
            "stub {category} boundary `{}` to return a successful response",
            boundary.pattern
        )],
        assertions: vec![
            Assertion::HandlesBoundaryResponse {
                unit: unit.id.clone(),
                boundary: boundary.id.clone(),
                outcome: BoundaryOutcome::Success,
                allowed_errors: Vec::new(),
            },
            Assertion::ReturnsValue {
                unit: unit.id.clone(),
                return_type: unit.signature.return_type.clone(),
            },
        ],
    };
    let failure = ScenarioVariant {
        name: "failure".to_string(),
        setup: vec![format!(
            "stub {category} boundary `{}` to fail",
            boundary.pattern
        )],
        assertions: vec![Assertion::HandlesBoundaryResponse {
            unit: unit.id.clone(),
            boundary: boundary.id.clone(),
            outcome: BoundaryOutcome::Failure,
            allowed_errors,
        }],
    };

    TestScenario {
        id: format!("external_integration:{}->{}", unit.id, boundary.id),
        tag: ScenarioTag::ExternalIntegration,
        primary: key.element_id(),
        elements: sorted(vec![
            unit_element(&unit.id),
            boundary.id.clone(),
            key.element_id(),
        ]),
        intent: format!(
            "{} calls the {category} boundary `{}` and handles both successful and failing responses",
            unit.id, boundary.pattern
        ),
        setup: preconditions(graph, unit),
        trigger: trigger(unit),
        assertions: vec![boundary_invoked(&unit.id, boundary)],
        variants: vec![success, failure],
        confidence: edge.confidence,
    }
}

fn error_propagations(graph: &InteractionGraph, errors: &ErrorAnalysis) -> Vec<TestScenario> {
    let mut out = Vec::new();
    for contract in errors.contracts.values() {
        let Some(unit) = graph.unit(&contract.unit) else {
            continue;
        };
        for (kind, entry) in &contract.errors {
            for witness in &entry.witnesses {
                // Wrapping is per witness edge.
                let wrapped_from =
                    (witness.source_kind != *kind).then(|| witness.source_kind.clone());
                out.push(error_scenario(graph, errors, unit, kind, witness, wrapped_from));
            }
        }
    }
    out
}

fn error_scenario(
    graph: &InteractionGraph,
    errors: &ErrorAnalysis,
    unit: &Unit,
    kind: &str,
    witness: &Witness,
    wrapped_from: Option<String>,
) -> TestScenario {
    let raised_by = witness
        .path
        .last()
        .cloned()
        .unwrap_or_else(|| witness.edge.target.clone());

    let mut setup = preconditions(graph, unit);
    setup.push(format!(
        "force {raised_by} to raise {}",
        origin_kind(errors, witness)
    ));

    let mut assertions = vec![Assertion::ErrorSurfaces {
        kind: kind.to_string(),
        at: unit.id.clone(),
        raised_by: raised_by.clone(),
        via: witness.edge.clone(),
        wrapped_from: wrapped_from.clone(),
    }];

    // Direct callers that swallow this kind.
    let callers: BTreeSet<&str> = graph
        .get_node_by_id(&unit.id)
        .map(|idx| {
            graph
                .incoming(idx)
                .into_iter()
                .filter(|(_, e)| e.kind == EdgeKind::DirectCall)
                .map(|(_, e)| e.source.as_str())
                .collect()
        })
        .unwrap_or_default();
    for caller in callers {
        if let Some(contract) = errors.contract(caller)
            && contract
                .suppressed
                .get(kind)
                .is_some_and(|edges| edges.iter().any(|e| e.target == unit.id))
        {
            assertions.push(Assertion::ErrorSuppressed {
                kind: kind.to_string(),
                at: caller.to_string(),
            });
        }
    }

    let intent = match &wrapped_from {
        Some(from) => format!(
            "{from} raised by {raised_by} surfaces at {} wrapped as {kind} via {}",
            unit.id, witness.edge.target
        ),
        None => format!(
            "{kind} raised by {raised_by} surfaces at {} via {}",
            unit.id, witness.edge.target
        ),
    };

    TestScenario {
        id: format!(
            "error_propagation:{}:{kind}:{}",
            unit.id, witness.edge.target
        ),
        tag: ScenarioTag::ErrorPropagation,
        primary: unit_element(&unit.id),
        elements: sorted(vec![
            unit_element(&unit.id),
            unit_element(&witness.edge.target),
            witness.edge.element_id(),
            format!("error:{kind}"),
        ]),
        intent,
        setup,
        trigger: trigger(unit),
        assertions,
        variants: Vec::new(),
        confidence: graph
            .edge(&witness.edge)
            .map(|e| e.confidence)
            .unwrap_or(Confidence::Exact),
    }
}

/// Kind as raised by the unit at the end of the witness path, following wraps down.
fn origin_kind(errors: &ErrorAnalysis, witness: &Witness) -> String {
    let mut kind = witness.source_kind.clone();
    for unit in witness.path.iter().skip(1) {
        let Some(next) = errors
            .contract(unit)
            .and_then(|c| c.errors.get(&kind))
            .and_then(|entry| entry.witnesses.first())
        else {
            break;
        };
        kind = next.source_kind.clone();
    }
    kind
}

fn unit_element(id: &str) -> String {
    format!("unit:{id}")
}

fn sorted(mut elements: Vec<String>) -> Vec<String> {
    elements.sort();
    elements.dedup();
    elements
}

fn trigger(unit: &Unit) -> Trigger {
    Trigger {
        unit: unit.id.clone(),
        call: format!("{}{}", unit.id, unit.signature.render()),
    }
}

fn boundary_invoked(caller: &str, boundary: &BoundaryNode) -> Assertion {
    Assertion::BoundaryInvoked {
        caller: caller.to_string(),
        boundary: boundary.id.clone(),
        category: boundary.category,
        expected_shape: format!("{} call matching `{}`", boundary.category.as_str(), boundary.pattern),
    }
}

fn intercept_boundary(boundary: &BoundaryNode) -> String {
    format!(
        "intercept {} boundary `{}` and record invocations",
        boundary.category.as_str(),
        boundary.pattern
    )
}

/// Setup needed before `unit` can be invoked: an owning instance for methods plus
/// arguments matching the declared parameters.
fn preconditions(graph: &InteractionGraph, unit: &Unit) -> Vec<String> {
    let mut setup = Vec::new();
    if unit.kind == UnitKind::Method
        && let Some(owner) = unit.enclosing.as_deref().and_then(|id| graph.unit(id))
        && owner.kind == UnitKind::Class
    {
        setup.push(format!("construct an instance of {}", owner.id));
    }
    let params: Vec<&str> = unit
        .signature
        .parameters
        .iter()
        .map(|p| p.name.as_str())
        .filter(|name| !matches!(*name, "self" | "cls" | "this"))
        .collect();
    if !params.is_empty() {
        setup.push(format!(
            "provide arguments for {}: {}",
            unit.id,
            params.join(", ")
        ));
    }
    setup
}
