//! Graph builder integration tests: reference resolution, deduplication, boundaries.

mod common;

use common::fixtures::*;
use interaction_testgen::adapters::signatures::builtin_signatures;
use interaction_testgen::domain::boundary::{BoundaryCategory, BoundaryDetector};
use interaction_testgen::domain::builder::{BuildOutput, GraphBuilder};
use interaction_testgen::domain::diagnostics::{AnalysisError, Diagnostic};
use interaction_testgen::domain::edge::{Confidence, EdgeKey, EdgeKind};
use interaction_testgen::domain::unit::{AccessKind, RawReference, UnitModel};

fn build(model: &UnitModel) -> BuildOutput {
    try_build(model).unwrap()
}

fn try_build(model: &UnitModel) -> Result<BuildOutput, AnalysisError> {
    let detector = BoundaryDetector::from_table(&builtin_signatures()).unwrap();
    GraphBuilder::new(detector).build(model)
}

#[test]
fn test_repeated_calls_collapse_into_one_edge() {
    let mut m = model(vec![function("app.a"), function("app.b")]);
    for line in [3, 7, 5] {
        m.add_reference("app.a", RawReference::call("app.b", site("app.py", line)));
    }
    let out = build(&m);

    assert_eq!(out.graph.edge_count(), 1);
    let edge = out
        .graph
        .edge(&EdgeKey::new("app.a", "app.b", EdgeKind::DirectCall))
        .unwrap();
    let lines: Vec<u32> = edge.sites.iter().map(|s| s.line).collect();
    assert_eq!(lines, vec![3, 5, 7]);
    assert_eq!(edge.confidence, Confidence::Exact);
}

#[test]
fn test_method_call_through_self_resolves_to_owning_class() {
    let mut m = model(vec![
        module("shop"),
        class("shop", "Cart"),
        method("shop.Cart", "add"),
        method("shop.Cart", "total"),
    ]);
    m.add_reference("shop.Cart.add", RawReference::call("self.total", site("shop.py", 4)));
    let out = build(&m);

    let edge = out
        .graph
        .edge(&EdgeKey::new("shop.Cart.add", "shop.Cart.total", EdgeKind::DirectCall))
        .unwrap();
    assert_eq!(edge.confidence, Confidence::Exact);
}

#[test]
fn test_name_match_in_same_module_is_inferred() {
    let mut m = model(vec![module("svc"), function("svc.run"), function("svc.helper")]);
    m.insert_unit(function("other.helper")).unwrap();
    m.add_reference("svc.run", RawReference::call("obj.helper", site("svc.py", 2)));
    let out = build(&m);

    let edge = out
        .graph
        .edge(&EdgeKey::new("svc.run", "svc.helper", EdgeKind::DirectCall))
        .unwrap();
    assert_eq!(edge.confidence, Confidence::Inferred);
    // The same name in another module is not a candidate
    assert!(
        out.graph
            .edge(&EdgeKey::new("svc.run", "other.helper", EdgeKind::DirectCall))
            .is_none()
    );
}

#[test]
fn test_ambiguous_reference_adds_low_confidence_edge_per_candidate() {
    let mut m = model(vec![
        module("zoo"),
        class("zoo", "Dog"),
        method("zoo.Dog", "speak"),
        class("zoo", "Cat"),
        method("zoo.Cat", "speak"),
        function("zoo.chorus"),
    ]);
    m.add_reference("zoo.chorus", RawReference::call("animal.speak", site("zoo.py", 9)));
    let out = build(&m);

    for target in ["zoo.Cat.speak", "zoo.Dog.speak"] {
        let edge = out
            .graph
            .edge(&EdgeKey::new("zoo.chorus", target, EdgeKind::DirectCall))
            .unwrap();
        assert_eq!(edge.confidence, Confidence::Ambiguous);
    }
    assert!(out.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::AmbiguousReference { candidates, .. }
            if candidates == &vec!["zoo.Cat.speak".to_string(), "zoo.Dog.speak".to_string()]
    )));
}

#[test]
fn test_boundary_classification_from_signature_table() {
    let mut m = model(vec![function("app.sync")]);
    m.add_reference(
        "app.sync",
        RawReference::call("post", site("app.py", 1)).from_module("requests"),
    );
    m.add_reference(
        "app.sync",
        RawReference::call("run", site("app.py", 2)).from_module("subprocess"),
    );
    let out = build(&m);

    let categories: Vec<BoundaryCategory> = out.graph.boundaries().map(|b| b.category).collect();
    assert_eq!(
        categories,
        vec![BoundaryCategory::Network, BoundaryCategory::Process]
    );
    assert!(
        out.graph
            .edges()
            .iter()
            .all(|e| e.kind == EdgeKind::ExternalCall)
    );
}

#[test]
fn test_unknown_external_module_becomes_unknown_boundary() {
    let mut m = model(vec![function("app.charge")]);
    m.add_reference(
        "app.charge",
        RawReference::call("Charge.create", site("app.py", 3)).from_module("stripe"),
    );
    let out = build(&m);

    let boundary = out.graph.boundary("boundary:unknown:stripe").unwrap();
    assert_eq!(boundary.category, BoundaryCategory::Unknown);
    let edge = &out.graph.edges()[0];
    assert_eq!(edge.confidence, Confidence::Inferred);
    assert!(out.diagnostics.is_empty());
}

#[test]
fn test_unresolvable_reference_is_dropped_with_diagnostic() {
    let mut m = model(vec![function("app.main")]);
    m.add_reference("app.main", RawReference::call("mystery", site("app.py", 8)));
    let out = build(&m);

    assert_eq!(out.graph.edge_count(), 0);
    assert_eq!(
        out.diagnostics,
        vec![Diagnostic::UnresolvedReference {
            source: "app.main".into(),
            callee: "mystery".into(),
            site: site("app.py", 8),
        }]
    );
}

#[test]
fn test_shared_state_links_reader_to_writer() {
    let mut m = model(vec![module("cfg"), function("cfg.load"), function("cfg.show")]);
    m.add_reference(
        "cfg.load",
        RawReference::access("SETTINGS", site("cfg.py", 2), AccessKind::Write),
    );
    m.add_reference(
        "cfg.show",
        RawReference::access("SETTINGS", site("cfg.py", 9), AccessKind::Read),
    );
    let out = build(&m);

    let edge = out
        .graph
        .edge(&EdgeKey::new("cfg.show", "cfg.load", EdgeKind::SharedState))
        .unwrap();
    assert_eq!(edge.sites, vec![site("cfg.py", 9)]);
    assert_eq!(out.graph.edge_count(), 1);
}

#[test]
fn test_explicit_target_to_missing_unit_is_fatal() {
    let mut m = model(vec![function("app.a")]);
    m.add_reference(
        "app.a",
        RawReference::call("b", site("app.py", 1)).resolved_to("app.ghost"),
    );
    let err = try_build(&m).unwrap_err();
    assert!(matches!(err, AnalysisError::MalformedUnitModel { .. }));
    assert!(err.to_string().contains("app.ghost"));
}

#[test]
fn test_unknown_enclosing_unit_is_fatal() {
    let m = model(vec![method("app.Missing", "run")]);
    assert!(matches!(
        try_build(&m),
        Err(AnalysisError::MalformedUnitModel { .. })
    ));
}

#[test]
fn test_layered_app_edges() {
    let out = build(&layered_app());
    let edges: Vec<String> = out
        .graph
        .edges()
        .iter()
        .map(|e| e.key().element_id())
        .collect();
    assert_eq!(
        edges,
        vec![
            "edge:app.Controller.handle->app.Service.get_user#direct_call",
            "edge:app.Repository.find->boundary:storage:*.execute#external_call",
            "edge:app.Service.get_user->app.Repository.find#direct_call",
        ]
    );
}

#[test]
fn test_qualified_library_call_is_not_matched_to_local_name() {
    let mut m = model(vec![function("app.get"), function("app.handler")]);
    m.add_reference("app.handler", RawReference::call("requests.get", site("app.py", 6)));
    let out = build(&m);

    let edge = out
        .graph
        .edge(&EdgeKey::new(
            "app.handler",
            "boundary:network:requests.*",
            EdgeKind::ExternalCall,
        ))
        .unwrap();
    assert_eq!(edge.confidence, Confidence::Exact);
    assert!(
        out.graph
            .edge(&EdgeKey::new("app.handler", "app.get", EdgeKind::DirectCall))
            .is_none()
    );
}

#[test]
fn test_receiver_naming_external_module_becomes_unknown_boundary() {
    let mut m = model(vec![
        function("app.create"),
        function("app.pay"),
        function("app.refund"),
    ]);
    m.add_reference(
        "app.pay",
        RawReference::call("Charge.create", site("app.py", 2)).from_module("stripe"),
    );
    // Same library, spelled without an import hint
    m.add_reference(
        "app.refund",
        RawReference::call("stripe.Refund.create", site("app.py", 9)),
    );
    let out = build(&m);

    assert!(
        out.graph
            .edge(&EdgeKey::new(
                "app.refund",
                "boundary:unknown:stripe",
                EdgeKind::ExternalCall
            ))
            .is_some()
    );
    assert!(
        out.graph
            .edge(&EdgeKey::new("app.refund", "app.create", EdgeKind::DirectCall))
            .is_none()
    );
    assert!(out.diagnostics.is_empty());
}

#[test]
fn test_environment_access_is_external_call() {
    let mut m = model(vec![function("app.config")]);
    m.add_reference(
        "app.config",
        RawReference::access("environ", site("app.py", 4), AccessKind::Read).from_module("os"),
    );
    let out = build(&m);

    let edge = out
        .graph
        .edge(&EdgeKey::new(
            "app.config",
            "boundary:process:os.environ",
            EdgeKind::ExternalCall,
        ))
        .unwrap();
    assert_eq!(edge.sites, vec![site("app.py", 4)]);
    assert!(out.diagnostics.is_empty());
}

#[test]
fn test_read_of_state_nobody_writes_is_unresolved() {
    let mut m = model(vec![module("cfg"), function("cfg.show")]);
    m.add_reference(
        "cfg.show",
        RawReference::access("SETTINGS", site("cfg.py", 9), AccessKind::Read),
    );
    let out = build(&m);

    assert_eq!(out.graph.edge_count(), 0);
    assert_eq!(
        out.diagnostics,
        vec![Diagnostic::UnresolvedReference {
            source: "cfg.show".into(),
            callee: "SETTINGS".into(),
            site: site("cfg.py", 9),
        }]
    );
}
