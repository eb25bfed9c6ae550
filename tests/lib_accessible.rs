//! Sanity check: library and test common module are accessible.

mod common;

use interaction_testgen::domain::graph::InteractionGraph;
use interaction_testgen::domain::unit::UnitModel;

#[test]
fn test_library_accessible() {
    let graph = InteractionGraph::new();
    assert_eq!(graph.graph.node_count(), 0);
}

#[test]
fn test_fixture_model() {
    let m: UnitModel = common::fixtures::layered_app();
    assert_eq!(m.len(), 7);
    assert_eq!(m.references_of("app.Repository.find").len(), 1);
}
