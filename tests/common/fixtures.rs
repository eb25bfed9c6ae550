//! Test fixture generators for integration tests.
#![allow(dead_code)]

use interaction_testgen::app::config::AnalysisConfig;
use interaction_testgen::domain::pipeline::AnalysisReport;
use interaction_testgen::domain::unit::{
    CallSite, Parameter, RawReference, Signature, Unit, UnitKind, UnitModel,
};

pub fn site(file: &str, line: u32) -> CallSite {
    CallSite::new(file, line)
}

pub fn function(id: &str) -> Unit {
    Unit::new(id, UnitKind::Function).with_file(format!("{}.py", module_file(id)), 1)
}

pub fn method(class: &str, name: &str) -> Unit {
    Unit::new(format!("{class}.{name}"), UnitKind::Method)
        .with_enclosing(class)
        .with_file(format!("{}.py", module_file(class)), 1)
}

pub fn class(module: &str, name: &str) -> Unit {
    Unit::new(format!("{module}.{name}"), UnitKind::Class)
        .with_enclosing(module)
        .with_file(format!("{}.py", module.replace('.', "/")), 1)
}

pub fn module(id: &str) -> Unit {
    Unit::new(id, UnitKind::Module).with_file(format!("{}.py", id.replace('.', "/")), 1)
}

fn module_file(id: &str) -> String {
    id.rsplit_once('.')
        .map(|(parent, _)| parent)
        .unwrap_or(id)
        .replace('.', "/")
}

pub fn signature(params: &[(&str, Option<&str>)], returns: Option<&str>) -> Signature {
    Signature {
        parameters: params
            .iter()
            .map(|(name, annotation)| Parameter {
                name: name.to_string(),
                annotation: annotation.map(String::from),
            })
            .collect(),
        return_type: returns.map(String::from),
    }
}

/// Builds a model from units; panics on malformed input (tests only).
pub fn model(units: Vec<Unit>) -> UnitModel {
    let mut m = UnitModel::new();
    for u in units {
        m.insert_unit(u).unwrap();
    }
    m
}

/// Model where each `(caller, callee)` pair is a fully qualified call.
pub fn call_chain_model(ids: &[&str], calls: &[(&str, &str)]) -> UnitModel {
    let mut m = model(ids.iter().map(|id| function(id)).collect());
    for (i, (caller, callee)) in calls.iter().enumerate() {
        m.add_reference(*caller, RawReference::call(*callee, site("app.py", i as u32 + 1)));
    }
    m
}

/// Controller -> Service -> Repository -> storage boundary. Repository raises
/// `NotFound`; Controller suppresses it.
pub fn layered_app() -> UnitModel {
    let mut m = model(vec![
        module("app"),
        class("app", "Controller"),
        method("app.Controller", "handle")
            .with_signature(signature(
                &[("self", None), ("request", Some("Request"))],
                Some("Response"),
            ))
            .suppressing("NotFound"),
        class("app", "Service"),
        method("app.Service", "get_user").with_signature(signature(
            &[("self", None), ("user_id", Some("int"))],
            Some("User"),
        )),
        class("app", "Repository"),
        method("app.Repository", "find")
            .with_signature(signature(
                &[("self", None), ("user_id", Some("int"))],
                Some("Row"),
            ))
            .raising("NotFound"),
    ]);
    m.add_reference(
        "app.Controller.handle",
        RawReference::call("self.service.get_user", site("app.py", 12)),
    );
    m.add_reference(
        "app.Service.get_user",
        RawReference::call("self.repository.find", site("app.py", 24)),
    );
    m.add_reference(
        "app.Repository.find",
        RawReference::call("self.session.execute", site("app.py", 36)),
    );
    m
}

pub fn analyze(model: UnitModel) -> AnalysisReport {
    analyze_with(model, &AnalysisConfig::default())
}

pub fn analyze_with(model: UnitModel, config: &AnalysisConfig) -> AnalysisReport {
    let model = config.prepare(model);
    config.pipeline().unwrap().run(&model).unwrap()
}

pub const LAYERED_APP_JSON: &str = r#"{
  "units": [
    {"id": "app", "kind": "module", "file_path": "app.py"},
    {"id": "app.Controller", "kind": "class", "enclosing": "app", "file_path": "app.py"},
    {"id": "app.Controller.handle", "kind": "method", "enclosing": "app.Controller",
     "file_path": "app.py", "line": 10, "suppresses": ["NotFound"],
     "signature": {"parameters": [{"name": "self"}, {"name": "request", "annotation": "Request"}],
                   "return_type": "Response"}},
    {"id": "app.Service", "kind": "class", "enclosing": "app", "file_path": "app.py"},
    {"id": "app.Service.get_user", "kind": "method", "enclosing": "app.Service",
     "file_path": "app.py", "line": 22},
    {"id": "app.Repository", "kind": "class", "enclosing": "app", "file_path": "app.py"},
    {"id": "app.Repository.find", "kind": "method", "enclosing": "app.Repository",
     "file_path": "app.py", "line": 34, "raises": ["NotFound"]}
  ],
  "references": {
    "app.Controller.handle": [{"callee": "self.service.get_user", "site": {"file": "app.py", "line": 12}}],
    "app.Service.get_user": [{"callee": "self.repository.find", "site": {"file": "app.py", "line": 24}}],
    "app.Repository.find": [{"callee": "self.session.execute", "site": {"file": "app.py", "line": 36}}]
  }
}"#;
