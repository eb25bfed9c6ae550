//! Unit Model: the normalized, language-agnostic representation of parsed source.
//!
//! The parser that produces this model is an external collaborator. The core only
//! requires that every [`Unit`] carries a unique dotted identifier and that raw
//! references are grouped by the unit that contains them.

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::diagnostics::AnalysisError;

/// Unit identifier: the dotted qualified name (e.g. `app.services.UserService.get`).
pub type UnitId = String;

/// Kind of analyzable source unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Module,
    Class,
    Function,
    Method,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Module => "module",
            UnitKind::Class => "class",
            UnitKind::Function => "function",
            UnitKind::Method => "method",
        }
    }

    /// Units that can be invoked (and therefore be the target of a call).
    pub fn is_callable(&self) -> bool {
        matches!(self, UnitKind::Function | UnitKind::Method | UnitKind::Class)
    }
}

/// One declared parameter. The type annotation is best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

/// Declared parameter/return shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Signature {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

impl Signature {
    /// Renders `(a: int, b) -> str` style text for human-readable intents.
    pub fn render(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| match &p.annotation {
                Some(a) => format!("{}: {}", p.name, a),
                None => p.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        match &self.return_type {
            Some(ret) => format!("({params}) -> {ret}"),
            None => format!("({params})"),
        }
    }
}

/// A named, analyzable piece of source: module, class, function or method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Unit {
    pub id: UnitId,
    /// Unqualified name (last segment of `id` when omitted).
    #[serde(default)]
    pub name: String,
    pub kind: UnitKind,
    #[serde(default)]
    pub signature: Signature,
    /// Owner: a method is owned by its class; a class/function by its module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing: Option<UnitId>,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub line: u32,
    /// Explicit entry-point marker (route handler, CLI command, ...).
    #[serde(default)]
    pub is_entry_point: bool,
    /// Error kinds the unit's own logic can raise.
    #[serde(default)]
    pub raises: BTreeSet<String>,
    /// Error kinds caught locally and not re-raised.
    #[serde(default)]
    pub suppresses: BTreeSet<String>,
    /// Downstream error kind -> kind re-raised in its place.
    #[serde(default)]
    pub wraps: BTreeMap<String, String>,
}

impl Unit {
    pub fn new(id: impl Into<String>, kind: UnitKind) -> Self {
        let id = id.into();
        let name = last_segment(&id).to_string();
        Self {
            id,
            name,
            kind,
            signature: Signature::default(),
            enclosing: None,
            file_path: String::new(),
            line: 0,
            is_entry_point: false,
            raises: BTreeSet::new(),
            suppresses: BTreeSet::new(),
            wraps: BTreeMap::new(),
        }
    }

    pub fn with_enclosing(mut self, enclosing: impl Into<String>) -> Self {
        self.enclosing = Some(enclosing.into());
        self
    }

    pub fn with_file(mut self, file_path: impl Into<String>, line: u32) -> Self {
        self.file_path = file_path.into();
        self.line = line;
        self
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn raising(mut self, kind: impl Into<String>) -> Self {
        self.raises.insert(kind.into());
        self
    }

    pub fn suppressing(mut self, kind: impl Into<String>) -> Self {
        self.suppresses.insert(kind.into());
        self
    }

    pub fn wrapping(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.wraps.insert(from.into(), to.into());
        self
    }

    pub fn entry_point(mut self) -> Self {
        self.is_entry_point = true;
        self
    }

    /// Display name, falling back to the last id segment.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            last_segment(&self.id)
        } else {
            &self.name
        }
    }
}

/// How a reference touches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    #[default]
    Call,
    Read,
    Write,
}

/// Source location of a reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub struct CallSite {
    pub file: String,
    pub line: u32,
}

impl CallSite {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl std::fmt::Display for CallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Resolution hints supplied by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResolutionHints {
    #[serde(default)]
    pub access: AccessKind,
    /// Module the parser attributes the symbol to (from imports).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_hint: Option<String>,
    /// Target already resolved by the parser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<UnitId>,
}

/// A raw reference extracted from a unit's body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RawReference {
    pub callee: String,
    #[serde(default)]
    pub site: CallSite,
    #[serde(default)]
    pub hints: ResolutionHints,
}

impl RawReference {
    pub fn call(callee: impl Into<String>, site: CallSite) -> Self {
        Self {
            callee: callee.into(),
            site,
            hints: ResolutionHints::default(),
        }
    }

    pub fn access(callee: impl Into<String>, site: CallSite, access: AccessKind) -> Self {
        Self {
            callee: callee.into(),
            site,
            hints: ResolutionHints {
                access,
                ..ResolutionHints::default()
            },
        }
    }

    pub fn from_module(mut self, module: impl Into<String>) -> Self {
        self.hints.module_hint = Some(module.into());
        self
    }

    pub fn resolved_to(mut self, target: impl Into<String>) -> Self {
        self.hints.target = Some(target.into());
        self
    }

    /// Static signature used for boundary classification: `<module_hint>.<callee>`
    /// when the parser attributed the symbol to a module, otherwise the callee.
    pub fn static_signature(&self) -> String {
        match &self.hints.module_hint {
            Some(module) if !self.callee.starts_with(&format!("{module}.")) => {
                format!("{module}.{}", self.callee)
            }
            _ => self.callee.clone(),
        }
    }
}

/// Serialized form of the Unit Model as produced by the parsing collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct UnitModelDocument {
    #[serde(default)]
    pub units: Vec<Unit>,
    #[serde(default)]
    pub references: BTreeMap<UnitId, Vec<RawReference>>,
}

/// Unit id -> Unit, plus per-unit raw references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitModel {
    units: BTreeMap<UnitId, Unit>,
    references: BTreeMap<UnitId, Vec<RawReference>>,
}

impl UnitModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a model from a parsed document, rejecting empty or duplicate ids.
    pub fn from_document(doc: UnitModelDocument) -> Result<Self, AnalysisError> {
        let mut model = Self::new();
        for unit in doc.units {
            model.insert_unit(unit)?;
        }
        for (source, refs) in doc.references {
            model.references.entry(source).or_default().extend(refs);
        }
        Ok(model)
    }

    pub fn insert_unit(&mut self, mut unit: Unit) -> Result<(), AnalysisError> {
        if unit.id.trim().is_empty() {
            return Err(AnalysisError::malformed("unit with empty id"));
        }
        if self.units.contains_key(&unit.id) {
            return Err(AnalysisError::malformed(format!("duplicate unit id `{}`", unit.id)));
        }
        if unit.name.is_empty() {
            unit.name = last_segment(&unit.id).to_string();
        }
        self.units.insert(unit.id.clone(), unit);
        Ok(())
    }

    pub fn add_reference(&mut self, source: impl Into<String>, reference: RawReference) {
        self.references.entry(source.into()).or_default().push(reference);
    }

    pub fn units(&self) -> &BTreeMap<UnitId, Unit> {
        &self.units
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.get(id)
    }

    pub fn references(&self) -> &BTreeMap<UnitId, Vec<RawReference>> {
        &self.references
    }

    pub fn references_of(&self, id: &str) -> &[RawReference] {
        self.references.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Drops every unit for which `is_excluded` holds, together with the units it
    /// encloses and the references it owns. Explicit `target` hints into removed units
    /// are cleared so the reference falls back to name-based resolution.
    pub fn without_units(&self, mut is_excluded: impl FnMut(&Unit) -> bool) -> Self {
        let mut removed: BTreeSet<&str> = self
            .units
            .values()
            .filter(|u| is_excluded(u))
            .map(|u| u.id.as_str())
            .collect();

        // Owned units go with their owner.
        loop {
            let before = removed.len();
            for unit in self.units.values() {
                if let Some(owner) = unit.enclosing.as_deref()
                    && removed.contains(owner)
                {
                    removed.insert(unit.id.as_str());
                }
            }
            if removed.len() == before {
                break;
            }
        }

        let units = self
            .units
            .iter()
            .filter(|(id, _)| !removed.contains(id.as_str()))
            .map(|(id, unit)| (id.clone(), unit.clone()))
            .collect();
        let references = self
            .references
            .iter()
            .filter(|(id, _)| !removed.contains(id.as_str()))
            .map(|(id, refs)| {
                let refs = refs
                    .iter()
                    .cloned()
                    .map(|mut r| {
                        if r.hints.target.as_deref().is_some_and(|t| removed.contains(t)) {
                            r.hints.target = None;
                        }
                        r
                    })
                    .collect();
                (id.clone(), refs)
            })
            .collect();

        Self { units, references }
    }

    /// Module that owns `id`: nearest enclosing unit of kind `module`, falling back to
    /// the dotted prefix of the id.
    pub fn module_of(&self, id: &str) -> String {
        let mut current = self.units.get(id);
        let mut hops = 0;
        while let Some(unit) = current {
            if unit.kind == UnitKind::Module {
                return unit.id.clone();
            }
            hops += 1;
            if hops > self.units.len() {
                break;
            }
            current = unit.enclosing.as_deref().and_then(|e| self.units.get(e));
        }
        parent_path(id).to_string()
    }

    /// Nearest enclosing class of `id` (the unit itself when it is a class).
    pub fn owning_class(&self, id: &str) -> Option<&Unit> {
        let mut current = self.units.get(id);
        let mut hops = 0;
        while let Some(unit) = current {
            if unit.kind == UnitKind::Class {
                return Some(unit);
            }
            hops += 1;
            if hops > self.units.len() {
                return None;
            }
            current = unit.enclosing.as_deref().and_then(|e| self.units.get(e));
        }
        None
    }
}

pub(crate) fn last_segment(id: &str) -> &str {
    id.rsplit('.').next().unwrap_or(id)
}

pub(crate) fn parent_path(id: &str) -> &str {
    id.rsplit_once('.').map(|(parent, _)| parent).unwrap_or("")
}
