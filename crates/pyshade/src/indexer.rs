//! Project symbol indexing
//!
//! One source-order pass per file collects declarations, import bindings,
//! class attribute owners, dynamic-name call sites, annotation names, and
//! every observed identifier. The per-file results aggregate into a single
//! immutable [`ProjectIndex`] that the rename mapper and rewriter consume.
//!
//! Cross-file references are never resolved here; a cycle between two files
//! costs nothing because lookups only happen later, against the complete
//! index.

use std::path::{Path, PathBuf};

use log::debug;
use ruff_python_ast::{
    ExceptHandler, Expr, ExprContext, ModModule, Parameter, Parameters, Stmt,
    visitor::source_order::{self, SourceOrderVisitor},
};
use ruff_python_parser::parse_expression;
use ruff_text_size::TextRange;

use crate::{
    resolver::ModuleClassifier,
    types::{DynamicAccessKind, FxIndexMap, FxIndexSet, SymbolKind, is_dunder},
};

/// One recorded declaration site.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: SymbolKind,
    pub range: TextRange,
}

/// One import binding in one file.
#[derive(Debug, Clone)]
pub struct ImportBinding {
    /// Dotted source module, with leading dots for relative imports
    pub module: String,
    /// Imported member for `from m import y`; `None` for `import m`
    pub member: Option<String>,
    /// Whether the source module resolves to a file in the project set
    pub is_project_module: bool,
}

/// One `getattr`/`setattr`/`hasattr` call site.
#[derive(Debug, Clone)]
pub struct DynamicSite {
    pub file: PathBuf,
    pub range: TextRange,
    pub kind: DynamicAccessKind,
    /// Receiver identifier when the receiver is a bare name
    pub receiver: Option<String>,
    /// The member name when the second argument is a string literal
    pub name_literal: Option<String>,
}

/// The immutable cross-file aggregate produced by indexing.
#[derive(Debug, Default)]
pub struct ProjectIndex {
    /// (file, dotted scope path, name) → declaration record
    pub declarations: FxIndexMap<(PathBuf, String, String), Declaration>,
    /// Names with at least one declaration anywhere in the project
    pub declared_names: FxIndexSet<String>,
    /// Per file: local bind-name → import binding
    pub imports: FxIndexMap<PathBuf, FxIndexMap<String, ImportBinding>>,
    /// Attribute name → project classes declaring it
    pub attribute_owners: FxIndexMap<String, FxIndexSet<String>>,
    /// Every reflective accessor call site
    pub dynamic_sites: Vec<DynamicSite>,
    /// Identifier names seen in annotations, including string-form ones
    pub type_hints: FxIndexSet<String>,
    /// Project-owned symbol names eligible for mapping
    pub rename_candidates: FxIndexSet<String>,
    /// Names bound from modules outside the project
    pub external_names: FxIndexSet<String>,
    /// Class names declared in project files
    pub project_class_names: FxIndexSet<String>,
    /// Attribute names declared in project classes
    pub project_attributes: FxIndexSet<String>,
    /// Dynamic attribute names renamed on the no-contrary-evidence policy
    pub likely_local_dynamic_attributes: FxIndexSet<String>,
    /// Attribute names assigned on non-`self` bare-name receivers; mapped
    /// with likely-local provenance when no class declares them
    pub likely_local_attribute_names: FxIndexSet<String>,
    /// Every identifier observed anywhere, used to keep generated tokens
    /// disjoint from the project's namespace
    pub observed_identifiers: FxIndexSet<String>,
}

impl ProjectIndex {
    /// Whether a name has a recorded declaration in the project.
    pub fn is_declared(&self, name: &str) -> bool {
        self.declared_names.contains(name)
    }
}

/// Index all project files. `files` pairs each project-relative path with
/// its parsed module; the caller supplies them in lexicographic path order.
pub fn index_project(files: &[(PathBuf, &ModModule)]) -> ProjectIndex {
    let paths: Vec<&PathBuf> = files.iter().map(|(path, _)| path).collect();
    let classifier = ModuleClassifier::from_file_set(&paths);

    let mut index = ProjectIndex::default();
    for (path, module) in files {
        let mut collector = SymbolCollector {
            file: path,
            classifier: &classifier,
            out: &mut index,
            scopes: Vec::new(),
        };
        collector.visit_body(&module.body);
    }

    index
        .rename_candidates
        .retain(|name| !index.external_names.contains(name));
    index
        .likely_local_attribute_names
        .retain(|name| !index.external_names.contains(name));
    derive_likely_local(&mut index);
    index
}

/// Derive the likely-local dynamic attribute set from recorded sites.
///
/// A dynamic name qualifies when it is a declared project attribute and the
/// receiver is a bare name that is neither `self` nor a known external
/// binding.
fn derive_likely_local(index: &mut ProjectIndex) {
    for site in &index.dynamic_sites {
        let Some(name) = &site.name_literal else {
            continue;
        };
        if !index.project_attributes.contains(name) {
            continue;
        }
        let Some(receiver) = &site.receiver else {
            continue;
        };
        if receiver == "self" || index.external_names.contains(receiver) {
            continue;
        }
        index
            .likely_local_dynamic_attributes
            .insert(name.clone());
    }
}

/// Flatten all parameter slots in declaration order.
pub fn iter_parameters(parameters: &Parameters) -> Vec<&Parameter> {
    let mut collected: Vec<&Parameter> = Vec::new();
    collected.extend(parameters.posonlyargs.iter().map(|p| &p.parameter));
    collected.extend(parameters.args.iter().map(|p| &p.parameter));
    if let Some(vararg) = &parameters.vararg {
        collected.push(vararg);
    }
    collected.extend(parameters.kwonlyargs.iter().map(|p| &p.parameter));
    if let Some(kwarg) = &parameters.kwarg {
        collected.push(kwarg);
    }
    collected
}

struct ScopeFrame {
    name: String,
    is_class_body: bool,
}

/// Collects symbols and ownership evidence from one module.
struct SymbolCollector<'a> {
    file: &'a Path,
    classifier: &'a ModuleClassifier,
    out: &'a mut ProjectIndex,
    scopes: Vec<ScopeFrame>,
}

impl SymbolCollector<'_> {
    fn visit_body(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.visit_stmt_dispatch(stmt);
        }
    }

    fn in_class_body(&self) -> bool {
        self.scopes.last().is_some_and(|frame| frame.is_class_body)
    }

    fn enclosing_class(&self) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find(|frame| frame.is_class_body)
            .map(|frame| frame.name.as_str())
    }

    fn scope_path(&self) -> String {
        self.scopes
            .iter()
            .map(|frame| frame.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    fn declare(&mut self, name: &str, kind: SymbolKind, range: TextRange) {
        self.out.declarations.insert(
            (self.file.to_path_buf(), self.scope_path(), name.to_string()),
            Declaration { kind, range },
        );
        self.out.declared_names.insert(name.to_string());
    }

    fn add_candidate(&mut self, name: &str) {
        if is_renameable(name) {
            self.out.rename_candidates.insert(name.to_string());
        }
    }

    fn observe(&mut self, name: &str) {
        self.out.observed_identifiers.insert(name.to_string());
    }

    fn record_class_attribute(&mut self, name: &str, range: TextRange) {
        if is_dunder(name) {
            return;
        }
        self.out.project_attributes.insert(name.to_string());
        if let Some(class_name) = self.enclosing_class().map(str::to_string) {
            self.out
                .attribute_owners
                .entry(name.to_string())
                .or_default()
                .insert(class_name);
        }
        self.declare(name, SymbolKind::ClassAttribute, range);
    }

    fn record_import_binding(&mut self, bind_name: &str, binding: ImportBinding) {
        self.out
            .imports
            .entry(self.file.to_path_buf())
            .or_default()
            .insert(bind_name.to_string(), binding);
    }

    /// Collect identifier names from an annotation expression, descending
    /// into string-form annotations (forward references).
    fn collect_annotation_names(&mut self, annotation: &Expr) {
        match annotation {
            Expr::Name(name) => {
                self.out.type_hints.insert(name.id.to_string());
                self.observe(name.id.as_str());
            }
            Expr::Attribute(attr) => self.collect_annotation_names(&attr.value),
            Expr::Subscript(subscript) => {
                self.collect_annotation_names(&subscript.value);
                self.collect_annotation_names(&subscript.slice);
            }
            Expr::Tuple(tuple) => {
                for element in &tuple.elts {
                    self.collect_annotation_names(element);
                }
            }
            Expr::List(list) => {
                for element in &list.elts {
                    self.collect_annotation_names(element);
                }
            }
            Expr::BinOp(binop) => {
                self.collect_annotation_names(&binop.left);
                self.collect_annotation_names(&binop.right);
            }
            Expr::StringLiteral(literal) => {
                // Forward reference: the annotation text is itself an
                // expression. Unparsable contents are plain data.
                if let Ok(parsed) = parse_expression(literal.value.to_str()) {
                    let inner = parsed.into_syntax();
                    self.collect_annotation_names(&inner.body);
                }
            }
            _ => {}
        }
    }

    fn visit_stmt_dispatch(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDef(func) => {
                let kind = if self.in_class_body() {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                };
                self.declare(&func.name, kind, func.name.range);
                self.add_candidate(&func.name);
                self.observe(&func.name);
                if self.in_class_body() && !is_dunder(&func.name) {
                    self.out.project_attributes.insert(func.name.to_string());
                    if let Some(class_name) = self.enclosing_class().map(str::to_string) {
                        self.out
                            .attribute_owners
                            .entry(func.name.to_string())
                            .or_default()
                            .insert(class_name);
                    }
                }
                for parameter in iter_parameters(&func.parameters) {
                    self.declare(&parameter.name, SymbolKind::Parameter, parameter.name.range);
                    self.add_candidate(&parameter.name);
                    self.observe(&parameter.name);
                    if let Some(annotation) = &parameter.annotation {
                        self.collect_annotation_names(annotation);
                    }
                }
                if let Some(returns) = &func.returns {
                    self.collect_annotation_names(returns);
                }
                self.scopes.push(ScopeFrame {
                    name: func.name.to_string(),
                    is_class_body: false,
                });
                source_order::walk_stmt(self, stmt);
                self.scopes.pop();
            }
            Stmt::ClassDef(class) => {
                self.declare(&class.name, SymbolKind::Class, class.name.range);
                self.add_candidate(&class.name);
                self.observe(&class.name);
                self.out.project_class_names.insert(class.name.to_string());
                self.scopes.push(ScopeFrame {
                    name: class.name.to_string(),
                    is_class_body: true,
                });
                source_order::walk_stmt(self, stmt);
                self.scopes.pop();
            }
            Stmt::AnnAssign(ann) => {
                self.collect_annotation_names(&ann.annotation);
                source_order::walk_stmt(self, stmt);
            }
            Stmt::Import(import) => {
                for alias in &import.names {
                    let module_name = alias.name.as_str();
                    let root = module_name.split('.').next().unwrap_or(module_name);
                    let exposed = alias
                        .asname
                        .as_ref()
                        .map_or(root, |asname| asname.as_str())
                        .to_string();
                    let kind = self.classifier.classify(module_name);
                    debug!(
                        "import {} in {} classified {:?}",
                        module_name,
                        self.file.display(),
                        kind
                    );
                    self.record_import_binding(
                        &exposed,
                        ImportBinding {
                            module: module_name.to_string(),
                            member: None,
                            is_project_module: kind.is_first_party(),
                        },
                    );
                    if kind.is_first_party() {
                        self.declare(&exposed, SymbolKind::Module, alias.range);
                        // `import pkg.sub` binds the root name to the module
                        // path itself; only aliased or single-segment
                        // bindings can be renamed.
                        if alias.asname.is_some() || !module_name.contains('.') {
                            self.add_candidate(&exposed);
                        }
                    } else {
                        self.out.external_names.insert(exposed.clone());
                    }
                    self.observe(&exposed);
                    self.observe(root);
                }
            }
            Stmt::ImportFrom(import) => {
                // A relative import can only name something inside the
                // project tree being transformed.
                let is_project = import.level > 0
                    || import
                        .module
                        .as_ref()
                        .is_some_and(|module| self.classifier.is_project_module(module.as_str()));
                let module_text = format!(
                    "{}{}",
                    ".".repeat(import.level as usize),
                    import.module.as_ref().map_or("", |module| module.as_str())
                );
                for alias in &import.names {
                    if alias.name.as_str() == "*" {
                        continue;
                    }
                    let exposed = alias
                        .asname
                        .as_ref()
                        .map_or(alias.name.as_str(), |asname| asname.as_str())
                        .to_string();
                    self.record_import_binding(
                        &exposed,
                        ImportBinding {
                            module: module_text.clone(),
                            member: Some(alias.name.to_string()),
                            is_project_module: is_project,
                        },
                    );
                    if is_project {
                        self.declare(&exposed, SymbolKind::ImportAlias, alias.range);
                        self.add_candidate(&exposed);
                    } else {
                        self.out.external_names.insert(exposed.clone());
                    }
                    self.observe(alias.name.as_str());
                    self.observe(&exposed);
                }
            }
            Stmt::Global(global) => {
                for name in &global.names {
                    self.observe(name.as_str());
                }
            }
            Stmt::Nonlocal(nonlocal) => {
                for name in &nonlocal.names {
                    self.observe(name.as_str());
                }
            }
            _ => source_order::walk_stmt(self, stmt),
        }
    }
}

impl<'a> SourceOrderVisitor<'a> for SymbolCollector<'_> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        self.visit_stmt_dispatch(stmt);
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        match expr {
            Expr::Name(name) => {
                self.observe(name.id.as_str());
                if matches!(name.ctx, ExprContext::Store) {
                    self.add_candidate(name.id.as_str());
                    if self.in_class_body() {
                        self.record_class_attribute(name.id.as_str(), name.range);
                    } else {
                        self.declare(name.id.as_str(), SymbolKind::Local, name.range);
                    }
                }
            }
            Expr::Attribute(attr) => {
                self.observe(attr.attr.as_str());
                if matches!(attr.ctx, ExprContext::Store)
                    && let Expr::Name(receiver) = attr.value.as_ref()
                {
                    if receiver.id.as_str() == "self" {
                        self.record_class_attribute(attr.attr.as_str(), attr.attr.range);
                    } else if !is_dunder(attr.attr.as_str()) {
                        self.out
                            .likely_local_attribute_names
                            .insert(attr.attr.to_string());
                    }
                }
            }
            Expr::Call(call) => {
                if let Expr::Name(callee) = call.func.as_ref()
                    && let Some(kind) = DynamicAccessKind::from_call_name(callee.id.as_str())
                    && call.arguments.args.len() >= 2
                {
                    let receiver = match &call.arguments.args[0] {
                        Expr::Name(name) => Some(name.id.to_string()),
                        _ => None,
                    };
                    let name_literal = match &call.arguments.args[1] {
                        Expr::StringLiteral(literal) => Some(literal.value.to_str().to_string()),
                        _ => None,
                    };
                    self.out.dynamic_sites.push(DynamicSite {
                        file: self.file.to_path_buf(),
                        range: call.range,
                        kind,
                        receiver,
                        name_literal,
                    });
                }
            }
            _ => {}
        }
        source_order::walk_expr(self, expr);
    }

    fn visit_except_handler(&mut self, handler: &'a ExceptHandler) {
        let ExceptHandler::ExceptHandler(eh) = handler;
        if let Some(name) = &eh.name {
            self.declare(name.as_str(), SymbolKind::Local, name.range);
            self.add_candidate(name.as_str());
            self.observe(name.as_str());
        }
        source_order::walk_except_handler(self, handler);
    }
}

/// Check whether a symbol can ever be a rename candidate.
fn is_renameable(name: &str) -> bool {
    !name.is_empty() && !is_dunder(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruff_python_parser::parse_module;

    fn parse_test_module(source: &str) -> ModModule {
        let parsed = parse_module(source).expect("Failed to parse");
        parsed.into_syntax()
    }

    fn index_sources(sources: &[(&str, &str)]) -> ProjectIndex {
        let modules: Vec<(PathBuf, ModModule)> = sources
            .iter()
            .map(|(path, source)| (PathBuf::from(path), parse_test_module(source)))
            .collect();
        let files: Vec<(PathBuf, &ModModule)> = modules
            .iter()
            .map(|(path, module)| (path.clone(), module))
            .collect();
        index_project(&files)
    }

    #[test]
    fn test_declarations_and_candidates() {
        let index = index_sources(&[(
            "app.py",
            r"
class Widget:
    size = 4

    def draw(self, scale):
        self.offset = scale
        return self.offset

def main():
    w = Widget()
    return w
",
        )]);
        for name in ["Widget", "draw", "scale", "main", "w", "size", "offset"] {
            assert!(
                index.rename_candidates.contains(name),
                "missing candidate {name}"
            );
        }
        assert!(index.project_class_names.contains("Widget"));
        assert!(index.project_attributes.contains("draw"));
        assert!(index.project_attributes.contains("size"));
        assert!(index.project_attributes.contains("offset"));
        assert!(index.attribute_owners["draw"].contains("Widget"));
        assert!(index.is_declared("Widget"));
        assert!(index.is_declared("scale"));
    }

    #[test]
    fn test_dunders_never_candidates() {
        let index = index_sources(&[(
            "app.py",
            r"
class Widget:
    def __init__(self):
        self.__dict__ = {}

__all__ = ['Widget']
",
        )]);
        assert!(!index.rename_candidates.contains("__init__"));
        assert!(!index.rename_candidates.contains("__all__"));
        assert!(!index.project_attributes.contains("__dict__"));
    }

    #[test]
    fn test_external_imports_excluded() {
        let index = index_sources(&[(
            "app.py",
            r"
import argparse
from collections import OrderedDict
from helpers import tool

helpers = None
",
        ), ("helpers.py", "def tool():\n    pass\n")]);
        assert!(index.external_names.contains("argparse"));
        assert!(index.external_names.contains("OrderedDict"));
        assert!(!index.rename_candidates.contains("argparse"));
        assert!(!index.rename_candidates.contains("OrderedDict"));
        // project import binding stays a candidate
        assert!(index.rename_candidates.contains("tool"));
        let bindings = &index.imports[&PathBuf::from("app.py")];
        assert!(bindings["tool"].is_project_module);
        assert!(!bindings["argparse"].is_project_module);
    }

    #[test]
    fn test_external_shadowing_wins_globally() {
        // declared in-project in one file, imported externally in another:
        // the external evidence removes the name from the candidate set
        let index = index_sources(&[
            ("a.py", "def loads(data):\n    return data\n"),
            ("b.py", "from json import loads\n"),
        ]);
        assert!(!index.rename_candidates.contains("loads"));
        assert!(index.external_names.contains("loads"));
    }

    #[test]
    fn test_dynamic_sites_recorded() {
        let index = index_sources(&[(
            "app.py",
            r"
class Widget:
    def __init__(self):
        self.state = 0

def probe(w, ext):
    getattr(w, 'state')
    setattr(w, 'state', 1)
    hasattr(ext, 'missing')
    getattr(w, compute())
",
        )]);
        assert_eq!(index.dynamic_sites.len(), 4);
        assert_eq!(index.dynamic_sites[0].kind, DynamicAccessKind::Get);
        assert_eq!(index.dynamic_sites[1].kind, DynamicAccessKind::Set);
        assert_eq!(index.dynamic_sites[2].kind, DynamicAccessKind::Has);
        assert_eq!(index.dynamic_sites[3].name_literal, None);
        assert!(index.likely_local_dynamic_attributes.contains("state"));
        assert!(!index.likely_local_dynamic_attributes.contains("missing"));
    }

    #[test]
    fn test_dynamic_site_on_external_receiver_not_likely_local() {
        let index = index_sources(&[(
            "app.py",
            r"
import os

class Widget:
    def __init__(self):
        self.state = 0

getattr(os, 'state')
",
        )]);
        assert!(index.likely_local_dynamic_attributes.is_empty());
    }

    #[test]
    fn test_relative_import_is_project_local() {
        let index = index_sources(&[
            ("pkg/__init__.py", ""),
            ("pkg/api.py", "from .impl import handler\n"),
            ("pkg/impl.py", "def handler():\n    pass\n"),
        ]);
        assert!(index.rename_candidates.contains("handler"));
        assert!(!index.external_names.contains("handler"));
    }

    #[test]
    fn test_string_annotation_names_recorded() {
        let index = index_sources(&[(
            "app.py",
            r#"
class Record:
    pass

def load(raw) -> "Record":
    rows: "list[Record]" = []
    return rows
"#,
        )]);
        assert!(index.type_hints.contains("Record"));
        assert!(index.type_hints.contains("list"));
    }

    #[test]
    fn test_non_self_attribute_store_is_likely_local() {
        let index = index_sources(&[(
            "app.py",
            r"
class Widget:
    pass

w = Widget()
w.cache = 1
",
        )]);
        assert!(index.likely_local_attribute_names.contains("cache"));
        assert!(!index.project_attributes.contains("cache"));
    }

    #[test]
    fn test_observed_identifiers_cover_attributes() {
        let index = index_sources(&[("app.py", "value = obj.payload\n")]);
        assert!(index.observed_identifiers.contains("value"));
        assert!(index.observed_identifiers.contains("obj"));
        assert!(index.observed_identifiers.contains("payload"));
    }
}
