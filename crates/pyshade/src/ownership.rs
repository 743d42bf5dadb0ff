//! Usage-site ownership inference
//!
//! Answers one question per usage site: does the receiver (or bare name)
//! refer to a project-owned entity, an external one, or neither provably?
//! The resolver keeps a per-function stack of name → verdict bindings,
//! seeded from parameters and refined flow-insensitively over assignments in
//! source order. Bindings are recorded under both the original and the
//! obfuscated spelling of a name, so inference keeps working on already
//! rewritten subtrees.

use ruff_python_ast::{Expr, Parameters};

use crate::{
    indexer::{ProjectIndex, iter_parameters},
    mapper::RenameMap,
    types::{FxIndexMap, FxIndexSet, Ownership},
};

/// Builtins whose call result iterates over their first argument.
const SEQUENCE_BUILTINS: &[&str] = &["sorted", "list", "tuple", "set", "reversed"];

pub struct OwnershipResolver<'a> {
    index: &'a ProjectIndex,
    map: &'a RenameMap,
    /// Project class names under both spellings
    class_names: FxIndexSet<String>,
    /// Project attribute names under both spellings
    attribute_names: FxIndexSet<String>,
    /// Bindings introduced by import statements in the current file
    module_bindings: FxIndexMap<String, Ownership>,
    scopes: Vec<FxIndexMap<String, Ownership>>,
}

impl<'a> OwnershipResolver<'a> {
    pub fn new(index: &'a ProjectIndex, map: &'a RenameMap) -> Self {
        let mut class_names = FxIndexSet::default();
        for name in &index.project_class_names {
            class_names.insert(name.clone());
            if let Some(token) = map.get(name) {
                class_names.insert(token.to_string());
            }
        }
        let mut attribute_names = FxIndexSet::default();
        for name in &index.project_attributes {
            attribute_names.insert(name.clone());
            if let Some(token) = map.get(name) {
                attribute_names.insert(token.to_string());
            }
        }
        Self {
            index,
            map,
            class_names,
            attribute_names,
            module_bindings: FxIndexMap::default(),
            scopes: vec![FxIndexMap::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxIndexMap::default());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Record a verdict for a name under every known spelling.
    pub fn record_binding(&mut self, name: &str, ownership: Ownership) {
        let mut spellings = vec![name.to_string()];
        if let Some(token) = self.map.get(name) {
            spellings.push(token.to_string());
        }
        if let Some(original) = self.map.original_of(name) {
            spellings.push(original.to_string());
        }
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        for spelling in spellings {
            scope.insert(spelling, ownership);
        }
    }

    /// Record the binding a (possibly rewritten) import statement creates.
    pub fn record_import_binding(&mut self, name: &str, ownership: Ownership) {
        self.module_bindings.insert(name.to_string(), ownership);
        if let Some(original) = self.map.original_of(name) {
            self.module_bindings.insert(original.to_string(), ownership);
        }
        if let Some(token) = self.map.get(name) {
            self.module_bindings.insert(token.to_string(), ownership);
        }
    }

    fn lookup(&self, name: &str) -> Option<Ownership> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    /// Whether an attribute name is eligible for renaming at access sites.
    pub fn renameable_attribute(&self, name: &str) -> bool {
        self.index.project_attributes.contains(name)
            || self.index.project_class_names.contains(name)
            || self.index.likely_local_attribute_names.contains(name)
    }

    /// Classify the receiver of an attribute access or dynamic-name call.
    pub fn attribute_ownership(&self, receiver: &Expr) -> Ownership {
        let Expr::Name(name) = receiver else {
            return Ownership::LikelyLocal;
        };
        let id = name.id.as_str();
        if let Some(tracked) = self.lookup(id) {
            return tracked;
        }
        if self.map.likely_local_symbols().contains(id) {
            return Ownership::LikelyLocal;
        }
        if self.index.external_names.contains(id) {
            return Ownership::External;
        }
        if let Some(ownership) = self.module_bindings.get(id) {
            return *ownership;
        }
        if id == "self" || id == "cls" {
            return Ownership::ProjectLocal;
        }
        Ownership::External
    }

    /// Infer ownership of an assigned value expression.
    pub fn value_ownership(&self, value: &Expr) -> Option<Ownership> {
        match value {
            Expr::Name(name) => {
                if let Some(tracked) = self.lookup(name.id.as_str()) {
                    return Some(tracked);
                }
                if self.map.likely_local_symbols().contains(name.id.as_str()) {
                    return Some(Ownership::LikelyLocal);
                }
                None
            }
            Expr::Call(call) => match call.func.as_ref() {
                Expr::Name(func) => {
                    let id = func.id.as_str();
                    if self.index.external_names.contains(id) {
                        return Some(Ownership::External);
                    }
                    if id == "enumerate" || SEQUENCE_BUILTINS.contains(&id) {
                        return call
                            .arguments
                            .args
                            .first()
                            .and_then(|arg| self.iter_ownership(arg));
                    }
                    if self.class_names.contains(id) {
                        return Some(Ownership::ProjectLocal);
                    }
                    // a project function's return value: one hop, no deeper
                    if self.map.get(id).is_some() || self.map.is_token(id) {
                        return Some(Ownership::LikelyLocal);
                    }
                    None
                }
                Expr::Attribute(attr) => {
                    let owner = self.attribute_ownership(&attr.value);
                    if owner.is_external() {
                        return Some(Ownership::External);
                    }
                    if self.class_names.contains(attr.attr.as_str()) {
                        return Some(Ownership::ProjectLocal);
                    }
                    if self.attribute_names.contains(attr.attr.as_str()) {
                        return Some(Ownership::LikelyLocal);
                    }
                    None
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Infer element ownership for an iterable in a loop or comprehension.
    pub fn iter_ownership(&self, iterable: &Expr) -> Option<Ownership> {
        match iterable {
            Expr::Name(name) => self.lookup(name.id.as_str()),
            Expr::Call(_) => self.value_ownership(iterable),
            Expr::Subscript(subscript) => self.iter_ownership(&subscript.value),
            Expr::Attribute(attr) => {
                let owner = self.attribute_ownership(&attr.value);
                if owner.is_external() {
                    return Some(Ownership::External);
                }
                if self.attribute_names.contains(attr.attr.as_str())
                    || self.class_names.contains(attr.attr.as_str())
                {
                    return Some(Ownership::LikelyLocal);
                }
                Some(owner)
            }
            _ => None,
        }
    }

    /// Infer ownership from a type annotation.
    pub fn annotation_ownership(&self, annotation: &Expr) -> Option<Ownership> {
        let mut names = Vec::new();
        collect_names(annotation, &mut names);
        if names.is_empty() {
            return None;
        }
        if names.iter().any(|name| self.class_names.contains(*name)) {
            return Some(Ownership::ProjectLocal);
        }
        Some(Ownership::External)
    }

    /// Seed verdicts for a function's parameters in the current scope.
    pub fn seed_parameters(&mut self, parameters: &Parameters) {
        for parameter in iter_parameters(parameters) {
            let name = parameter.name.as_str();
            if name == "self" || name == "cls" {
                self.record_binding(name, Ownership::ProjectLocal);
                continue;
            }
            match &parameter.annotation {
                None => self.record_binding(name, Ownership::LikelyLocal),
                Some(annotation) => {
                    if let Some(ownership) = self.annotation_ownership(annotation) {
                        self.record_binding(name, ownership);
                    }
                }
            }
        }
    }

    /// Recursively record a verdict for loop and comprehension targets.
    pub fn record_target(&mut self, target: &Expr, ownership: Ownership) {
        match target {
            Expr::Name(name) => self.record_binding(name.id.as_str(), ownership),
            Expr::Tuple(tuple) => {
                for element in &tuple.elts {
                    self.record_target(element, ownership);
                }
            }
            Expr::List(list) => {
                for element in &list.elts {
                    self.record_target(element, ownership);
                }
            }
            Expr::Starred(starred) => self.record_target(&starred.value, ownership),
            _ => {}
        }
    }

    /// Whether keyword arguments of a call should be renamed.
    ///
    /// Builtins and external callees keep their keyword names even when the
    /// receiver itself was renamed.
    pub fn should_rename_call_keywords(&self, func: &Expr) -> bool {
        match func {
            Expr::Name(name) => {
                let id = name.id.as_str();
                if self.index.external_names.contains(id) {
                    return false;
                }
                if let Some(Ownership::External) = self.module_bindings.get(id) {
                    return false;
                }
                self.class_names.contains(id) || self.map.get(id).is_some() || self.map.is_token(id)
            }
            Expr::Attribute(attr) => {
                !self.attribute_ownership(&attr.value).is_external()
                    && (self.attribute_names.contains(attr.attr.as_str())
                        || self.class_names.contains(attr.attr.as_str()))
            }
            _ => false,
        }
    }
}

/// Collect bare identifier names mentioned in an annotation expression.
fn collect_names<'e>(expr: &'e Expr, out: &mut Vec<&'e str>) {
    match expr {
        Expr::Name(name) => out.push(name.id.as_str()),
        Expr::Attribute(attr) => collect_names(&attr.value, out),
        Expr::Subscript(subscript) => {
            collect_names(&subscript.value, out);
            collect_names(&subscript.slice, out);
        }
        Expr::Tuple(tuple) => {
            for element in &tuple.elts {
                collect_names(element, out);
            }
        }
        Expr::List(list) => {
            for element in &list.elts {
                collect_names(element, out);
            }
        }
        Expr::BinOp(binop) => {
            collect_names(&binop.left, out);
            collect_names(&binop.right, out);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ruff_python_ast::{ModModule, Stmt};
    use ruff_python_parser::parse_module;

    use super::*;
    use crate::{indexer::index_project, mapper::build_rename_map};

    fn parse_test_module(source: &str) -> ModModule {
        let parsed = parse_module(source).expect("Failed to parse");
        parsed.into_syntax()
    }

    fn fixture(source: &str) -> (ProjectIndex, RenameMap) {
        let module = parse_test_module(source);
        let files = vec![(PathBuf::from("app.py"), &module)];
        let index = index_project(&files);
        let map = build_rename_map(&index).unwrap();
        (index, map)
    }

    fn first_assign_value(source: &str) -> Expr {
        let module = parse_test_module(source);
        match module.body.into_iter().next().unwrap() {
            Stmt::Assign(assign) => *assign.value,
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_project_constructor_is_project_local() {
        let (index, map) = fixture("class Widget:\n    pass\n");
        let resolver = OwnershipResolver::new(&index, &map);
        let value = first_assign_value("w = Widget()\n");
        assert_eq!(
            resolver.value_ownership(&value),
            Some(Ownership::ProjectLocal)
        );
    }

    #[test]
    fn test_external_call_is_external() {
        let (index, map) = fixture("import argparse\n\nclass Widget:\n    pass\n");
        let resolver = OwnershipResolver::new(&index, &map);
        let value = first_assign_value("ns = argparse.Namespace()\n");
        assert_eq!(resolver.value_ownership(&value), Some(Ownership::External));
    }

    #[test]
    fn test_sequence_builtins_propagate_element_ownership() {
        let (index, map) = fixture("class Record:\n    pass\n");
        let mut resolver = OwnershipResolver::new(&index, &map);
        resolver.record_binding("rows", Ownership::ProjectLocal);
        for source in [
            "out = sorted(rows)\n",
            "out = list(rows)\n",
            "out = enumerate(rows)\n",
            "out = reversed(rows)\n",
        ] {
            let value = first_assign_value(source);
            assert_eq!(
                resolver.value_ownership(&value),
                Some(Ownership::ProjectLocal),
                "failed for {source}"
            );
        }
    }

    #[test]
    fn test_slicing_propagates_ownership() {
        let (index, map) = fixture("class Record:\n    pass\n");
        let mut resolver = OwnershipResolver::new(&index, &map);
        resolver.record_binding("rows", Ownership::ProjectLocal);
        let value = first_assign_value("head = rows[1:3]\n");
        let Expr::Subscript(_) = &value else {
            panic!("expected subscript");
        };
        assert_eq!(
            resolver.iter_ownership(&value),
            Some(Ownership::ProjectLocal)
        );
    }

    #[test]
    fn test_annotation_ownership() {
        let (index, map) = fixture("class Record:\n    pass\n");
        let resolver = OwnershipResolver::new(&index, &map);
        let project = first_assign_value("x = list[Record]\n");
        assert_eq!(
            resolver.annotation_ownership(&project),
            Some(Ownership::ProjectLocal)
        );
        let external = first_assign_value("x = argparse.Namespace\n");
        assert_eq!(
            resolver.annotation_ownership(&external),
            Some(Ownership::External)
        );
    }

    #[test]
    fn test_unannotated_parameter_seeds_likely_local() {
        let (index, map) = fixture("class Widget:\n    pass\n");
        let mut resolver = OwnershipResolver::new(&index, &map);
        let module = parse_test_module("def f(x, w: Widget):\n    pass\n");
        let Stmt::FunctionDef(func) = &module.body[0] else {
            panic!("expected function");
        };
        resolver.push_scope();
        resolver.seed_parameters(&func.parameters);
        let x = first_assign_value("y = x\n");
        assert_eq!(resolver.value_ownership(&x), Some(Ownership::LikelyLocal));
        let w = first_assign_value("y = w\n");
        assert_eq!(resolver.value_ownership(&w), Some(Ownership::ProjectLocal));
    }

    #[test]
    fn test_method_return_one_hop() {
        let (index, map) = fixture(
            r"
class Store:
    def records(self):
        return []
",
        );
        let mut resolver = OwnershipResolver::new(&index, &map);
        resolver.record_binding("store", Ownership::ProjectLocal);
        let value = first_assign_value("rows = store.records()\n");
        assert_eq!(
            resolver.value_ownership(&value),
            Some(Ownership::LikelyLocal)
        );
    }

    #[test]
    fn test_builtin_keywords_not_renamed() {
        let (index, map) = fixture("class Record:\n    pass\n\ndef load(key):\n    pass\n");
        let resolver = OwnershipResolver::new(&index, &map);
        let sorted_call = first_assign_value("out = sorted(rows, key=f)\n");
        let Expr::Call(call) = &sorted_call else {
            panic!("expected call");
        };
        assert!(!resolver.should_rename_call_keywords(&call.func));
        let project_call = first_assign_value("out = load(key=1)\n");
        let Expr::Call(call) = &project_call else {
            panic!("expected call");
        };
        assert!(resolver.should_rename_call_keywords(&call.func));
    }

    #[test]
    fn test_scope_pop_discards_bindings() {
        let (index, map) = fixture("class Widget:\n    pass\n");
        let mut resolver = OwnershipResolver::new(&index, &map);
        resolver.push_scope();
        resolver.record_binding("w", Ownership::ProjectLocal);
        resolver.pop_scope();
        let value = first_assign_value("y = w\n");
        assert_eq!(resolver.value_ownership(&value), None);
    }
}
