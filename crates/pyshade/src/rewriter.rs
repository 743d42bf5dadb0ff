//! AST-to-AST rename application
//!
//! Walks one parsed module and applies the rename map in place:
//! declarations, bare-name references, imports, attribute accesses, call
//! keywords, and the string arguments of reflective accessor calls. Plain
//! string literals are never touched; interpolated literals are rebuilt with
//! their static elements intact and only the embedded expressions rewritten.
//!
//! Dispatch is an explicit match over statement and expression kinds rather
//! than a visitor, because ownership scoping requires control over the visit
//! order (parameters seed a scope before the body is walked, loop targets
//! inherit from the iterable before the body sees them).

use std::path::{Path, PathBuf};

use log::debug;
use ruff_python_ast::{
    AtomicNodeIndex, Expr, ExprStringLiteral, FStringPart, Identifier,
    InterpolatedStringElement, InterpolatedStringElements, ModModule, Parameter, Parameters,
    Pattern, Stmt, StringLiteral, StringLiteralFlags, StringLiteralValue,
};
use ruff_text_size::{TextRange, TextSize};

use crate::{
    indexer::ProjectIndex,
    mapper::RenameMap,
    ownership::OwnershipResolver,
    types::{DynamicAccessKind, Ownership},
};

/// A non-fatal note about a rewrite applied on likely-local evidence.
#[derive(Debug, Clone)]
pub struct RewriteWarning {
    pub file: PathBuf,
    pub offset: u32,
    pub symbol: String,
    pub detail: &'static str,
}

impl std::fmt::Display for RewriteWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {} `{}`",
            self.file.display(),
            self.offset,
            self.detail,
            self.symbol
        )
    }
}

/// Counters and warnings produced by rewriting one file.
#[derive(Debug, Default)]
pub struct RewriteOutcome {
    pub symbols_renamed: usize,
    pub likely_local_rewrites: usize,
    pub dynamic_name_rewrites: usize,
    pub warnings: Vec<RewriteWarning>,
}

/// Apply the rename map to a parsed module in place.
pub fn rewrite_module(
    file: &Path,
    module: &mut ModModule,
    index: &ProjectIndex,
    map: &RenameMap,
) -> RewriteOutcome {
    let mut renamer = Renamer {
        file,
        map,
        resolver: OwnershipResolver::new(index, map),
        outcome: RewriteOutcome::default(),
    };
    // Scope bindings for this file's imports are known up front.
    if let Some(bindings) = index.imports.get(file) {
        for (bind_name, binding) in bindings {
            let ownership = if binding.is_project_module {
                Ownership::ProjectLocal
            } else {
                Ownership::External
            };
            renamer.resolver.record_import_binding(bind_name, ownership);
        }
    }
    for stmt in &mut module.body {
        renamer.rewrite_stmt(stmt);
    }
    renamer.outcome
}

struct Renamer<'a> {
    file: &'a Path,
    map: &'a RenameMap,
    resolver: OwnershipResolver<'a>,
    outcome: RewriteOutcome,
}

impl Renamer<'_> {
    fn rename_identifier(&mut self, ident: &mut Identifier) {
        if let Some(token) = self.map.get(ident.as_str()) {
            *ident = Identifier::new(token, ident.range);
            self.outcome.symbols_renamed += 1;
        }
    }

    fn warn(&mut self, offset: TextSize, symbol: &str, detail: &'static str) {
        self.outcome.warnings.push(RewriteWarning {
            file: self.file.to_path_buf(),
            offset: offset.to_u32(),
            symbol: symbol.to_string(),
            detail,
        });
    }

    fn rewrite_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::FunctionDef(func) => {
                for decorator in &mut func.decorator_list {
                    self.rewrite_expr(&mut decorator.expression);
                }
                self.resolver.push_scope();
                self.resolver.seed_parameters(&func.parameters);
                self.rewrite_parameters(&mut func.parameters);
                if let Some(returns) = &mut func.returns {
                    self.rewrite_expr(returns);
                }
                for stmt in &mut func.body {
                    self.rewrite_stmt(stmt);
                }
                self.resolver.pop_scope();
                self.rename_identifier(&mut func.name);
            }
            Stmt::ClassDef(class) => {
                for decorator in &mut class.decorator_list {
                    self.rewrite_expr(&mut decorator.expression);
                }
                if let Some(arguments) = &mut class.arguments {
                    for base in arguments.args.iter_mut() {
                        self.rewrite_expr(base);
                    }
                    for keyword in arguments.keywords.iter_mut() {
                        self.rewrite_expr(&mut keyword.value);
                    }
                }
                self.resolver.push_scope();
                for stmt in &mut class.body {
                    self.rewrite_stmt(stmt);
                }
                self.resolver.pop_scope();
                self.rename_identifier(&mut class.name);
            }
            Stmt::Assign(assign) => {
                self.rewrite_expr(&mut assign.value);
                for target in &mut assign.targets {
                    self.rewrite_expr(target);
                }
                if let Some(ownership) = self.resolver.value_ownership(&assign.value) {
                    for target in &assign.targets {
                        self.resolver.record_target(target, ownership);
                    }
                }
            }
            Stmt::AnnAssign(ann) => {
                self.rewrite_expr(&mut ann.annotation);
                self.rewrite_expr(&mut ann.target);
                if let Some(value) = &mut ann.value {
                    self.rewrite_expr(value);
                }
                let ownership = ann
                    .value
                    .as_ref()
                    .and_then(|value| self.resolver.value_ownership(value))
                    .or_else(|| self.resolver.annotation_ownership(&ann.annotation));
                if let Some(ownership) = ownership {
                    self.resolver.record_target(&ann.target, ownership);
                }
            }
            Stmt::AugAssign(aug) => {
                self.rewrite_expr(&mut aug.target);
                self.rewrite_expr(&mut aug.value);
            }
            Stmt::Return(ret) => {
                if let Some(value) = &mut ret.value {
                    self.rewrite_expr(value);
                }
            }
            Stmt::Delete(del) => {
                for target in &mut del.targets {
                    self.rewrite_expr(target);
                }
            }
            Stmt::For(for_stmt) => {
                if let Some(ownership) = self.resolver.iter_ownership(&for_stmt.iter) {
                    self.resolver.record_target(&for_stmt.target, ownership);
                }
                self.rewrite_expr(&mut for_stmt.iter);
                self.rewrite_expr(&mut for_stmt.target);
                for stmt in &mut for_stmt.body {
                    self.rewrite_stmt(stmt);
                }
                for stmt in &mut for_stmt.orelse {
                    self.rewrite_stmt(stmt);
                }
            }
            Stmt::While(while_stmt) => {
                self.rewrite_expr(&mut while_stmt.test);
                for stmt in &mut while_stmt.body {
                    self.rewrite_stmt(stmt);
                }
                for stmt in &mut while_stmt.orelse {
                    self.rewrite_stmt(stmt);
                }
            }
            Stmt::If(if_stmt) => {
                self.rewrite_expr(&mut if_stmt.test);
                for stmt in &mut if_stmt.body {
                    self.rewrite_stmt(stmt);
                }
                for clause in &mut if_stmt.elif_else_clauses {
                    if let Some(test) = &mut clause.test {
                        self.rewrite_expr(test);
                    }
                    for stmt in &mut clause.body {
                        self.rewrite_stmt(stmt);
                    }
                }
            }
            Stmt::With(with_stmt) => {
                for item in &mut with_stmt.items {
                    self.rewrite_expr(&mut item.context_expr);
                    if let Some(vars) = &mut item.optional_vars {
                        self.rewrite_expr(vars);
                    }
                }
                for stmt in &mut with_stmt.body {
                    self.rewrite_stmt(stmt);
                }
            }
            Stmt::Match(match_stmt) => {
                self.rewrite_expr(&mut match_stmt.subject);
                for case in &mut match_stmt.cases {
                    self.rewrite_pattern(&mut case.pattern);
                    if let Some(guard) = &mut case.guard {
                        self.rewrite_expr(guard);
                    }
                    for stmt in &mut case.body {
                        self.rewrite_stmt(stmt);
                    }
                }
            }
            Stmt::Raise(raise) => {
                if let Some(exc) = &mut raise.exc {
                    self.rewrite_expr(exc);
                }
                if let Some(cause) = &mut raise.cause {
                    self.rewrite_expr(cause);
                }
            }
            Stmt::Try(try_stmt) => {
                for stmt in &mut try_stmt.body {
                    self.rewrite_stmt(stmt);
                }
                for handler in &mut try_stmt.handlers {
                    let ruff_python_ast::ExceptHandler::ExceptHandler(eh) = handler;
                    if let Some(type_) = &mut eh.type_ {
                        self.rewrite_expr(type_);
                    }
                    if let Some(name) = &mut eh.name {
                        self.rename_identifier(name);
                    }
                    for stmt in &mut eh.body {
                        self.rewrite_stmt(stmt);
                    }
                }
                for stmt in &mut try_stmt.orelse {
                    self.rewrite_stmt(stmt);
                }
                for stmt in &mut try_stmt.finalbody {
                    self.rewrite_stmt(stmt);
                }
            }
            Stmt::Assert(assert) => {
                self.rewrite_expr(&mut assert.test);
                if let Some(msg) = &mut assert.msg {
                    self.rewrite_expr(msg);
                }
            }
            Stmt::Import(import) => {
                for alias in &mut import.names {
                    if alias.asname.is_none()
                        && !alias.name.contains('.')
                        && let Some(token) = self.map.get(alias.name.as_str())
                    {
                        // import x -> import x as <token>; references to x
                        // rename through the ordinary name path
                        alias.asname = Some(Identifier::new(token, TextRange::default()));
                        self.resolver
                            .record_import_binding(token, Ownership::ProjectLocal);
                        self.outcome.symbols_renamed += 1;
                    } else if let Some(asname) = &mut alias.asname {
                        self.rename_identifier(asname);
                    }
                }
            }
            Stmt::ImportFrom(import) => {
                for alias in &mut import.names {
                    if alias.name.as_str() == "*" {
                        continue;
                    }
                    self.rename_identifier(&mut alias.name);
                    if let Some(asname) = &mut alias.asname {
                        self.rename_identifier(asname);
                    }
                }
            }
            Stmt::Global(global) => {
                for name in &mut global.names {
                    self.rename_identifier(name);
                }
            }
            Stmt::Nonlocal(nonlocal) => {
                for name in &mut nonlocal.names {
                    self.rename_identifier(name);
                }
            }
            Stmt::Expr(expr_stmt) => self.rewrite_expr(&mut expr_stmt.value),
            Stmt::TypeAlias(type_alias) => {
                self.rewrite_expr(&mut type_alias.name);
                self.rewrite_expr(&mut type_alias.value);
            }
            Stmt::Pass(_) | Stmt::Break(_) | Stmt::Continue(_) | Stmt::IpyEscapeCommand(_) => {}
        }
    }

    fn rewrite_parameters(&mut self, parameters: &mut Parameters) {
        for param in parameters.posonlyargs.iter_mut().chain(&mut parameters.args) {
            if let Some(default) = &mut param.default {
                self.rewrite_expr(default);
            }
            self.rewrite_parameter(&mut param.parameter);
        }
        if let Some(vararg) = &mut parameters.vararg {
            self.rewrite_parameter(vararg);
        }
        for param in parameters.kwonlyargs.iter_mut() {
            if let Some(default) = &mut param.default {
                self.rewrite_expr(default);
            }
            self.rewrite_parameter(&mut param.parameter);
        }
        if let Some(kwarg) = &mut parameters.kwarg {
            self.rewrite_parameter(kwarg);
        }
    }

    fn rewrite_parameter(&mut self, parameter: &mut Parameter) {
        if let Some(annotation) = &mut parameter.annotation {
            self.rewrite_expr(annotation);
        }
        self.rename_identifier(&mut parameter.name);
    }

    fn rewrite_expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Name(name) => {
                if let Some(token) = self.map.get(name.id.as_str()) {
                    name.id = token.into();
                    self.outcome.symbols_renamed += 1;
                }
            }
            Expr::Attribute(attr) => {
                self.rewrite_expr(&mut attr.value);
                let Some(token) = self.map.get(attr.attr.as_str()).map(str::to_string) else {
                    return;
                };
                match self.resolver.attribute_ownership(&attr.value) {
                    Ownership::External => {}
                    Ownership::ProjectLocal => {
                        attr.attr = Identifier::new(token, attr.attr.range);
                        self.outcome.symbols_renamed += 1;
                    }
                    Ownership::LikelyLocal => {
                        // Unresolved receiver: rename only names backed by
                        // attribute evidence somewhere in the project.
                        if self.resolver.renameable_attribute(attr.attr.as_str()) {
                            self.outcome.likely_local_rewrites += 1;
                            self.warn(
                                attr.attr.range.start(),
                                attr.attr.as_str(),
                                "renamed attribute on likely-local evidence",
                            );
                            attr.attr = Identifier::new(token, attr.attr.range);
                            self.outcome.symbols_renamed += 1;
                        }
                    }
                }
            }
            Expr::Call(call) => {
                self.rewrite_expr(&mut call.func);
                for arg in call.arguments.args.iter_mut() {
                    self.rewrite_expr(arg);
                }
                for keyword in call.arguments.keywords.iter_mut() {
                    self.rewrite_expr(&mut keyword.value);
                }
                if self.resolver.should_rename_call_keywords(&call.func) {
                    let mut keyword_changed = false;
                    for keyword in call.arguments.keywords.iter_mut() {
                        let Some(arg) = &keyword.arg else {
                            continue;
                        };
                        let range = arg.range;
                        let Some(token) = self.map.get(arg.as_str()) else {
                            continue;
                        };
                        keyword.arg = Some(Identifier::new(token, range));
                        self.outcome.symbols_renamed += 1;
                        keyword_changed = true;
                    }
                    if keyword_changed {
                        self.outcome.likely_local_rewrites += 1;
                    }
                }
                self.rewrite_dynamic_name_call(call);
            }
            Expr::Lambda(lambda) => {
                self.resolver.push_scope();
                if let Some(parameters) = &mut lambda.parameters {
                    self.resolver.seed_parameters(parameters);
                    self.rewrite_parameters(parameters);
                }
                self.rewrite_expr(&mut lambda.body);
                self.resolver.pop_scope();
            }
            Expr::FString(fstring) => {
                for part in fstring.value.iter_mut() {
                    if let FStringPart::FString(inner) = part {
                        self.rewrite_interpolations(&mut inner.elements);
                    }
                }
            }
            Expr::BoolOp(boolop) => {
                for value in &mut boolop.values {
                    self.rewrite_expr(value);
                }
            }
            Expr::BinOp(binop) => {
                self.rewrite_expr(&mut binop.left);
                self.rewrite_expr(&mut binop.right);
            }
            Expr::UnaryOp(unary) => self.rewrite_expr(&mut unary.operand),
            Expr::Compare(compare) => {
                self.rewrite_expr(&mut compare.left);
                for comparator in compare.comparators.iter_mut() {
                    self.rewrite_expr(comparator);
                }
            }
            Expr::If(ternary) => {
                self.rewrite_expr(&mut ternary.test);
                self.rewrite_expr(&mut ternary.body);
                self.rewrite_expr(&mut ternary.orelse);
            }
            Expr::Named(named) => {
                self.rewrite_expr(&mut named.target);
                self.rewrite_expr(&mut named.value);
            }
            Expr::Dict(dict) => {
                for item in &mut dict.items {
                    if let Some(key) = &mut item.key {
                        self.rewrite_expr(key);
                    }
                    self.rewrite_expr(&mut item.value);
                }
            }
            Expr::Set(set) => {
                for element in &mut set.elts {
                    self.rewrite_expr(element);
                }
            }
            Expr::List(list) => {
                for element in &mut list.elts {
                    self.rewrite_expr(element);
                }
            }
            Expr::Tuple(tuple) => {
                for element in &mut tuple.elts {
                    self.rewrite_expr(element);
                }
            }
            Expr::ListComp(comp) => {
                self.seed_generators(&comp.generators);
                self.rewrite_expr(&mut comp.elt);
                self.rewrite_generators(&mut comp.generators);
            }
            Expr::SetComp(comp) => {
                self.seed_generators(&comp.generators);
                self.rewrite_expr(&mut comp.elt);
                self.rewrite_generators(&mut comp.generators);
            }
            Expr::DictComp(comp) => {
                self.seed_generators(&comp.generators);
                self.rewrite_expr(&mut comp.key);
                self.rewrite_expr(&mut comp.value);
                self.rewrite_generators(&mut comp.generators);
            }
            Expr::Generator(comp) => {
                self.seed_generators(&comp.generators);
                self.rewrite_expr(&mut comp.elt);
                self.rewrite_generators(&mut comp.generators);
            }
            Expr::Subscript(subscript) => {
                self.rewrite_expr(&mut subscript.value);
                self.rewrite_expr(&mut subscript.slice);
            }
            Expr::Slice(slice) => {
                if let Some(lower) = &mut slice.lower {
                    self.rewrite_expr(lower);
                }
                if let Some(upper) = &mut slice.upper {
                    self.rewrite_expr(upper);
                }
                if let Some(step) = &mut slice.step {
                    self.rewrite_expr(step);
                }
            }
            Expr::Starred(starred) => self.rewrite_expr(&mut starred.value),
            Expr::Await(await_expr) => self.rewrite_expr(&mut await_expr.value),
            Expr::Yield(yield_expr) => {
                if let Some(value) = &mut yield_expr.value {
                    self.rewrite_expr(value);
                }
            }
            Expr::YieldFrom(yield_from) => self.rewrite_expr(&mut yield_from.value),
            // Plain literals are never modified; template strings carry no
            // renameable surface this transform touches.
            Expr::StringLiteral(_)
            | Expr::BytesLiteral(_)
            | Expr::NumberLiteral(_)
            | Expr::BooleanLiteral(_)
            | Expr::NoneLiteral(_)
            | Expr::EllipsisLiteral(_)
            | Expr::TString(_)
            | Expr::IpyEscapeCommand(_) => {}
        }
    }

    /// Rewrite only the interpolation expressions of an f-string, leaving
    /// literal elements byte-identical.
    fn rewrite_interpolations(&mut self, elements: &mut InterpolatedStringElements) {
        for element in elements.iter_mut() {
            if let InterpolatedStringElement::Interpolation(interpolation) = element {
                self.rewrite_expr(&mut interpolation.expression);
                if let Some(spec) = &mut interpolation.format_spec {
                    self.rewrite_interpolations(&mut spec.elements);
                }
            }
        }
    }

    fn seed_generators(&mut self, generators: &[ruff_python_ast::Comprehension]) {
        for generator in generators {
            if let Some(ownership) = self.resolver.iter_ownership(&generator.iter) {
                self.resolver.record_target(&generator.target, ownership);
            }
        }
    }

    fn rewrite_generators(&mut self, generators: &mut [ruff_python_ast::Comprehension]) {
        for generator in generators {
            self.rewrite_expr(&mut generator.target);
            self.rewrite_expr(&mut generator.iter);
            for if_clause in &mut generator.ifs {
                self.rewrite_expr(if_clause);
            }
        }
    }

    /// Rewrite the literal name argument of `getattr`/`setattr`/`hasattr`
    /// when the receiver is project-owned or likely-local.
    fn rewrite_dynamic_name_call(&mut self, call: &mut ruff_python_ast::ExprCall) {
        let Expr::Name(callee) = call.func.as_ref() else {
            return;
        };
        if DynamicAccessKind::from_call_name(callee.id.as_str()).is_none() {
            return;
        }
        if call.arguments.args.len() < 2 {
            return;
        }
        let Expr::StringLiteral(literal) = &call.arguments.args[1] else {
            return;
        };
        let attr_name = literal.value.to_str().to_string();
        let Some(token) = self.map.get(&attr_name).map(str::to_string) else {
            return;
        };
        match self.resolver.attribute_ownership(&call.arguments.args[0]) {
            Ownership::External => return,
            Ownership::ProjectLocal => {}
            Ownership::LikelyLocal => {
                if !self.resolver.renameable_attribute(&attr_name) {
                    return;
                }
                self.outcome.likely_local_rewrites += 1;
                self.warn(
                    call.range.start(),
                    &attr_name,
                    "rewrote dynamic attribute name on likely-local evidence",
                );
            }
        }
        debug!(
            "dynamic rename {attr_name} -> {token} in {}",
            self.file.display()
        );
        call.arguments.args[1] = string_literal(&token);
        self.outcome.dynamic_name_rewrites += 1;
        self.outcome.symbols_renamed += 1;
    }

    fn rewrite_pattern(&mut self, pattern: &mut Pattern) {
        match pattern {
            Pattern::MatchValue(value) => self.rewrite_expr(&mut value.value),
            Pattern::MatchSingleton(_) => {}
            Pattern::MatchSequence(sequence) => {
                for pattern in &mut sequence.patterns {
                    self.rewrite_pattern(pattern);
                }
            }
            Pattern::MatchMapping(mapping) => {
                for key in &mut mapping.keys {
                    self.rewrite_expr(key);
                }
                for pattern in &mut mapping.patterns {
                    self.rewrite_pattern(pattern);
                }
                if let Some(rest) = &mut mapping.rest {
                    self.rename_identifier(rest);
                }
            }
            Pattern::MatchClass(class) => {
                self.rewrite_expr(&mut class.cls);
                for pattern in &mut class.arguments.patterns {
                    self.rewrite_pattern(pattern);
                }
                for keyword in &mut class.arguments.keywords {
                    self.rename_identifier(&mut keyword.attr);
                    self.rewrite_pattern(&mut keyword.pattern);
                }
            }
            Pattern::MatchStar(star) => {
                if let Some(name) = &mut star.name {
                    self.rename_identifier(name);
                }
            }
            Pattern::MatchAs(as_pattern) => {
                if let Some(pattern) = &mut as_pattern.pattern {
                    self.rewrite_pattern(pattern);
                }
                if let Some(name) = &mut as_pattern.name {
                    self.rename_identifier(name);
                }
            }
            Pattern::MatchOr(or_pattern) => {
                for pattern in &mut or_pattern.patterns {
                    self.rewrite_pattern(pattern);
                }
            }
        }
    }
}

/// Build a synthetic string literal carrying an obfuscated token.
fn string_literal(value: &str) -> Expr {
    Expr::StringLiteral(ExprStringLiteral {
        node_index: AtomicNodeIndex::dummy(),
        value: StringLiteralValue::single(StringLiteral {
            node_index: AtomicNodeIndex::dummy(),
            value: value.into(),
            flags: StringLiteralFlags::empty(),
            range: TextRange::default(),
        }),
        range: TextRange::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruff_python_codegen::Stylist;
    use ruff_python_parser::parse_module;

    use crate::{indexer::index_project, mapper::build_rename_map, parser::render_module};

    /// Index the given files, then rewrite and render each of them.
    fn transform(sources: &[(&str, &str)]) -> Vec<(String, RewriteOutcome)> {
        let modules: Vec<(PathBuf, ModModule)> = sources
            .iter()
            .map(|(path, source)| {
                let parsed = parse_module(source).expect("Failed to parse");
                (PathBuf::from(path), parsed.into_syntax())
            })
            .collect();
        let files: Vec<(PathBuf, &ModModule)> = modules
            .iter()
            .map(|(path, module)| (path.clone(), module))
            .collect();
        let index = index_project(&files);
        let map = build_rename_map(&index).unwrap();

        sources
            .iter()
            .map(|(path, source)| {
                let path = PathBuf::from(path);
                let parsed = parse_module(source).expect("Failed to parse");
                let stylist = Stylist::from_tokens(parsed.tokens(), source);
                let mut module = parsed.into_syntax();
                let outcome = rewrite_module(&path, &mut module, &index, &map);
                let output = render_module(&module, &stylist, source);
                parse_module(&output).expect("rewritten output must parse");
                (output, outcome)
            })
            .collect()
    }

    fn token_for(sources: &[(&str, &str)], name: &str) -> String {
        let modules: Vec<(PathBuf, ModModule)> = sources
            .iter()
            .map(|(path, source)| {
                let parsed = parse_module(source).expect("Failed to parse");
                (PathBuf::from(path), parsed.into_syntax())
            })
            .collect();
        let files: Vec<(PathBuf, &ModModule)> = modules
            .iter()
            .map(|(path, module)| (path.clone(), module))
            .collect();
        let index = index_project(&files);
        let map = build_rename_map(&index).unwrap();
        map.get(name).expect("name must be mapped").to_string()
    }

    #[test]
    fn test_multi_file_class_consistency() {
        let sources = [
            (
                "widgets.py",
                "class Widget:\n    def draw(self):\n        return 1\n",
            ),
            (
                "app.py",
                "from widgets import Widget\n\nw = Widget()\nw.draw()\n",
            ),
        ];
        let widget = token_for(&sources, "Widget");
        let draw = token_for(&sources, "draw");
        let outputs = transform(&sources);
        assert!(outputs[0].0.contains(&format!("class {widget}:")));
        assert!(outputs[0].0.contains(&format!("def {draw}(self):")));
        assert!(outputs[1].0.contains(&format!("from widgets import {widget}")));
        assert!(outputs[1].0.contains(&format!(".{draw}()")));
        assert!(!outputs[1].0.contains("Widget"));
    }

    #[test]
    fn test_plain_literal_untouched_interpolated_expression_rewritten() {
        let sources = [(
            "app.py",
            r#"
class Widget:
    def draw(self):
        return 1

widget = Widget()
greeting = "hello draw()"
message = f"result {widget.draw()}!"
"#,
        )];
        let draw = token_for(&sources, "draw");
        let widget_var = token_for(&sources, "widget");
        let outputs = transform(&sources);
        let output = &outputs[0].0;
        assert!(output.contains("\"hello draw()\""), "plain literal changed");
        assert!(output.contains(&format!("f\"result {{{widget_var}.{draw}()}}!\"")));
    }

    #[test]
    fn test_external_attribute_immunity() {
        let sources = [(
            "app.py",
            r"
import argparse

class Widget:
    def __init__(self):
        self.draw = 1

ns = argparse.Namespace()
print(ns.draw)

w = Widget()
print(w.draw)
",
        )];
        let draw = token_for(&sources, "draw");
        let ns = token_for(&sources, "ns");
        let outputs = transform(&sources);
        let output = &outputs[0].0;
        assert!(
            output.contains(&format!("{ns}.draw")),
            "external attribute was renamed"
        );
        assert!(output.contains(&format!(".{draw})")), "project attribute kept its name");
        assert!(output.contains("import argparse"));
    }

    #[test]
    fn test_dynamic_name_policy() {
        let sources = [(
            "app.py",
            r"
import os

class Widget:
    def __init__(self):
        self.state = 0

obj_a = Widget()
getattr(obj_a, 'state')
getattr(os, 'state')
",
        )];
        let state = token_for(&sources, "state");
        let outputs = transform(&sources);
        let (output, outcome) = &outputs[0];
        assert!(output.contains(&format!("'{state}'")) || output.contains(&format!("\"{state}\"")));
        assert!(output.contains("(os, 'state')"), "external receiver rewritten");
        assert_eq!(outcome.dynamic_name_rewrites, 1);
    }

    #[test]
    fn test_ownership_through_sorted_and_lambda() {
        let sources = [(
            "app.py",
            r"
class Record:
    def __init__(self):
        self.score = 0

def load() -> list[Record]:
    return []

rows: list[Record] = load()
for r in sorted(rows, key=lambda x: x.score):
    print(r.score)
",
        )];
        let record = token_for(&sources, "Record");
        let score = token_for(&sources, "score");
        let outputs = transform(&sources);
        let output = &outputs[0].0;
        assert!(output.contains(&format!("list[{record}]")));
        assert!(output.contains("key=lambda"), "builtin keyword was renamed");
        assert!(output.contains(&format!(".{score})")));
        assert!(!output.contains(".score"), "a score attribute survived");
    }

    #[test]
    fn test_likely_local_fallback_warns() {
        let sources = [(
            "app.py",
            r"
class Widget:
    def __init__(self):
        self.state = 0

def probe(x):
    return getattr(x, 'state')
",
        )];
        let state = token_for(&sources, "state");
        let outputs = transform(&sources);
        let (output, outcome) = &outputs[0];
        assert!(output.contains(&format!("'{state}'")) || output.contains(&format!("\"{state}\"")));
        assert!(outcome.likely_local_rewrites > 0);
        assert!(!outcome.warnings.is_empty());
        assert_eq!(outcome.warnings[0].symbol, "state");
    }

    #[test]
    fn test_dunder_names_invariant() {
        let sources = [(
            "app.py",
            r"
class Widget:
    def __init__(self):
        self.name = '__main__'

    def __repr__(self):
        return self.name

if __name__ == '__main__':
    Widget()
",
        )];
        let outputs = transform(&sources);
        let output = &outputs[0].0;
        assert!(output.contains("__init__"));
        assert!(output.contains("__repr__"));
        assert!(output.contains("__name__"));
        assert!(output.contains("'__main__'"));
    }

    #[test]
    fn test_plain_import_of_project_module_aliased() {
        let sources = [
            ("utils.py", "def helper():\n    return 1\n"),
            ("app.py", "import utils\n\nprint(utils.helper())\n"),
        ];
        let utils = token_for(&sources, "utils");
        let helper = token_for(&sources, "helper");
        let outputs = transform(&sources);
        let output = &outputs[1].0;
        assert!(output.contains(&format!("import utils as {utils}")));
        assert!(output.contains(&format!("{utils}.{helper}()")));
    }

    #[test]
    fn test_external_import_untouched() {
        let sources = [("app.py", "import json\n\nprint(json.dumps({}))\n")];
        let outputs = transform(&sources);
        let output = &outputs[0].0;
        assert!(output.contains("import json\n"));
        assert!(output.contains("json.dumps"));
    }

    #[test]
    fn test_keyword_arguments_on_project_callee() {
        let sources = [(
            "app.py",
            r"
def load(count):
    return count

value = load(count=3)
total = sorted([], key=None)
",
        )];
        let count = token_for(&sources, "count");
        let outputs = transform(&sources);
        let output = &outputs[0].0;
        assert!(output.contains(&format!("{count}=3")));
        assert!(output.contains("key=None"));
    }

    #[test]
    fn test_annotated_external_receiver_immune() {
        let sources = [(
            "app.py",
            r"
import argparse

class Widget:
    def __init__(self):
        self.draw = 1

def handle(ns: argparse.Namespace):
    return ns.draw
",
        )];
        let outputs = transform(&sources);
        let output = &outputs[0].0;
        // the parameter itself may be renamed; the attribute must not be
        assert!(output.contains(".draw"));
    }

    #[test]
    fn test_comprehension_targets_inherit_ownership() {
        let sources = [(
            "app.py",
            r"
class Record:
    def __init__(self):
        self.score = 0

rows: list[Record] = []
scores = [r.score for r in rows]
",
        )];
        let score = token_for(&sources, "score");
        let outputs = transform(&sources);
        let output = &outputs[0].0;
        assert!(output.contains(&format!(".{score} for")));
    }

    #[test]
    fn test_non_literal_dynamic_name_untouched() {
        let sources = [(
            "app.py",
            r"
class Widget:
    def __init__(self):
        self.state = 0

def probe(w, key):
    return getattr(w, key)
",
        )];
        let outputs = transform(&sources);
        let (_, outcome) = &outputs[0];
        assert_eq!(outcome.dynamic_name_rewrites, 0);
    }
}
