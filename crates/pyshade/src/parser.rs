//! Parse facade over the ruff Python parser
//!
//! Parses one source file into a typed AST and renders a rewritten AST back
//! to source. Rendering goes statement-by-statement through the code
//! generator; within each statement every plain string and bytes literal is
//! restored to its original source bytes, since the generator re-escapes
//! literal values (multiline strings, raw strings, exotic escapes) in ways
//! the obfuscator must not observe.

use std::path::Path;

use ruff_python_ast::{
    Expr, ModModule, Stmt,
    visitor::{Visitor, walk_expr},
};
use ruff_python_codegen::{Generator, Stylist};
use ruff_python_parser::{Parsed, parse_module};
use ruff_text_size::Ranged;

use crate::error::{ObfuscateError, ObfuscateResult};

/// Parse one source file, reporting the failure position on error.
pub fn parse_source(path: &Path, source: &str) -> ObfuscateResult<Parsed<ModModule>> {
    parse_module(source).map_err(|err| ObfuscateError::Parse {
        path: path.to_path_buf(),
        message: format!(
            "{} at byte offset {}",
            err.error,
            err.location.start().to_usize()
        ),
    })
}

/// Render a (possibly rewritten) module back to source text.
///
/// The module's literal nodes must still carry their original ranges;
/// synthetic literals introduced by the rewriter use an empty range and are
/// rendered as-is.
pub fn render_module(module: &ModModule, stylist: &Stylist, source: &str) -> String {
    let mut rendered: Vec<String> = Vec::with_capacity(module.body.len());
    for stmt in &module.body {
        rendered.push(render_statement(stmt, stylist, source));
    }
    let mut output = rendered.join("\n");
    output.push('\n');
    output
}

/// Render one statement and restore its plain literals to their original
/// source bytes.
fn render_statement(stmt: &Stmt, stylist: &Stylist, source: &str) -> String {
    let mut collector = LiteralCollector {
        stylist,
        source,
        literals: Vec::new(),
    };
    collector.visit_stmt(stmt);

    let mut rendered = Generator::from(stylist).stmt(stmt);
    restore_literals(&mut rendered, &collector.literals);
    rendered
}

/// Collects (generated form, original source form) per plain literal of one
/// statement, in source order.
struct LiteralCollector<'a> {
    stylist: &'a Stylist<'a>,
    source: &'a str,
    literals: Vec<(String, String)>,
}

impl LiteralCollector<'_> {
    fn record(&mut self, expr: &Expr) {
        let generated = Generator::from(self.stylist).expr(expr);
        let range = expr.range();
        // Synthetic nodes (rewritten dynamic-name arguments) have an empty
        // range and no original form; they still take a slot so the cursor
        // stays aligned with the rendered text.
        let original = if range.is_empty() || range.end().to_usize() > self.source.len() {
            generated.clone()
        } else {
            self.source[std::ops::Range::<usize>::from(range)].to_string()
        };
        self.literals.push((generated, original));
    }
}

impl<'ast> Visitor<'ast> for LiteralCollector<'_> {
    fn visit_expr(&mut self, expr: &'ast Expr) {
        match expr {
            Expr::StringLiteral(_) | Expr::BytesLiteral(_) => self.record(expr),
            _ => {}
        }
        walk_expr(self, expr);
    }
}

/// Walk the rendered text left to right, swapping each literal's generated
/// form for its original form at that literal's own occurrence only.
///
/// Two distinct literals with identical content render to identical text;
/// a cursor over the literal sequence keeps each replacement anchored to
/// its own position instead of the first match in the statement.
fn restore_literals(rendered: &mut String, literals: &[(String, String)]) {
    let mut cursor = 0;
    for (generated, original) in literals {
        let Some(found) = rendered[cursor..].find(generated.as_str()) else {
            continue;
        };
        let start = cursor + found;
        let end = start + generated.len();
        if generated == original {
            cursor = end;
        } else {
            rendered.replace_range(start..end, original);
            cursor = start + original.len();
        }
    }
}

/// Render helper used by tests and the orchestrator's validation gate.
pub fn reparse_output(path: &Path, output: &str) -> ObfuscateResult<()> {
    parse_module(output)
        .map(|_| ())
        .map_err(|err| ObfuscateError::RewriteValidation {
            path: path.to_path_buf(),
            message: format!(
                "{} at byte offset {}",
                err.error,
                err.location.start().to_usize()
            ),
        })
}
