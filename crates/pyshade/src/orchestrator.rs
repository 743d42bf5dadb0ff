//! Transform sequencing
//!
//! Drives the whole obfuscation of a project tree: parse every file (any
//! parse error is fatal before anything is modified), build the project
//! index and rename map, then rewrite, validate, and write each file in
//! lexicographic path order. Already-written files are not reverted when a
//! later file fails.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use log::{debug, warn};
use ruff_python_ast::ModModule;
use ruff_python_codegen::Stylist;
use walkdir::WalkDir;

use crate::{
    error::{ObfuscateError, ObfuscateResult},
    indexer::index_project,
    mapper::build_rename_map,
    parser,
    rewriter::{RewriteWarning, rewrite_module},
};

/// Counters and warnings for one full transform run.
#[derive(Debug, Default)]
pub struct TransformSummary {
    pub python_files_discovered: usize,
    pub python_files_processed: usize,
    pub python_files_unchanged: usize,
    pub symbols_discovered: usize,
    pub symbols_renamed: usize,
    pub symbols_skipped_external: usize,
    pub symbols_renamed_likely_local: usize,
    pub dynamic_name_rewrites: usize,
    pub elapsed_ms: u64,
    pub warnings: Vec<RewriteWarning>,
}

/// Discover the Python files of a project tree, project-relative and in
/// lexicographic order.
pub fn discover_python_files(project_root: &Path) -> ObfuscateResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(project_root).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map_or_else(|| project_root.to_path_buf(), Path::to_path_buf);
            ObfuscateError::Io {
                path,
                source: err.into(),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().is_some_and(|ext| ext == "py")
            && let Ok(relative) = entry.path().strip_prefix(project_root)
        {
            files.push(relative.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Obfuscate every file of `file_set` (project-relative paths) in place
/// under `project_root`.
pub fn transform(project_root: &Path, file_set: &[PathBuf]) -> ObfuscateResult<TransformSummary> {
    let started = Instant::now();

    let mut ordered: Vec<PathBuf> = file_set.to_vec();
    ordered.sort();

    // Parse gate: every file must parse before anything is rewritten.
    let mut parsed_files = Vec::with_capacity(ordered.len());
    let mut parse_failures = Vec::new();
    for relative in &ordered {
        let absolute = project_root.join(relative);
        let source = fs::read_to_string(&absolute).map_err(|err| ObfuscateError::Io {
            path: absolute.clone(),
            source: err,
        })?;
        match parser::parse_source(relative, &source) {
            Ok(parsed) => parsed_files.push((relative.clone(), source, parsed)),
            Err(err) => {
                warn!("{err}");
                parse_failures.push(err);
            }
        }
    }
    if let Some(first) = parse_failures.into_iter().next() {
        return Err(first);
    }

    let modules: Vec<(PathBuf, &ModModule)> = parsed_files
        .iter()
        .map(|(relative, _, parsed)| (relative.clone(), parsed.syntax()))
        .collect();
    let index = index_project(&modules);
    drop(modules);
    let map = build_rename_map(&index)?;

    let mut summary = TransformSummary {
        python_files_discovered: ordered.len(),
        symbols_discovered: map.len(),
        symbols_skipped_external: index.external_names.len(),
        ..TransformSummary::default()
    };

    for (relative, source, parsed) in parsed_files {
        let stylist = Stylist::from_tokens(parsed.tokens(), &source);
        let mut module = parsed.into_syntax();
        let outcome = rewrite_module(&relative, &mut module, &index, &map);
        let output = parser::render_module(&module, &stylist, &source);
        parser::reparse_output(&relative, &output)?;

        summary.symbols_renamed += outcome.symbols_renamed;
        summary.symbols_renamed_likely_local += outcome.likely_local_rewrites;
        summary.dynamic_name_rewrites += outcome.dynamic_name_rewrites;
        if outcome.likely_local_rewrites > 0 {
            warn!(
                "applied {} likely-local rewrite(s) in {}",
                outcome.likely_local_rewrites,
                relative.display()
            );
        }
        summary.warnings.extend(outcome.warnings);

        if output == source {
            debug!("{} unchanged", relative.display());
            summary.python_files_unchanged += 1;
            summary.python_files_processed += 1;
            continue;
        }
        write_atomic(&project_root.join(&relative), &output)?;
        summary.python_files_processed += 1;
    }

    summary.elapsed_ms = started.elapsed().as_millis() as u64;
    Ok(summary)
}

/// Write through a sibling temp file so a crash never leaves a truncated
/// source file behind.
fn write_atomic(path: &Path, contents: &str) -> ObfuscateResult<()> {
    let tmp = path.with_extension("py.tmp");
    fs::write(&tmp, contents).map_err(|err| ObfuscateError::Io {
        path: tmp.clone(),
        source: err,
    })?;
    fs::rename(&tmp, path).map_err(|err| ObfuscateError::Io {
        path: path.to_path_buf(),
        source: err,
    })
}
