//! Import source classification
//!
//! Decides whether a dotted module path refers to a file inside the project
//! being transformed, to the standard library, or to a third-party package.
//! Project membership is derived purely from the transformed file set: a
//! module is project-local iff its top-level name matches a top-level entry
//! of the file set, considering `src/`-style and `tests/` layouts.

use std::path::Path;

use ruff_python_stdlib::sys;

use crate::types::FxIndexSet;

/// Python minor version used for standard-library membership checks.
const PYTHON_MINOR: u8 = 12;

/// Classification of an import's source module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    FirstParty,
    ThirdParty,
    StandardLibrary,
}

impl ImportKind {
    pub fn is_first_party(self) -> bool {
        matches!(self, ImportKind::FirstParty)
    }
}

/// Resolves dotted module paths against the project file set.
#[derive(Debug)]
pub struct ModuleClassifier {
    local_roots: FxIndexSet<String>,
}

impl ModuleClassifier {
    /// Build the classifier from project-relative source file paths.
    pub fn from_file_set<P: AsRef<Path>>(files: &[P]) -> Self {
        let mut local_roots = FxIndexSet::default();
        for file in files {
            let mut parts: Vec<String> = file
                .as_ref()
                .with_extension("")
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            if parts.last().is_some_and(|last| last == "__init__") {
                parts.pop();
            }
            let Some(root) = parts.first() else {
                continue;
            };
            local_roots.insert(root.clone());
            // With a src- or tests-rooted layout the importable package is
            // the directory one level down.
            if (root == "src" || root == "tests") && parts.len() >= 2 {
                local_roots.insert(parts[1].clone());
            }
        }
        Self { local_roots }
    }

    /// Top-level module names owned by the project.
    pub fn local_roots(&self) -> &FxIndexSet<String> {
        &self.local_roots
    }

    /// Whether a dotted module path resolves to a project file.
    pub fn is_project_module(&self, dotted: &str) -> bool {
        match dotted.split('.').next() {
            Some(root) => self.local_roots.contains(root),
            None => false,
        }
    }

    /// Classify a dotted module path.
    pub fn classify(&self, dotted: &str) -> ImportKind {
        if self.is_project_module(dotted) {
            ImportKind::FirstParty
        } else if is_stdlib_module(dotted) {
            ImportKind::StandardLibrary
        } else {
            ImportKind::ThirdParty
        }
    }
}

/// Check if a module is part of the Python standard library.
pub fn is_stdlib_module(module_name: &str) -> bool {
    if sys::is_known_standard_library(PYTHON_MINOR, module_name) {
        return true;
    }
    match module_name.split('.').next() {
        Some(top_level) => sys::is_known_standard_library(PYTHON_MINOR, top_level),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn classifier(paths: &[&str]) -> ModuleClassifier {
        let files: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
        ModuleClassifier::from_file_set(&files)
    }

    #[test]
    fn test_flat_layout_roots() {
        let c = classifier(&["app.py", "helpers.py"]);
        assert!(c.is_project_module("app"));
        assert!(c.is_project_module("helpers"));
        assert!(!c.is_project_module("os"));
    }

    #[test]
    fn test_package_layout_roots() {
        let c = classifier(&["widgets/__init__.py", "widgets/draw.py"]);
        assert!(c.is_project_module("widgets"));
        assert!(c.is_project_module("widgets.draw"));
    }

    #[test]
    fn test_src_layout_exposes_inner_package() {
        let c = classifier(&["src/cds/model.py", "tests/unit/test_model.py"]);
        assert!(c.is_project_module("cds"));
        assert!(c.is_project_module("cds.model"));
        assert!(c.is_project_module("unit"));
        assert!(!c.is_project_module("requests"));
    }

    #[test]
    fn test_classify_kinds() {
        let c = classifier(&["src/cds/model.py"]);
        assert_eq!(c.classify("cds.model"), ImportKind::FirstParty);
        assert_eq!(c.classify("json"), ImportKind::StandardLibrary);
        assert_eq!(c.classify("os.path"), ImportKind::StandardLibrary);
        assert_eq!(c.classify("requests"), ImportKind::ThirdParty);
    }
}
