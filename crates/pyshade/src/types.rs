//! Shared type definitions for the pyshade crate
//!
//! This module contains the small value types used across the indexing,
//! mapping, and rewriting phases, plus the deterministic hash-collection
//! aliases every component builds on.

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxBuildHasher;

/// Insertion-ordered map with the fast FxHash hasher.
///
/// Iteration order is insertion order, which keeps every derived artifact
/// (candidate sets, rename maps, counters) reproducible across runs.
pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Insertion-ordered set with the fast FxHash hasher.
pub type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

/// Classification of a declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// A module binding introduced by `import module`
    Module,
    /// A class definition
    Class,
    /// A function defined at module or function scope
    Function,
    /// A function defined directly in a class body
    Method,
    /// A function or lambda parameter
    Parameter,
    /// A name assigned at module or function scope
    Local,
    /// A name assigned in a class body or on `self`
    ClassAttribute,
    /// A binding introduced by `from module import name [as alias]`
    ImportAlias,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolKind::Module => write!(f, "module"),
            SymbolKind::Class => write!(f, "class"),
            SymbolKind::Function => write!(f, "function"),
            SymbolKind::Method => write!(f, "method"),
            SymbolKind::Parameter => write!(f, "parameter"),
            SymbolKind::Local => write!(f, "local"),
            SymbolKind::ClassAttribute => write!(f, "class_attribute"),
            SymbolKind::ImportAlias => write!(f, "import_alias"),
        }
    }
}

/// Ownership verdict for a usage site.
///
/// `None` in an `Option<Ownership>` means the site is unresolved: no rule
/// produced evidence either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// The receiver or bare name refers to a project-owned entity
    ProjectLocal,
    /// The receiver or bare name comes from outside the project
    External,
    /// No contrary evidence, but ownership could not be confirmed
    LikelyLocal,
}

impl Ownership {
    pub fn is_external(self) -> bool {
        matches!(self, Ownership::External)
    }

    pub fn is_likely_local(self) -> bool {
        matches!(self, Ownership::LikelyLocal)
    }
}

/// Confidence attached to a mapped symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// A declaration for the symbol was found in the project
    ResolvedLocal,
    /// Mapped on the no-contrary-evidence policy; reported as a warning
    LikelyLocal,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::ResolvedLocal => write!(f, "resolved_local"),
            Provenance::LikelyLocal => write!(f, "likely_local"),
        }
    }
}

/// The reflective accessor family a dynamic-name call site belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicAccessKind {
    Get,
    Set,
    Has,
}

impl DynamicAccessKind {
    /// Map a callee name to its accessor kind.
    pub fn from_call_name(name: &str) -> Option<Self> {
        match name {
            "getattr" => Some(DynamicAccessKind::Get),
            "setattr" => Some(DynamicAccessKind::Set),
            "hasattr" => Some(DynamicAccessKind::Has),
            _ => None,
        }
    }
}

/// Check whether a name starts and ends with a double underscore.
///
/// Dunder names are never renamed anywhere in the pipeline.
pub fn is_dunder(name: &str) -> bool {
    name.starts_with("__") && name.ends_with("__")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dunder_detection() {
        assert!(is_dunder("__init__"));
        assert!(is_dunder("__all__"));
        assert!(is_dunder("__"));
        assert!(is_dunder("____"));
        assert!(!is_dunder("_private"));
        assert!(!is_dunder("__dunderish"));
        assert!(!is_dunder("draw"));
    }

    #[test]
    fn test_dynamic_access_kind() {
        assert_eq!(
            DynamicAccessKind::from_call_name("getattr"),
            Some(DynamicAccessKind::Get)
        );
        assert_eq!(
            DynamicAccessKind::from_call_name("setattr"),
            Some(DynamicAccessKind::Set)
        );
        assert_eq!(
            DynamicAccessKind::from_call_name("hasattr"),
            Some(DynamicAccessKind::Has)
        );
        assert_eq!(DynamicAccessKind::from_call_name("delattr"), None);
    }
}
