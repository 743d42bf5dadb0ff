//! pyshade - project-wide identifier obfuscation for Python source trees
//!
//! The engine works in two passes over a project:
//!
//! 1. **Index**: every file is parsed and walked once, collecting
//!    declarations, import bindings, class attributes, dynamic-name call
//!    sites, and external names into an immutable [`indexer::ProjectIndex`].
//! 2. **Rewrite**: a single deterministic [`mapper::RenameMap`] is built
//!    from the index, then every file is rewritten AST-to-AST, consulting
//!    the [`ownership::OwnershipResolver`] to leave external receivers,
//!    dunder names, and plain string literals untouched. Each output file
//!    must re-parse before it is written.
//!
//! The [`orchestrator`] sequences the passes; the binary adds the
//! validation, gitignore-filtered copy, and reporting around them.

pub mod copy_tree;
pub mod error;
pub mod indexer;
pub mod mapper;
pub mod orchestrator;
pub mod ownership;
pub mod parser;
pub mod resolver;
pub mod rewriter;
pub mod types;

pub use copy_tree::{CopySummary, copy_project};
pub use error::{ObfuscateError, ObfuscateResult};
pub use indexer::{ProjectIndex, index_project};
pub use mapper::{RenameMap, build_rename_map};
pub use orchestrator::{TransformSummary, discover_python_files, transform};
pub use rewriter::{RewriteOutcome, RewriteWarning, rewrite_module};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
