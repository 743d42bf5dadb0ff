//! Error types for pyshade

use std::path::PathBuf;

use thiserror::Error;

/// Obfuscation error taxonomy
///
/// Every variant is fatal for the transform; non-fatal conditions travel as
/// warnings on the summary instead.
#[derive(Debug, Error)]
pub enum ObfuscateError {
    /// A source file failed to parse before the transform
    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// The rename mapper ran out of non-colliding tokens
    #[error("obfuscated token namespace exhausted after {allocated} symbols")]
    TokenSpaceExhausted { allocated: usize },

    /// A rewritten file no longer parses
    #[error("rewritten output for {path} does not parse: {message}")]
    RewriteValidation { path: PathBuf, message: String },

    /// Reading or writing a project file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for obfuscation operations
pub type ObfuscateResult<T> = Result<T, ObfuscateError>;
