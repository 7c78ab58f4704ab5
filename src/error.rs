// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for landfall I/O and inference.
//!
//! All parsers and inference stages use [`Error`], with variants for each
//! failure mode. No external error crates — zero-dependency error type.
//! Every variant is fatal to the pipeline; there is no partial-result
//! recovery. Sample identifiers absent from the tree are *not* errors.

use std::fmt;
use std::path::PathBuf;

/// Errors produced by landfall parsers and inference stages.
#[derive(Debug)]
pub enum Error {
    /// File I/O error with path context.
    Io {
        /// Path that caused the error.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Samples file format error (3+ columns).
    Samples(String),
    /// Mutation-annotated tree table parsing error.
    TreeTable(String),
    /// Corrupted traversal state (an internal child was reached before
    /// its subtree record existed).
    TreeInvariant(String),
    /// NaN produced during ancestral-state assignment.
    Numeric(String),
}

/// Result type alias for landfall operations.
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Samples(msg) => write!(f, "samples file error: {msg}"),
            Self::TreeTable(msg) => write!(f, "tree table error: {msg}"),
            Self::TreeInvariant(msg) => write!(f, "tree invariant violated: {msg}"),
            Self::Numeric(msg) => write!(f, "numeric error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Samples(_) | Self::TreeTable(_) | Self::TreeInvariant(_) | Self::Numeric(_) => {
                None
            }
        }
    }
}
