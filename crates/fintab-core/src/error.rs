//! Error types for the fintab engine.
//!
//! Only configuration bugs are fatal. Malformed input degrades to skipped
//! rows or cells and a DEBUG log line; a document that extracts nothing
//! yields an empty answer list, never an error.

use thiserror::Error;

/// Errors surfaced by the fintab engine.
#[derive(Error, Debug)]
pub enum FintabError {
    /// A rule value is neither a regex nor a compilable pattern string.
    ///
    /// Raised at configuration load time and fatal: a rule table carrying a
    /// broken pattern must not be silently half-applied.
    #[error("bad pattern {pattern:?}: {reason}")]
    BadPattern {
        /// The offending pattern source.
        pattern: String,
        /// Compiler diagnostic for the pattern.
        reason: String,
    },

    /// A table grid that cannot be lifted at all (e.g. no cells).
    ///
    /// Most malformed-grid conditions are soft (skip and log); this variant
    /// exists for callers that want to distinguish "table yielded nothing"
    /// from "element was not a parsable table".
    #[error("malformed table: {0}")]
    MalformedTable(String),

    /// Invalid JSON in the element stream or a rule mapping.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias used across the fintab crates.
pub type Result<T> = std::result::Result<T, FintabError>;
