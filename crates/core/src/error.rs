//! Error types for the ctxweave domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Every failure mode
//! of declaration validation, lookup, and assembly has its own variant
//! with a stable, human-readable message. Nothing here is retried
//! automatically — the regeneration loop is a design feature of the
//! controller, not error recovery.

use thiserror::Error;

/// The top-level error type for all ctxweave operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // --- Declaration validation (surfaced at load time) ---
    #[error("Message spec must define exactly one of 'content' or 'template'")]
    MessageSpec,

    #[error("Budget spec must define either 'ratio' or 'max_tokens'")]
    BudgetSpec,

    // --- Lookup (surfaced at resolution time) ---
    #[error("Context '{0}' not defined")]
    ContextNotFound(String),

    #[error("Context pack '{0}' is not available")]
    PackNotFound(String),

    #[error("Compactor '{0}' not defined")]
    CompactorNotFound(String),

    #[error("Unknown compactor type: {0}")]
    UnknownCompactorType(String),

    // --- Resolution ---
    #[error("Nested context packs cannot include history()")]
    NestedHistory,

    #[error("Template placeholder '{0}' could not be resolved")]
    Template(String),

    #[error("Nested context recursion exceeded depth {0}")]
    RecursionDepth(usize),

    #[error("Retriever error: {0}")]
    Retriever(String),

    // --- Programmer errors (fatal, never user-recoverable) ---
    #[error("Compactor '{0}' does not implement compact()")]
    NotImplemented(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
