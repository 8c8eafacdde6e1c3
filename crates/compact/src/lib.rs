//! # ctxweave Compact
//!
//! Compaction strategies — pluggable `compact(text, budget) -> text`
//! implementations — and the registry that resolves them by name.
//! Forced compaction through these strategies is what makes the
//! controller's termination guarantee unconditional.

pub mod registry;
pub mod strategy;

pub use registry::{CompactorRegistry, CompactorSpec};
pub use strategy::{Compactor, SummaryCompactor, TruncateCompactor};
