//! # ctxweave Core
//!
//! Domain types, traits, and error definitions for the ctxweave
//! context-assembly engine. This crate defines the declarative model —
//! contexts, packs, budgets, templates — that the budget, compact, and
//! assembly crates implement against.
//!
//! ## Design Philosophy
//!
//! Declarations are validated once, then shared read-only across
//! assembly invocations. External capabilities (retrieval) are traits
//! here; implementations live with the host. All lookup tables are
//! explicit values passed into the assembler — no ambient globals.

pub mod declaration;
pub mod error;
pub mod message;
pub mod pack;
pub mod registry;
pub mod retrieve;
pub mod template;

// Re-export key types at crate root for ergonomics
pub use declaration::{
    AssemblyMode, BudgetSpec, ContextDecl, HistorySpec, MessageSpec, PackBudgetSpec, PackRef,
    PackRefInput, PackRefItem,
};
pub use error::{Error, Result};
pub use message::{RenderedMessage, Role, Turn};
pub use pack::{PackDecl, PackKind};
pub use registry::{ContextRegistry, PackRegistry};
pub use retrieve::{EvidenceItem, RetrievalBudget, Retriever};
pub use template::{Template, Vars};
