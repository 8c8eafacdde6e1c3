//! # ctxweave Assembly
//!
//! The budgeted context-assembly engine: pack resolution, the
//! regeneration/expansion controller, and the top-level assembler that
//! turns a declarative context into a final, size-bounded sequence of
//! role-tagged messages.
//!
//! # Pipeline
//!
//! | Stage | Component |
//! |-------|-----------|
//! | 1. Validate declaration | [`Assembler`] |
//! | 2. Resolve root budget | `ctxweave_budget` |
//! | 3. Allocate pack pool | `ctxweave_budget` |
//! | 4. Resolve packs | resolver (static / retriever / nested) |
//! | 5. Converge on budget | controller (shrink, force-compact, expand) |
//! | 6. Window history, render | [`Assembler`] |

mod controller;
mod resolver;

pub mod assembler;

pub use assembler::{
    AssembleOptions, AssembleTarget, AssembledContext, Assembler, AssemblyDiagnostics,
    PackBudgetUsage,
};

#[cfg(test)]
pub(crate) mod test_helpers;
