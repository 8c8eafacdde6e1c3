//! # ctxweave Budget
//!
//! Token accounting and the budget model: resolving a declared ceiling
//! against a parent, and dividing a shared pool among weighted,
//! prioritized claimants. All arithmetic is integer-deterministic so
//! assembly results can be asserted exactly in tests.

pub mod accountant;
pub mod model;

pub use accountant::{TokenAccountant, WordAccountant};
pub use model::{Claimant, allocate, resolve};
