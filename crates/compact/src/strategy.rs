//! Compaction strategies.
//!
//! A strategy shrinks text to fit a token budget. The base `compact`
//! has a default body that fails with a not-implemented fault: calling
//! a strategy that never overrode it indicates a missing registration,
//! a packaging defect rather than bad input.

use ctxweave_budget::TokenAccountant;
use ctxweave_core::error::{Error, Result};

/// A pluggable shrink strategy.
pub trait Compactor: Send + Sync {
    /// The name this strategy is registered under.
    fn name(&self) -> &str;

    /// Shrink `text` to at most `budget_tokens` tokens.
    ///
    /// The default body is the abstract contract point: invoking it
    /// is a programmer error, surfaced as [`Error::NotImplemented`].
    fn compact(
        &self,
        _text: &str,
        _budget_tokens: usize,
        _accountant: &dyn TokenAccountant,
    ) -> Result<String> {
        Err(Error::NotImplemented(self.name().to_string()))
    }
}

/// Keep the first `budget_tokens` tokens; under-budget text passes
/// through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncateCompactor;

impl Compactor for TruncateCompactor {
    fn name(&self) -> &str {
        "truncate"
    }

    fn compact(
        &self,
        text: &str,
        budget_tokens: usize,
        accountant: &dyn TokenAccountant,
    ) -> Result<String> {
        Ok(accountant.truncate(text, budget_tokens))
    }
}

/// Keep the first sentence, truncated to the budget.
///
/// Text with no sentence boundary at all is returned unchanged — "no
/// sentence" is treated as "nothing to summarize", not as overflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryCompactor;

impl Compactor for SummaryCompactor {
    fn name(&self) -> &str {
        "summary"
    }

    fn compact(
        &self,
        text: &str,
        budget_tokens: usize,
        accountant: &dyn TokenAccountant,
    ) -> Result<String> {
        let Some(boundary) = text.find(['.', '!', '?']) else {
            return Ok(text.to_string());
        };
        let first_sentence = text[..boundary].trim();
        Ok(accountant.truncate(first_sentence, budget_tokens))
    }
}
