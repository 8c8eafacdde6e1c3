//! Token accounting — pluggable text-length measurement.
//!
//! The engine never tokenizes with a real model tokenizer; it measures
//! and truncates through this seam. The default accountant counts
//! whitespace-delimited words, which keeps every budget assertion in
//! the test suite exact.

/// Converts text to a length in abstract tokens, and truncates text to
/// a token count. Injected wherever sizes are measured.
pub trait TokenAccountant: Send + Sync {
    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize;

    /// Truncate `text` to at most `max_tokens` tokens.
    fn truncate(&self, text: &str, max_tokens: usize) -> String;
}

/// The default accountant: one token per whitespace-delimited word.
///
/// Truncation joins the first `max_tokens` words with single spaces, so
/// interior whitespace runs are normalized only when truncation
/// actually happens.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordAccountant;

impl TokenAccountant for WordAccountant {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        if self.count(text) <= max_tokens {
            return text.to_string();
        }
        text.split_whitespace()
            .take(max_tokens)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
