//! Retriever capability — the abstraction over external retrieval
//! backends.
//!
//! The engine does not retrieve anything itself: a retriever pack
//! renders a query string and hands it, with a budget, to whatever
//! implements [`Retriever`]. The only contract is cooperative: given a
//! smaller budget on a later call, the backend is *expected* (not
//! guaranteed) to return a smaller or differently-windowed result. The
//! controller's iteration cap is the actual termination guarantee.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A retriever's returned unit of text plus provenance. Opaque to the
/// engine beyond its rendered text and size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// The evidence text.
    pub text: String,

    /// Identifier of the source document or record.
    pub source_id: String,

    /// Backend-specific relevance score.
    pub score: f32,

    /// Optional (start, end) span within the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<(usize, usize)>,
}

impl EvidenceItem {
    pub fn new(text: impl Into<String>, source_id: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            source_id: source_id.into(),
            score,
            span: None,
        }
    }
}

/// The budget handed to a retriever call. All limits are best-effort
/// hints from the backend's point of view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalBudget {
    /// Maximum number of evidence items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,

    /// Maximum total characters across items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_characters: Option<usize>,

    /// Pagination offset: skip results already shown in this run.
    #[serde(default)]
    pub offset: usize,
}

impl RetrievalBudget {
    pub fn max_characters(max_characters: usize) -> Self {
        Self {
            max_items: None,
            max_characters: Some(max_characters),
            offset: 0,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// An external retrieval backend.
///
/// Must be callable repeatedly within one assembly run with different
/// budgets and offsets.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Answer `query` with an ordered list of evidence, best first.
    async fn query(&self, query: &str, budget: &RetrievalBudget) -> Result<Vec<EvidenceItem>>;
}
