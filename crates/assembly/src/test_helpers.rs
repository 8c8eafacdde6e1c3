//! Shared test helpers for assembly tests.

use std::sync::Mutex;

use async_trait::async_trait;

use ctxweave_core::error::Result;
use ctxweave_core::retrieve::{EvidenceItem, RetrievalBudget, Retriever};
use ctxweave_core::template::Vars;

use crate::resolver::CHARS_PER_TOKEN;

/// Build a variable map from a JSON object literal.
pub(crate) fn vars(value: serde_json::Value) -> Vars {
    value.as_object().expect("vars must be an object").clone()
}

/// A retriever that returns a sequence of scripted responses.
///
/// Each call returns the next response in the queue; once the queue is
/// down to its last response, that response repeats. Every call's
/// budget is recorded for assertions.
pub(crate) struct SequenceRetriever {
    responses: Mutex<Vec<Vec<EvidenceItem>>>,
    calls: Mutex<Vec<RetrievalBudget>>,
}

impl SequenceRetriever {
    pub fn new(responses: Vec<Vec<EvidenceItem>>) -> Self {
        assert!(!responses.is_empty(), "need at least one scripted response");
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// One single-item response per text.
    pub fn scripted(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| vec![EvidenceItem::new(*text, format!("doc_{i}"), 1.0)])
                .collect(),
        )
    }

    /// The budgets of every call made so far.
    pub fn call_budgets(&self) -> Vec<RetrievalBudget> {
        self.calls.lock().unwrap().clone()
    }

    /// Character budgets converted back to tokens, per call.
    pub fn token_budgets(&self) -> Vec<usize> {
        self.call_budgets()
            .iter()
            .map(|budget| budget.max_characters.unwrap_or(0) / CHARS_PER_TOKEN)
            .collect()
    }
}

#[async_trait]
impl Retriever for SequenceRetriever {
    async fn query(&self, _query: &str, budget: &RetrievalBudget) -> Result<Vec<EvidenceItem>> {
        self.calls.lock().unwrap().push(budget.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            Ok(responses.remove(0))
        } else {
            Ok(responses[0].clone())
        }
    }
}

/// A retriever that ignores the budget entirely and always returns the
/// same text. Used to prove termination does not depend on retriever
/// cooperation.
pub(crate) struct StubbornRetriever {
    text: String,
    calls: Mutex<usize>,
}

impl StubbornRetriever {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Retriever for StubbornRetriever {
    async fn query(&self, _query: &str, _budget: &RetrievalBudget) -> Result<Vec<EvidenceItem>> {
        *self.calls.lock().unwrap() += 1;
        Ok(vec![EvidenceItem::new(self.text.clone(), "stubborn", 1.0)])
    }
}

/// A cooperative, paginated retriever: serves fixed pages in order,
/// honoring `offset` and including pages while they fit the character
/// budget (always at least one remaining page).
pub(crate) struct PagedRetriever {
    pages: Vec<String>,
    calls: Mutex<usize>,
}

impl PagedRetriever {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|page| page.to_string()).collect(),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Retriever for PagedRetriever {
    async fn query(&self, _query: &str, budget: &RetrievalBudget) -> Result<Vec<EvidenceItem>> {
        *self.calls.lock().unwrap() += 1;
        let max_characters = budget.max_characters.unwrap_or(usize::MAX);
        let mut items = Vec::new();
        let mut used = 0;
        for (index, page) in self.pages.iter().enumerate().skip(budget.offset) {
            if !items.is_empty() && used + page.len() > max_characters {
                break;
            }
            used += page.len();
            items.push(EvidenceItem::new(page.clone(), format!("page_{index}"), 1.0));
        }
        Ok(items)
    }
}
