//! Pack resolution — turning one pack declaration into text under an
//! allocated budget.
//!
//! One exhaustive match over [`PackKind`]: static packs render their
//! body, retriever packs query the external backend, nested packs
//! recurse into the assembler under a capped budget. Adding a pack
//! kind is a compile-time-checked exercise.

use tracing::debug;

use ctxweave_core::error::{Error, Result};
use ctxweave_core::pack::{PackDecl, PackKind};
use ctxweave_core::retrieve::RetrievalBudget;
use ctxweave_core::template::Vars;

use crate::assembler::Assembler;

/// Characters handed to a retriever per abstract token. Retrieval
/// backends think in characters; budgets here are tokens, so calls
/// carry a proportional character hint (~4 chars per BPE token on
/// English text).
pub(crate) const CHARS_PER_TOKEN: usize = 4;

/// Nested assemblies deeper than this fail instead of recursing.
/// The registry cannot express a direct self-reference, but indirect
/// cycles through several packs can only be caught here.
pub(crate) const MAX_NESTING_DEPTH: usize = 8;

/// The outcome of resolving one pack once.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedPack {
    /// The rendered text.
    pub text: String,
    /// Evidence items behind the text (retriever packs only); feeds
    /// the expansion loop's pagination offset.
    pub items: usize,
}

/// Resolves packs against the assembler's collaborators.
pub(crate) struct PackResolver<'a> {
    pub assembler: &'a Assembler,
}

impl PackResolver<'_> {
    /// Resolve `pack` at `allocated_budget` tokens.
    ///
    /// `offset` is the pagination offset for retriever packs (items
    /// already shown in this run); `depth` is the current nesting
    /// depth.
    pub async fn resolve(
        &self,
        pack: &PackDecl,
        allocated_budget: usize,
        vars: &Vars,
        offset: usize,
        depth: usize,
    ) -> Result<ResolvedPack> {
        match &pack.kind {
            PackKind::Static { body } => {
                let text = body.render(vars)?;
                Ok(ResolvedPack { text, items: 0 })
            }

            PackKind::Retriever { query_template, .. } => {
                let query = query_template.render(vars)?;
                let budget = RetrievalBudget {
                    max_items: None,
                    max_characters: Some(allocated_budget.saturating_mul(CHARS_PER_TOKEN)),
                    offset,
                };
                debug!(
                    pack = %pack.name,
                    tokens = allocated_budget,
                    offset,
                    "Invoking retriever"
                );
                let items = self.assembler.retriever().query(&query, &budget).await?;
                let count = items.len();
                let text = items
                    .into_iter()
                    .map(|item| item.text)
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(ResolvedPack { text, items: count })
            }

            PackKind::Nested { context } => {
                if context.history.is_some() {
                    return Err(Error::NestedHistory);
                }
                if depth >= MAX_NESTING_DEPTH {
                    return Err(Error::RecursionDepth(MAX_NESTING_DEPTH));
                }
                // The inner assembly resolves its own budget against
                // the outer allocation, so it can never exceed it.
                let inner = self
                    .assembler
                    .assemble_bounded(context, vars, &[], allocated_budget, depth + 1)
                    .await?;
                let text = inner
                    .messages
                    .into_iter()
                    .map(|message| message.text)
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Ok(ResolvedPack { text, items: 0 })
            }
        }
    }
}
