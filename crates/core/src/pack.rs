//! Pack declarations — named, reusable content blocks.
//!
//! A pack is either static text, a retriever query, or a fully nested
//! context. The kind is a closed sum type: the resolver has exactly one
//! exhaustive match over it, so adding a kind is a compile-time-checked
//! exercise.

use serde::{Deserialize, Serialize};

use crate::declaration::{ContextDecl, MessageSpec, PackBudgetSpec};
use crate::error::Result;
use crate::template::Template;

/// What a pack resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PackKind {
    /// Template or literal content; no external call.
    Static {
        /// The pack body (content or template, exactly one).
        body: MessageSpec,
    },

    /// An external retrieval under a computed budget.
    Retriever {
        /// Rendered to produce the query string sent to the retriever.
        query_template: Template,

        /// Elastic pack: eligible for the grow-to-fill expansion loop
        /// when the assembled output has unused headroom.
        #[serde(default)]
        paginate: bool,
    },

    /// A fully nested context assembly.
    Nested {
        /// The inner declaration. Must not declare `history`.
        context: Box<ContextDecl>,
    },
}

/// A named pack, registered in the pack registry and looked up by name
/// from context declarations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackDecl {
    /// The registered name.
    pub name: String,

    /// What this pack resolves to.
    #[serde(flatten)]
    pub kind: PackKind,

    /// This pack's claim on the shared pool.
    pub pack_budget: PackBudgetSpec,

    /// Compactor applied when this pack's text must shrink; falls back
    /// to the context's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compactor: Option<String>,
}

impl PackDecl {
    /// A static pack holding literal content.
    pub fn static_content(
        name: impl Into<String>,
        text: impl Into<String>,
        pack_budget: PackBudgetSpec,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PackKind::Static {
                body: MessageSpec::content(text),
            },
            pack_budget,
            compactor: None,
        }
    }

    /// A static pack holding a template.
    pub fn static_template(
        name: impl Into<String>,
        raw: impl Into<String>,
        pack_budget: PackBudgetSpec,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PackKind::Static {
                body: MessageSpec::template(raw),
            },
            pack_budget,
            compactor: None,
        }
    }

    /// A retriever pack.
    pub fn retriever(
        name: impl Into<String>,
        query_template: impl Into<String>,
        pack_budget: PackBudgetSpec,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PackKind::Retriever {
                query_template: Template::new(query_template),
                paginate: false,
            },
            pack_budget,
            compactor: None,
        }
    }

    /// A nested-context pack.
    pub fn nested(
        name: impl Into<String>,
        context: ContextDecl,
        pack_budget: PackBudgetSpec,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PackKind::Nested {
                context: Box::new(context),
            },
            pack_budget,
            compactor: None,
        }
    }

    /// Mark a retriever pack as paginated (no-op for other kinds).
    pub fn with_pagination(mut self) -> Self {
        if let PackKind::Retriever { paginate, .. } = &mut self.kind {
            *paginate = true;
        }
        self
    }

    pub fn with_compactor(mut self, name: impl Into<String>) -> Self {
        self.compactor = Some(name.into());
        self
    }

    /// Whether the regeneration loop may re-resolve this pack at a
    /// smaller budget (static packs are compacted in place instead).
    pub fn is_regenerable(&self) -> bool {
        !matches!(self.kind, PackKind::Static { .. })
    }

    /// Whether the expansion loop may grow this pack into headroom.
    pub fn is_paginated(&self) -> bool {
        matches!(self.kind, PackKind::Retriever { paginate: true, .. })
    }

    /// Validate the declaration. The nested-history rule is checked at
    /// resolution time, not here, because the violation is only
    /// observable when the pack is actually resolved as nested.
    pub fn validate(&self) -> Result<()> {
        self.pack_budget.validate()?;
        match &self.kind {
            PackKind::Static { body } => body.validate(),
            PackKind::Retriever { .. } => Ok(()),
            PackKind::Nested { context } => context.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::BudgetSpec;
    use crate::error::Error;

    #[test]
    fn static_packs_are_not_regenerable() {
        let pack = PackDecl::static_content("notes", "text", PackBudgetSpec::max_tokens(10));
        assert!(!pack.is_regenerable());
        assert!(!pack.is_paginated());
    }

    #[test]
    fn retriever_packs_regenerate_and_may_paginate() {
        let pack = PackDecl::retriever("evidence", "{question}", PackBudgetSpec::ratio(0.5));
        assert!(pack.is_regenerable());
        assert!(!pack.is_paginated());
        assert!(pack.with_pagination().is_paginated());
    }

    #[test]
    fn nested_packs_are_regenerable_but_never_paginated() {
        let inner = ContextDecl::new(
            MessageSpec::content("sys"),
            MessageSpec::content("hi"),
            BudgetSpec::max_tokens(50),
        );
        let pack = PackDecl::nested("inner", inner, PackBudgetSpec::ratio(0.5));
        assert!(pack.is_regenerable());
        assert!(!pack.clone().with_pagination().is_paginated());
    }

    #[test]
    fn validation_reaches_the_inner_declaration() {
        let inner = ContextDecl::new(
            MessageSpec::content("sys"),
            MessageSpec::content("hi"),
            BudgetSpec::default(), // invalid
        );
        let pack = PackDecl::nested("inner", inner, PackBudgetSpec::ratio(0.5));
        assert!(matches!(pack.validate(), Err(Error::BudgetSpec)));
    }

    #[test]
    fn kind_tag_round_trips_through_serde() {
        let pack = PackDecl::retriever("evidence", "q: {question}", PackBudgetSpec::ratio(0.4));
        let json = serde_json::to_string(&pack).unwrap();
        assert!(json.contains("\"kind\":\"retriever\""));
        let back: PackDecl = serde_json::from_str(&json).unwrap();
        assert!(matches!(back.kind, PackKind::Retriever { .. }));
    }
}
