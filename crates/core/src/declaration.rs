//! Context declarations — the immutable, validated description of a prompt.
//!
//! A [`ContextDecl`] names its fixed messages, an optional history
//! slot, a token budget, and an ordered list of pack references. It is
//! validated once at load time (fail fast) and then reused read-only
//! across many assembly invocations.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::template::{Template, Vars};

// ── Message specs ─────────────────────────────────────────────────────────

/// A fixed message slot: literal `content` or a `template`, never both,
/// never neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSpec {
    /// Literal text, used verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Text with `{dotted.field}` placeholders resolved at assembly time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,
}

impl MessageSpec {
    /// A spec holding literal text.
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            template: None,
        }
    }

    /// A spec holding a template.
    pub fn template(raw: impl Into<String>) -> Self {
        Self {
            content: None,
            template: Some(Template::new(raw)),
        }
    }

    /// Exactly one of `content` / `template` must be set.
    pub fn validate(&self) -> Result<()> {
        match (&self.content, &self.template) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(Error::MessageSpec),
        }
    }

    /// Render this spec against assembly-time variables.
    pub fn render(&self, vars: &Vars) -> Result<String> {
        match (&self.content, &self.template) {
            (Some(text), None) => Ok(text.clone()),
            (None, Some(template)) => template.render(vars),
            _ => Err(Error::MessageSpec),
        }
    }

    /// Whether this spec's template references the given dotted path.
    pub fn references(&self, path: &str) -> bool {
        self.template
            .as_ref()
            .is_some_and(|t| t.references(path))
    }
}

// ── Budget specs ──────────────────────────────────────────────────────────

/// A token ceiling: a `ratio` of the parent ceiling, or an absolute
/// `max_tokens`. At least one must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetSpec {
    /// Fraction of the parent ceiling (e.g. a model context window).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,

    /// Absolute token ceiling. Wins over `ratio` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

impl BudgetSpec {
    pub fn ratio(ratio: f64) -> Self {
        Self {
            ratio: Some(ratio),
            max_tokens: None,
        }
    }

    pub fn max_tokens(max_tokens: usize) -> Self {
        Self {
            ratio: None,
            max_tokens: Some(max_tokens),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ratio.is_none() && self.max_tokens.is_none() {
            return Err(Error::BudgetSpec);
        }
        Ok(())
    }
}

/// A pack's share of the sibling pool: `default_ratio` or
/// `default_max_tokens` (the minimum claim), plus relative `weight` and
/// `priority` used when the pool cannot satisfy every claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackBudgetSpec {
    /// Fraction of the shared pool claimed as this pack's minimum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_ratio: Option<f64>,

    /// Absolute minimum claim in tokens. Wins over `default_ratio`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<usize>,

    /// Relative share among siblings when the pool runs short.
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Higher priorities are funded first.
    #[serde(default)]
    pub priority: i32,
}

fn default_weight() -> f64 {
    1.0
}

impl PackBudgetSpec {
    pub fn ratio(default_ratio: f64) -> Self {
        Self {
            default_ratio: Some(default_ratio),
            default_max_tokens: None,
            weight: 1.0,
            priority: 0,
        }
    }

    pub fn max_tokens(default_max_tokens: usize) -> Self {
        Self {
            default_ratio: None,
            default_max_tokens: Some(default_max_tokens),
            weight: 1.0,
            priority: 0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_ratio.is_none() && self.default_max_tokens.is_none() {
            return Err(Error::BudgetSpec);
        }
        Ok(())
    }

    /// View this pack budget as a plain [`BudgetSpec`] for resolution.
    pub fn as_budget(&self) -> BudgetSpec {
        BudgetSpec {
            ratio: self.default_ratio,
            max_tokens: self.default_max_tokens,
        }
    }
}

// ── Pack references ───────────────────────────────────────────────────────

/// A normalized reference from a context to a named pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackRef {
    /// The pack's registered name.
    pub name: String,

    /// Relative share among siblings; overrides the pack's own weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    /// Funding priority; overrides the pack's own priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl PackRef {
    /// A bare reference: `{name, weight: 1.0}`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: Some(1.0),
            priority: None,
        }
    }
}

/// One element of the `packs` field before normalization: a bare name
/// string or an already-structured mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PackRefItem {
    /// `"evidence"` — a bare name.
    Name(String),
    /// `{name: "evidence", weight: 2.0}` — passed through unchanged.
    Structured(PackRef),
}

/// The shape of the `packs` field as declared: a single payload or a
/// list. A single non-list payload is left untouched, not coerced into
/// a list before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PackRefInput {
    Many(Vec<PackRefItem>),
    One(PackRefItem),
}

impl PackRefItem {
    fn into_ref(self) -> PackRef {
        match self {
            PackRefItem::Name(name) => PackRef::named(name),
            PackRefItem::Structured(pack_ref) => pack_ref,
        }
    }
}

impl PackRefInput {
    /// Normalize to an ordered list of structured references.
    ///
    /// Bare names become `{name, weight: 1.0}`; lists normalize
    /// element-wise; structured mappings pass through unchanged.
    pub fn normalize(self) -> Vec<PackRef> {
        match self {
            PackRefInput::Many(items) => items.into_iter().map(PackRefItem::into_ref).collect(),
            PackRefInput::One(item) => vec![item.into_ref()],
        }
    }
}

// ── History & mode ────────────────────────────────────────────────────────

/// Declares that a context carries prior turns, and how they are
/// bounded. The turns themselves are per-invocation input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistorySpec {
    /// Budget for the history block. `None`: history consumes what
    /// remains of the root budget after messages and packs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetSpec>,

    /// Compactor applied to oversized turns; falls back to the
    /// context's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compactor: Option<String>,
}

/// How pack budgets are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyMode {
    /// Packs split one pool sized by the context's own budget.
    #[default]
    Shared,
    /// Each pack's own declared budget (resolved against the root
    /// budget) is the unit that regenerates and expands.
    Explicit,
}

// ── Context declaration ───────────────────────────────────────────────────

/// A named, declarative prompt: fixed messages, optional history,
/// budget, and an ordered pack list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextDecl {
    /// System message slot.
    pub system: MessageSpec,

    /// User message slot.
    pub user: MessageSpec,

    /// Optional assistant message slot (prefill).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant: Option<MessageSpec>,

    /// Optional prior-turn slot. Rejected inside nested packs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<HistorySpec>,

    /// The context's token ceiling.
    pub budget: BudgetSpec,

    /// Ordered pack references.
    #[serde(default)]
    pub packs: Vec<PackRef>,

    /// Default compactor name where none is specified per piece.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compactor: Option<String>,

    /// Budgeting mode for packs.
    #[serde(default)]
    pub mode: AssemblyMode,
}

impl ContextDecl {
    /// A minimal declaration; extend via struct update or the `with_*`
    /// builders.
    pub fn new(system: MessageSpec, user: MessageSpec, budget: BudgetSpec) -> Self {
        Self {
            system,
            user,
            assistant: None,
            history: None,
            budget,
            packs: Vec::new(),
            compactor: None,
            mode: AssemblyMode::Shared,
        }
    }

    pub fn with_packs(mut self, packs: PackRefInput) -> Self {
        self.packs = packs.normalize();
        self
    }

    pub fn with_history(mut self, history: HistorySpec) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_compactor(mut self, name: impl Into<String>) -> Self {
        self.compactor = Some(name.into());
        self
    }

    pub fn with_mode(mut self, mode: AssemblyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validate the declaration. Called once at registration (or on
    /// first use for inline declarations); assembly assumes it passed.
    pub fn validate(&self) -> Result<()> {
        self.system.validate()?;
        self.user.validate()?;
        if let Some(assistant) = &self.assistant {
            assistant.validate()?;
        }
        self.budget.validate()?;
        if let Some(history) = &self.history
            && let Some(budget) = &history.budget
        {
            budget.validate()?;
        }
        Ok(())
    }
}
