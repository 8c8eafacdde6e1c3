//! Top-level assembly — from a context declaration to a final,
//! size-bounded sequence of role-tagged messages.
//!
//! The assembler owns the injected collaborators (registries, token
//! accountant, retriever) and orchestrates one invocation: validate,
//! resolve budgets, allocate the pack pool, drive the pack resolver
//! and the regeneration controller, window history, and render the
//! ordered message list. All per-invocation state is local, so
//! concurrent `assemble` calls are safe without locks.
//!
//! # Determinism
//!
//! Assembly is deterministic: identical inputs always produce
//! identical outputs. No random or time-dependent logic is used.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use ctxweave_budget::{Claimant, TokenAccountant, WordAccountant, allocate, resolve};
use ctxweave_compact::CompactorRegistry;
use ctxweave_core::declaration::{AssemblyMode, ContextDecl, HistorySpec};
use ctxweave_core::error::Result;
use ctxweave_core::message::{RenderedMessage, Role, Turn};
use ctxweave_core::registry::{ContextRegistry, PackRegistry};
use ctxweave_core::retrieve::Retriever;
use ctxweave_core::template::Vars;

use crate::controller::{Controller, PackSlot};

// ── Output types ──────────────────────────────────────────────────────────

/// The assembled context: ordered role-tagged messages plus run
/// diagnostics. Built fresh per invocation, no shared mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Final messages: system, history turns, user, assistant.
    pub messages: Vec<RenderedMessage>,
    /// Observability for tests and hosts.
    pub diagnostics: AssemblyDiagnostics,
}

impl AssembledContext {
    /// Convenience: the rendered text of the first message with `role`.
    pub fn text_of(&self, role: Role) -> Option<&str> {
        self.messages
            .iter()
            .find(|message| message.role == role)
            .map(|message| message.text.as_str())
    }
}

/// How one assembly run went.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyDiagnostics {
    /// Shrink plus expansion iterations beyond the initial resolution.
    pub iterations_used: usize,
    /// Total tokens across the final messages.
    pub final_token_count: usize,
    /// Per-pack budget outcomes, in declared order.
    pub pack_budgets: Vec<PackBudgetUsage>,
}

/// The budget story of one pack within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackBudgetUsage {
    /// Pack name.
    pub name: String,
    /// The budget finally granted.
    pub granted: usize,
    /// Tokens actually used by the final text.
    pub used_tokens: usize,
    /// Token budget of every resolver invocation, in order.
    pub invocations: Vec<usize>,
    /// Whether the text was compacted to fit its grant.
    pub compacted: bool,
}

/// What to assemble: a registered context by name, or an inline
/// declaration.
#[derive(Debug, Clone)]
pub enum AssembleTarget {
    Named(String),
    Inline(ContextDecl),
}

impl From<&str> for AssembleTarget {
    fn from(name: &str) -> Self {
        AssembleTarget::Named(name.to_string())
    }
}

impl From<ContextDecl> for AssembleTarget {
    fn from(decl: ContextDecl) -> Self {
        AssembleTarget::Inline(decl)
    }
}

/// Per-invocation inputs beyond the variable map.
#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    /// Prior turns for the declaration's `history` slot. Ignored when
    /// the context declares no history.
    pub history: Vec<Turn>,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The top-level orchestrator. Stateless across invocations — create
/// one and reuse it, concurrently if desired.
pub struct Assembler {
    contexts: ContextRegistry,
    packs: PackRegistry,
    compactors: CompactorRegistry,
    accountant: Arc<dyn TokenAccountant>,
    retriever: Arc<dyn Retriever>,
    /// The implicit parent ceiling for root budgets (a model's context
    /// window).
    window: usize,
}

impl Assembler {
    /// Create an assembler with the default word-count accountant.
    pub fn new(
        contexts: ContextRegistry,
        packs: PackRegistry,
        compactors: CompactorRegistry,
        retriever: Arc<dyn Retriever>,
        window: usize,
    ) -> Self {
        Self {
            contexts,
            packs,
            compactors,
            accountant: Arc::new(WordAccountant),
            retriever,
            window,
        }
    }

    /// Swap in a different token accountant.
    pub fn with_accountant(mut self, accountant: Arc<dyn TokenAccountant>) -> Self {
        self.accountant = accountant;
        self
    }

    pub(crate) fn accountant(&self) -> &dyn TokenAccountant {
        self.accountant.as_ref()
    }

    pub(crate) fn retriever(&self) -> &dyn Retriever {
        self.retriever.as_ref()
    }

    pub(crate) fn compactors(&self) -> &CompactorRegistry {
        &self.compactors
    }

    /// Assemble a context with history and other per-invocation options.
    pub async fn assemble(
        &self,
        target: impl Into<AssembleTarget>,
        vars: &Vars,
        options: &AssembleOptions,
    ) -> Result<AssembledContext> {
        match target.into() {
            AssembleTarget::Named(name) => {
                let decl = self.contexts.get(&name)?.clone();
                self.assemble_bounded(&decl, vars, &options.history, self.window, 0)
                    .await
            }
            AssembleTarget::Inline(decl) => {
                decl.validate()?;
                self.assemble_bounded(&decl, vars, &options.history, self.window, 0)
                    .await
            }
        }
    }

    /// Assemble with no history input.
    pub async fn assemble_with(
        &self,
        target: impl Into<AssembleTarget>,
        vars: &Vars,
    ) -> Result<AssembledContext> {
        self.assemble(target, vars, &AssembleOptions::default())
            .await
    }

    /// The recursive workhorse: assemble `decl` under `parent_ceiling`.
    ///
    /// Boxed because nested packs recurse through the pack resolver.
    pub(crate) fn assemble_bounded<'a>(
        &'a self,
        decl: &'a ContextDecl,
        vars: &'a Vars,
        history: &'a [Turn],
        parent_ceiling: usize,
        depth: usize,
    ) -> BoxFuture<'a, Result<AssembledContext>> {
        Box::pin(async move {
            // A ratio above 1.0 would otherwise resolve past the
            // ceiling; whatever the declaration says, the parent's
            // allocation is the hard bound.
            let root = resolve(&decl.budget, parent_ceiling)?.min(parent_ceiling);
            debug!(root, parent_ceiling, depth, "Assembling context");

            // Message shells: rendered with every pack empty, to
            // measure the tokens the fixed messages reserve.
            let shell_vars = self.vars_with_packs(vars, decl.packs.iter().map(|r| {
                (r.name.as_str(), String::new())
            }));
            let system_shell = decl.system.render(&shell_vars)?;
            let user_shell = decl.user.render(&shell_vars)?;
            let assistant_shell = decl
                .assistant
                .as_ref()
                .map(|spec| spec.render(&shell_vars))
                .transpose()?;
            let reserved = self.accountant.count(&system_shell)
                + self.accountant.count(&user_shell)
                + assistant_shell
                    .as_deref()
                    .map(|text| self.accountant.count(text))
                    .unwrap_or(0);

            // History with a declared budget reserves it up front; an
            // unbudgeted history slot takes whatever the packs leave.
            let declared_history_budget = decl
                .history
                .as_ref()
                .and_then(|spec| spec.budget.as_ref())
                .map(|spec| resolve(spec, root))
                .transpose()?;

            let after_messages = root.saturating_sub(reserved);
            let pack_space = after_messages.saturating_sub(declared_history_budget.unwrap_or(0));

            let mut slots = self.build_slots(decl, pack_space, root)?;

            // The controller's ceiling: with an unbudgeted history
            // slot, packs are confined to their grants and history
            // takes the leftover; otherwise the whole pack space is
            // the pool (paginated packs may grow into it).
            let granted_sum: usize = slots.iter().map(|slot| slot.granted).sum();
            let pool = if decl.history.is_some() && declared_history_budget.is_none() {
                granted_sum.min(pack_space)
            } else {
                pack_space
            };

            let controller = Controller {
                assembler: self,
                vars,
                default_compactor: decl.compactor.as_deref(),
                depth,
            };
            let iterations_used = controller.run(&mut slots, pool).await?;

            // History: newest-first sliding window within its budget.
            let history_messages = match &decl.history {
                Some(spec) => {
                    let used: usize = slots
                        .iter()
                        .map(|slot| self.accountant.count(&slot.text))
                        .sum();
                    let budget = declared_history_budget
                        .unwrap_or_else(|| after_messages.saturating_sub(used));
                    self.window_history(history, budget, spec, decl.compactor.as_deref())?
                }
                None => Vec::new(),
            };

            // Final render: substitute each pack's budget-compliant
            // text at its placeholder; packs referenced by no message
            // template are appended to the system message as blocks.
            let final_vars = self.vars_with_packs(
                vars,
                slots.iter().map(|slot| (slot.decl.name.as_str(), slot.text.clone())),
            );
            let mut system_text = decl.system.render(&final_vars)?;
            for slot in &slots {
                let path = format!("packs.{}", slot.decl.name);
                let referenced = decl.system.references(&path)
                    || decl.user.references(&path)
                    || decl
                        .assistant
                        .as_ref()
                        .is_some_and(|spec| spec.references(&path));
                if !referenced && !slot.text.is_empty() {
                    system_text = format!("{system_text}\n\n{}", slot.text);
                }
            }
            let user_text = decl.user.render(&final_vars)?;
            let assistant_text = decl
                .assistant
                .as_ref()
                .map(|spec| spec.render(&final_vars))
                .transpose()?;

            // Degenerate case: the fixed messages alone exceed the
            // root budget. The system piece is the one compacted.
            if reserved > root {
                let others = self.accountant.count(&user_text)
                    + assistant_text
                        .as_deref()
                        .map(|text| self.accountant.count(text))
                        .unwrap_or(0);
                let ceiling = root.saturating_sub(others).max(1);
                let compactor = self
                    .compactors
                    .get(decl.compactor.as_deref().unwrap_or("truncate"))?;
                system_text = compactor.compact(&system_text, ceiling, self.accountant())?;
            }

            let mut messages = Vec::with_capacity(3 + history_messages.len());
            messages.push(RenderedMessage::new(Role::System, system_text));
            messages.extend(history_messages);
            messages.push(RenderedMessage::new(Role::User, user_text));
            if let Some(text) = assistant_text {
                messages.push(RenderedMessage::new(Role::Assistant, text));
            }

            let final_token_count = messages
                .iter()
                .map(|message| self.accountant.count(&message.text))
                .sum();

            let pack_budgets = slots
                .into_iter()
                .map(|slot| PackBudgetUsage {
                    used_tokens: self.accountant.count(&slot.text),
                    name: slot.decl.name,
                    granted: slot.granted,
                    invocations: slot.invocations,
                    compacted: slot.compacted,
                })
                .collect();

            info!(
                final_token_count,
                iterations_used, root, "Context assembled"
            );

            Ok(AssembledContext {
                messages,
                diagnostics: AssemblyDiagnostics {
                    iterations_used,
                    final_token_count,
                    pack_budgets,
                },
            })
        })
    }

    /// Look up every referenced pack and grant its budget: a shared
    /// weighted/prioritized pool split in `Shared` mode, individually
    /// resolved declared budgets in `Explicit` mode.
    fn build_slots(
        &self,
        decl: &ContextDecl,
        pack_space: usize,
        root: usize,
    ) -> Result<Vec<PackSlot>> {
        let mut slots = Vec::with_capacity(decl.packs.len());
        match decl.mode {
            AssemblyMode::Shared => {
                let mut claimants = Vec::with_capacity(decl.packs.len());
                for pack_ref in &decl.packs {
                    let pack = self.packs.get(&pack_ref.name)?.clone();
                    let minimum = resolve(&pack.pack_budget.as_budget(), pack_space)?;
                    claimants.push(Claimant {
                        weight: pack_ref.weight.unwrap_or(pack.pack_budget.weight),
                        priority: pack_ref.priority.unwrap_or(pack.pack_budget.priority),
                        minimum,
                    });
                    slots.push(PackSlot::new(pack, 0));
                }
                for (slot, grant) in slots.iter_mut().zip(allocate(pack_space, &claimants)) {
                    slot.granted = grant;
                }
            }
            AssemblyMode::Explicit => {
                for pack_ref in &decl.packs {
                    let pack = self.packs.get(&pack_ref.name)?.clone();
                    let granted = resolve(&pack.pack_budget.as_budget(), root)?;
                    slots.push(PackSlot::new(pack, granted));
                }
            }
        }
        Ok(slots)
    }

    /// Include turns newest-first while they fit the budget, restoring
    /// chronological order afterwards. The window stops at the first
    /// turn that does not fit, so it is always a contiguous suffix of
    /// the conversation. If not even the newest turn fits, it is
    /// compacted to the budget and included alone.
    fn window_history(
        &self,
        turns: &[Turn],
        budget: usize,
        spec: &HistorySpec,
        default_compactor: Option<&str>,
    ) -> Result<Vec<RenderedMessage>> {
        if turns.is_empty() || budget == 0 {
            return Ok(Vec::new());
        }

        let mut included = Vec::new();
        let mut used = 0;
        for turn in turns.iter().rev() {
            let tokens = self.accountant.count(&turn.text);
            if used + tokens > budget {
                break;
            }
            included.push(RenderedMessage::new(turn.role, turn.text.clone()));
            used += tokens;
        }
        included.reverse();

        if included.is_empty()
            && let Some(newest) = turns.last()
        {
            let name = spec
                .compactor
                .as_deref()
                .or(default_compactor)
                .unwrap_or("truncate");
            let compactor = self.compactors.get(name)?;
            let text = compactor.compact(&newest.text, budget, self.accountant())?;
            included.push(RenderedMessage::new(newest.role, text));
        }

        Ok(included)
    }

    /// Clone the caller's vars and overlay a `packs` object mapping
    /// each pack name to its rendered text.
    fn vars_with_packs<'n>(
        &self,
        vars: &Vars,
        packs: impl Iterator<Item = (&'n str, String)>,
    ) -> Vars {
        let mut combined = vars.clone();
        let mut pack_map = serde_json::Map::new();
        for (name, text) in packs {
            pack_map.insert(name.to_string(), Value::String(text));
        }
        combined.insert("packs".to_string(), Value::Object(pack_map));
        combined
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
