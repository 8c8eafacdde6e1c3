//! Regeneration/expansion controller — the shrink-and-retry loop and
//! its grow-to-fill mirror image.
//!
//! The loop re-invokes retriever-backed and nested packs at tightened
//! budgets while any piece overruns its grant or the assembled total
//! exceeds the pool, bounded by a hard iteration cap; at the cap,
//! forced compaction makes the output fit deterministically regardless
//! of retriever behavior. When the total lands under the pool and a
//! paginated pack is present, the symmetric expansion loop fills the
//! headroom. A pack is shrunk or grown within one run, never both.

use futures::future::join_all;
use tracing::{debug, warn};

use ctxweave_budget::{Claimant, allocate};
use ctxweave_core::error::Result;
use ctxweave_core::pack::PackDecl;
use ctxweave_core::template::Vars;

use crate::assembler::Assembler;
use crate::resolver::PackResolver;

/// Hard cap on shrink iterations per run, and on expansion rounds per
/// pack. Termination is guaranteed by this cap plus forced compaction,
/// independent of retriever cooperation.
pub(crate) const MAX_ITERATIONS: usize = 5;

/// Shrunk budgets never fall below one token.
const MIN_PACK_BUDGET: usize = 1;

/// Per-pack working state for one assembly run.
#[derive(Debug)]
pub(crate) struct PackSlot {
    /// The pack declaration (cloned out of the registry).
    pub decl: PackDecl,
    /// The budget currently granted to this pack.
    pub granted: usize,
    /// The current rendered text.
    pub text: String,
    /// Evidence items already shown (pagination offset).
    pub items_shown: usize,
    /// Token budget of every resolver call, in order.
    pub invocations: Vec<usize>,
    /// This pack was shrunk this run (excludes it from expansion).
    pub shrunk: bool,
    /// This pack's text was compacted to fit its grant.
    pub compacted: bool,
}

impl PackSlot {
    pub fn new(decl: PackDecl, granted: usize) -> Self {
        Self {
            decl,
            granted,
            text: String::new(),
            items_shown: 0,
            invocations: Vec::new(),
            shrunk: false,
            compacted: false,
        }
    }
}

/// Drives one run's pack slots to a budget-compliant terminal state.
pub(crate) struct Controller<'a> {
    pub assembler: &'a Assembler,
    pub vars: &'a Vars,
    /// The owning context's default compactor name.
    pub default_compactor: Option<&'a str>,
    pub depth: usize,
}

impl Controller<'_> {
    /// Resolve every slot, converge on the pool ceiling, and return the
    /// number of shrink/expansion iterations used.
    pub async fn run(&self, slots: &mut [PackSlot], pool: usize) -> Result<usize> {
        let resolver = PackResolver {
            assembler: self.assembler,
        };

        // Initial resolution: every pack once, at its allocated budget.
        // Sibling packs have no data dependencies, so their (possibly
        // suspending) resolutions run concurrently; join_all preserves
        // the declared order.
        let all: Vec<usize> = (0..slots.len()).collect();
        self.resolve_into(&resolver, slots, &all).await?;

        let mut iterations = 0;
        while self.over_budget(slots, pool) && iterations < MAX_ITERATIONS {
            iterations += 1;
            let progressed = self.shrink_once(&resolver, slots, pool, iterations).await?;
            if !progressed {
                // Every shrinkable budget is already at the floor;
                // further retries would repeat the same calls.
                break;
            }
        }

        if self.over_budget(slots, pool) {
            warn!(
                pool,
                total = self.total(slots),
                "Shrink loop exhausted over budget, forcing compaction"
            );
        }

        // Per-piece compaction: every piece must end at or under its
        // grant, whether we got here by convergence or by the cap.
        for slot in slots.iter_mut() {
            if self.tokens(&slot.text) > slot.granted {
                slot.text = self.compact(slot, slot.granted)?;
                slot.compacted = true;
            }
        }

        // Explicitly declared grants can sum above the pool even with
        // every piece at its own grant. Rescale the grants so they fit
        // and cut once more; the output must land under the pool no
        // matter what was declared.
        if self.total(slots) > pool {
            let claimants: Vec<Claimant> = slots
                .iter()
                .map(|slot| Claimant {
                    weight: slot.granted.max(1) as f64,
                    priority: 0,
                    minimum: slot.granted,
                })
                .collect();
            let rescaled = allocate(pool, &claimants);
            debug!(pool, ?rescaled, "Grants exceed pool, rescaling");
            for (slot, grant) in slots.iter_mut().zip(rescaled) {
                slot.granted = grant;
                if self.tokens(&slot.text) > grant {
                    slot.text = self.compact(slot, grant)?;
                    if self.tokens(&slot.text) > grant {
                        // The bound compactor may decline to cut (a
                        // summary with no sentence boundary); the pool
                        // ceiling is not negotiable.
                        slot.text = self.assembler.accountant().truncate(&slot.text, grant);
                    }
                    slot.compacted = true;
                }
            }
        }

        iterations += self.expand(&resolver, slots, pool).await?;
        Ok(iterations)
    }

    /// The loop keeps running while the pieces overrun the pool as a
    /// whole, or any regenerable piece overruns its own grant (the
    /// grant is the regeneration unit in explicit mode).
    fn over_budget(&self, slots: &[PackSlot], pool: usize) -> bool {
        if self.total(slots) > pool {
            return true;
        }
        slots
            .iter()
            .any(|slot| slot.decl.is_regenerable() && self.tokens(&slot.text) > slot.granted)
    }

    /// One over-budget iteration: compact static pieces in place, then
    /// shrink each regenerable pack's budget proportionally to its
    /// current allocation and re-resolve only the shrunk ones. Returns
    /// whether any piece actually changed.
    async fn shrink_once(
        &self,
        resolver: &PackResolver<'_>,
        slots: &mut [PackSlot],
        pool: usize,
        iteration: usize,
    ) -> Result<bool> {
        let mut progressed = false;

        // Static pieces have no external call to repeat; they are
        // compacted in place instead of re-resolved.
        for slot in slots.iter_mut() {
            if !slot.decl.is_regenerable() && self.tokens(&slot.text) > slot.granted {
                slot.text = self.compact(slot, slot.granted)?;
                slot.compacted = true;
                progressed = true;
            }
        }

        let static_tokens: usize = slots
            .iter()
            .filter(|slot| !slot.decl.is_regenerable())
            .map(|slot| self.tokens(&slot.text))
            .sum();
        let regen_tokens: usize = slots
            .iter()
            .filter(|slot| slot.decl.is_regenerable())
            .map(|slot| self.tokens(&slot.text))
            .sum();
        if regen_tokens == 0 {
            return Ok(progressed);
        }

        // Pool overflow scales every regenerable pack down; a piece
        // overrunning its own grant scales that pack alone. The
        // effective factor is the tighter of the two.
        let available = pool.saturating_sub(static_tokens);
        let global_scale = if self.total(slots) > pool {
            available as f64 / regen_tokens as f64
        } else {
            1.0
        };

        let mut shrunk_indices = Vec::new();
        for (index, slot) in slots.iter_mut().enumerate() {
            if !slot.decl.is_regenerable() {
                continue;
            }
            let actual = self.tokens(&slot.text);
            let grant_scale = if actual > slot.granted {
                slot.granted as f64 / actual as f64
            } else {
                1.0
            };
            let scale = global_scale.min(grant_scale);
            if scale >= 1.0 {
                continue;
            }
            // Proportional to the current allocation, floored at one
            // token, and strictly below the previous budget so
            // repeated iterations always make progress.
            let scaled = (slot.granted as f64 * scale).floor() as usize;
            let next = scaled
                .min(slot.granted.saturating_sub(1))
                .max(MIN_PACK_BUDGET);
            if next == slot.granted {
                // Already at the floor; repeating the call at the same
                // budget cannot help.
                continue;
            }
            debug!(
                pack = %slot.decl.name,
                iteration,
                from = slot.granted,
                to = next,
                "Shrinking pack budget"
            );
            slot.granted = next;
            slot.shrunk = true;
            shrunk_indices.push(index);
        }

        if !shrunk_indices.is_empty() {
            self.resolve_into(resolver, slots, &shrunk_indices).await?;
            progressed = true;
        }
        Ok(progressed)
    }

    /// Grow paginated packs into unused pool headroom, appending later
    /// evidence pages, up to the per-pack iteration cap.
    async fn expand(
        &self,
        resolver: &PackResolver<'_>,
        slots: &mut [PackSlot],
        pool: usize,
    ) -> Result<usize> {
        let mut rounds = 0;
        for index in 0..slots.len() {
            if !slots[index].decl.is_paginated() || slots[index].shrunk {
                continue;
            }
            for _ in 0..MAX_ITERATIONS {
                let total = self.total(slots);
                let headroom = pool.saturating_sub(total);
                if headroom == 0 {
                    break;
                }
                let slot = &mut slots[index];
                let allowed = self.tokens(&slot.text) + headroom;
                let offset = slot.items_shown;
                debug!(
                    pack = %slot.decl.name,
                    headroom,
                    offset,
                    "Expanding paginated pack"
                );
                let resolved = resolver
                    .resolve(&slot.decl, headroom, self.vars, offset, self.depth)
                    .await?;
                slot.invocations.push(headroom);
                rounds += 1;
                if resolved.items == 0 || resolved.text.trim().is_empty() {
                    break; // no more content available
                }
                slot.items_shown += resolved.items;
                if slot.text.is_empty() {
                    slot.text = resolved.text;
                } else {
                    slot.text = format!("{}\n{}", slot.text, resolved.text);
                }
                if self.tokens(&slot.text) > allowed {
                    slot.text = self.assembler.accountant().truncate(&slot.text, allowed);
                    slot.granted = slot.granted.max(allowed);
                    break;
                }
                slot.granted = slot.granted.max(self.tokens(&slot.text));
            }
        }
        Ok(rounds)
    }

    /// Resolve the given slot indices concurrently, recording each
    /// call's budget in the slot's invocation trace.
    async fn resolve_into(
        &self,
        resolver: &PackResolver<'_>,
        slots: &mut [PackSlot],
        indices: &[usize],
    ) -> Result<()> {
        let view: &[PackSlot] = &*slots;
        let futures: Vec<_> = indices
            .iter()
            .map(|&index| {
                let slot = &view[index];
                resolver.resolve(&slot.decl, slot.granted, self.vars, 0, self.depth)
            })
            .collect();
        let results = join_all(futures).await;
        for (&index, result) in indices.iter().zip(results) {
            let resolved = result?;
            let slot = &mut slots[index];
            slot.invocations.push(slot.granted);
            slot.text = resolved.text;
            slot.items_shown = resolved.items;
        }
        Ok(())
    }

    fn compact(&self, slot: &PackSlot, budget: usize) -> Result<String> {
        let name = slot
            .decl
            .compactor
            .as_deref()
            .or(self.default_compactor)
            .unwrap_or("truncate");
        let compactor = self.assembler.compactors().get(name)?;
        compactor.compact(&slot.text, budget, self.assembler.accountant())
    }

    fn tokens(&self, text: &str) -> usize {
        self.assembler.accountant().count(text)
    }

    fn total(&self, slots: &[PackSlot]) -> usize {
        slots.iter().map(|slot| self.tokens(&slot.text)).sum()
    }
}
