//! The budget model: resolving declared ceilings and dividing a shared
//! pool among competing claimants.
//!
//! Allocation is grouped by descending priority. Within a group, every
//! claimant is granted its resolved minimum when the pool allows; a
//! group that does not fit splits the remaining pool proportionally to
//! weight and starves everything below it. Leftover headroom after all
//! groups are satisfied is returned unused — predictability over
//! greed.

use std::collections::BTreeMap;

use tracing::debug;

use ctxweave_core::declaration::BudgetSpec;
use ctxweave_core::error::{Error, Result};

/// Resolve a budget spec against a parent ceiling.
///
/// `max_tokens` wins when set, clamped so a child never exceeds its
/// parent; otherwise `round(ratio * parent_ceiling)`.
pub fn resolve(spec: &BudgetSpec, parent_ceiling: usize) -> Result<usize> {
    if let Some(max_tokens) = spec.max_tokens {
        return Ok(max_tokens.min(parent_ceiling));
    }
    if let Some(ratio) = spec.ratio {
        return Ok((ratio * parent_ceiling as f64).round() as usize);
    }
    Err(Error::BudgetSpec)
}

/// One pack's claim on a shared pool, derived from its pack budget spec
/// evaluated against the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Claimant {
    /// Relative share among same-priority siblings.
    pub weight: f64,
    /// Higher priorities are funded first.
    pub priority: i32,
    /// The resolved minimum this claimant asks for.
    pub minimum: usize,
}

/// Divide `pool` among `claimants`, returning grants aligned with the
/// input order.
///
/// Deterministic: equal priority and weight receive equal shares, and
/// rounding remainders go to the claimant with the lower ordinal
/// position in the declared list.
pub fn allocate(pool: usize, claimants: &[Claimant]) -> Vec<usize> {
    let mut grants = vec![0usize; claimants.len()];

    // Group claimant indices by priority; BTreeMap iterated in reverse
    // gives descending priority, and pushing in index order keeps the
    // declared ordering inside each group.
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (index, claimant) in claimants.iter().enumerate() {
        groups.entry(claimant.priority).or_default().push(index);
    }

    let mut remaining = pool;
    for (priority, members) in groups.iter().rev() {
        if remaining == 0 {
            break;
        }
        let total_minimum: usize = members.iter().map(|&i| claimants[i].minimum).sum();

        if total_minimum <= remaining {
            for &i in members {
                grants[i] = claimants[i].minimum;
            }
            remaining -= total_minimum;
            continue;
        }

        // The group's minimums do not fit: split what remains by
        // weight, then stop — lower-priority groups receive zero.
        debug!(
            priority,
            remaining, total_minimum, "Pool short for priority group, splitting by weight"
        );
        split_by_weight(remaining, members, claimants, &mut grants);
        return grants;
    }

    grants
}

/// Split `amount` across `members` proportionally to weight, flooring
/// each share and handing rounding remainders out by largest fractional
/// remainder, ties to the lower ordinal position. Remainders must
/// follow the fractions, not the declared order, or a heavier sibling
/// could end up with less than a lighter one.
fn split_by_weight(amount: usize, members: &[usize], claimants: &[Claimant], grants: &mut [usize]) {
    let total_weight: f64 = members.iter().map(|&i| claimants[i].weight.max(0.0)).sum();
    if total_weight <= 0.0 {
        // Degenerate weights: fall back to an even split.
        let even = amount / members.len();
        let mut leftover = amount - even * members.len();
        for &i in members {
            grants[i] = even;
            if leftover > 0 {
                grants[i] += 1;
                leftover -= 1;
            }
        }
        return;
    }

    let mut granted = 0usize;
    let mut remainders = Vec::with_capacity(members.len());
    for (position, &i) in members.iter().enumerate() {
        let exact = amount as f64 * claimants[i].weight.max(0.0) / total_weight;
        let share = exact.floor() as usize;
        grants[i] = share;
        granted += share;
        remainders.push((position, exact - share as f64));
    }

    remainders.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut leftover = amount - granted;
    for (position, _) in remainders {
        if leftover == 0 {
            break;
        }
        grants[members[position]] += 1;
        leftover -= 1;
    }
}
