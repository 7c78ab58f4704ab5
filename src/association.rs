// SPDX-License-Identifier: AGPL-3.0-or-later
//! Phylogeny–trait association metrics.
//!
//! Two classic statistics for how strongly a binary trait (here: region
//! membership) clusters on a tree, computable for the full tree or any
//! introduction subtree:
//!
//! - **MC** — monophyletic clade size (Salemi et al. 2005): the largest
//!   entirely-IN clade, found as the longest run of IN leaves in the
//!   depth-first leaf order. Large for strong correlation.
//! - **AI** — association index (Wang et al. 2005): sum over internal
//!   nodes of `(1 - max(in, out) / total) / 2^(total - 1)`. Small for
//!   strong correlation. Computed over a reverse breadth-first order so
//!   each internal node reuses its children's leaf counts instead of
//!   re-walking the subtree.
//!
//! Parker et al. 2008 (*Infect Genet Evol* 8:239-246) reviews both.
//!
//! # Permutation null
//!
//! [`permuted_association_index`] replaces every direct leaf child's
//! observed state with an independent Bernoulli draw at the subtree's
//! baseline IN frequency `p = in_leaves / all_leaves`, comparing a
//! uniform unit draw strictly against `p`. Repeated draws give a null
//! AI distribution for the same tree shape and sample density.
//!
//! # PRNG
//!
//! Uses a sovereign Lehmer LCG for reproducibility without external
//! dependencies. Not cryptographic — purely for the permutation null.

use crate::error::{Error, Result};
use crate::mat::{MatTree, NodeId};
use std::collections::HashMap;

/// Sovereign Lehmer LCG — deterministic, no external dependencies.
///
/// Uses Knuth's constants for full-period 64-bit LCG.
pub struct Lcg64 {
    state: u64,
}

impl Lcg64 {
    const MULT: u64 = 6_364_136_223_846_793_005;
    const INC: u64 = 1_442_695_040_888_963_407;

    /// Create a new LCG seeded with the given value.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_mul(Self::MULT).wrapping_add(Self::INC),
        }
    }

    /// Advance state and return raw `u64`.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(Self::MULT).wrapping_add(Self::INC);
        self.state
    }

    /// Uniform `f64` in `[0, 1)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / ((1_u64 << 53) as f64)
    }
}

/// Longest run of IN leaves (`confidence >= 0.5`) in the depth-first
/// leaf order of the subtree rooted at `subroot` (tree root if `None`).
///
/// Returns 0 when the subtree holds no IN leaves.
#[must_use]
pub fn monophyletic_cladesize(
    tree: &MatTree,
    assignments: &[f64],
    subroot: Option<NodeId>,
) -> u64 {
    let mut biggest = 0_u64;
    let mut current = 0_u64;
    for id in tree.depth_first_expansion(subroot) {
        if !tree.node(id).is_leaf() {
            continue;
        }
        if assignments[id] >= 0.5 {
            current += 1;
        } else {
            biggest = biggest.max(current);
            current = 0;
        }
    }
    biggest.max(current)
}

/// Association index of the subtree rooted at `subroot` (tree root if
/// `None`) under the observed assignment.
///
/// # Errors
///
/// Returns [`Error::TreeInvariant`] if an internal child is reached
/// before its own leaf counts were recorded — impossible on a
/// well-formed breadth-first order and a sign of a corrupted traversal.
pub fn association_index(
    tree: &MatTree,
    assignments: &[f64],
    subroot: Option<NodeId>,
) -> Result<f64> {
    association_index_impl(tree, assignments, subroot, None)
}

/// Association index with every direct leaf child's state replaced by a
/// Bernoulli draw at the subtree's baseline IN frequency.
///
/// # Errors
///
/// Same failure mode as [`association_index`].
pub fn permuted_association_index(
    tree: &MatTree,
    assignments: &[f64],
    subroot: Option<NodeId>,
    rng: &mut Lcg64,
) -> Result<f64> {
    association_index_impl(tree, assignments, subroot, Some(rng))
}

#[allow(clippy::cast_precision_loss)]
fn association_index_impl(
    tree: &MatTree,
    assignments: &[f64],
    subroot: Option<NodeId>,
    mut permute: Option<&mut Lcg64>,
) -> Result<f64> {
    let bfs = tree.breadth_first_expansion(subroot);

    // Baseline IN frequency across the subtree's leaves, for the null.
    let in_probability = if permute.is_some() {
        let mut leaves = 0_u64;
        let mut in_leaves = 0_u64;
        for &id in &bfs {
            if tree.node(id).is_leaf() {
                leaves += 1;
                if assignments[id] > 0.5 {
                    in_leaves += 1;
                }
            }
        }
        if leaves == 0 {
            0.0
        } else {
            in_leaves as f64 / leaves as f64
        }
    } else {
        0.0
    };

    let mut total_ai = 0.0_f64;
    let mut tracker: HashMap<NodeId, (u64, u64)> = HashMap::new();
    for &id in bfs.iter().rev() {
        let node = tree.node(id);
        if node.is_leaf() {
            continue;
        }
        let mut in_c = 0_u64;
        let mut out_c = 0_u64;
        for &child in &node.children {
            if tree.node(child).is_leaf() {
                let is_in = if let Some(rng) = permute.as_mut() {
                    rng.next_f64() < in_probability
                } else {
                    assignments[child] > 0.5
                };
                if is_in {
                    in_c += 1;
                } else {
                    out_c += 1;
                }
            } else {
                let (child_in, child_out) = tracker.get(&child).copied().ok_or_else(|| {
                    Error::TreeInvariant(format!(
                        "internal child {} reached before its leaf counts",
                        tree.node(child).identifier
                    ))
                })?;
                in_c += child_in;
                out_c += child_out;
            }
        }
        tracker.insert(id, (in_c, out_c));
        let total_leaves = in_c + out_c;
        let share = in_c.max(out_c) as f64 / total_leaves as f64;
        // 2^(total-1) saturates to +inf for huge subtrees; the term then
        // underflows to exactly 0, which is the intended limit
        total_ai += (1.0 - share) / ((total_leaves - 1) as f64).exp2();
    }
    Ok(total_ai)
}
