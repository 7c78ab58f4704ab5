// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-region ancestral-state assignment.
//!
//! Labels every node with a confidence in `[0, 1]` that the node is IN
//! the region defined by a set of sample identifiers:
//!
//! 1. leaf: 1 if the leaf is in the set, else 0
//! 2. internal, all descendant leaves IN: 1
//! 3. internal, all descendant leaves OUT: 0
//! 4. internal, mixed: `c = 1 / (1 + (mi/iL) / (mo/oL))` where `mi` and
//!    `mo` are the mutation distances to the nearest IN and OUT
//!    descendant leaf and `iL`/`oL` the IN/OUT descendant leaf counts.
//!    An IN leaf identical to the node (`mi = 0`) forces 1; an identical
//!    OUT leaf forces 0.
//!
//! "Nearest" is positional, not metric: the first leaf of the class in
//! the depth-first expansion of the subtree. Its distance is the
//! mutation total along the chain from that leaf up to the queried node,
//! exclusive of the node's own incoming edge. Ties between equally
//! distant leaves therefore resolve in depth-first order.
//!
//! The whole labeling is a single bottom-up fold over the reversed
//! pre-order, O(N) for the full tree.

use crate::error::{Error, Result};
use crate::mat::{MatTree, NodeId};
use std::collections::HashSet;

/// Per-subtree fold state: leaf class counts and the distance to the
/// positionally-first leaf of each class.
#[derive(Clone, Copy, Default)]
struct SubtreeSummary {
    in_count: u64,
    out_count: u64,
    first_in: Option<u64>,
    first_out: Option<u64>,
}

/// Assign an IN confidence to every node for one region.
///
/// The returned vector is indexed by [`NodeId`]; leaves are exactly
/// `0.0` or `1.0`, internal nodes fall in `[0, 1]`.
///
/// # Errors
///
/// Returns [`Error::Numeric`] if rule 4 yields NaN (the diagnostic
/// carries `mi, mo, iL, oL, vir, vor, r`), or [`Error::TreeInvariant`]
/// if a mixed node lost the nearest-leaf record for a class counted
/// under it.
pub fn assign_region(tree: &MatTree, sample_set: &HashSet<String>) -> Result<Vec<f64>> {
    let order = tree.depth_first_expansion(None);
    let mut summaries = vec![SubtreeSummary::default(); tree.num_nodes()];
    let mut assignments = vec![0.0_f64; tree.num_nodes()];

    // Reversed pre-order visits every child before its parent.
    for &id in order.iter().rev() {
        let node = tree.node(id);
        if node.is_leaf() {
            let is_in = sample_set.contains(&node.identifier);
            summaries[id] = SubtreeSummary {
                in_count: u64::from(is_in),
                out_count: u64::from(!is_in),
                first_in: is_in.then_some(0),
                first_out: (!is_in).then_some(0),
            };
            assignments[id] = if is_in { 1.0 } else { 0.0 };
            continue;
        }
        let mut summary = SubtreeSummary::default();
        for &child in &node.children {
            let sub = summaries[child];
            summary.in_count += sub.in_count;
            summary.out_count += sub.out_count;
            let hop = tree.node(child).branch_length();
            if summary.first_in.is_none() {
                summary.first_in = sub.first_in.map(|d| d + hop);
            }
            if summary.first_out.is_none() {
                summary.first_out = sub.first_out.map(|d| d + hop);
            }
        }
        summaries[id] = summary;
        assignments[id] = confidence(tree, id, summary)?;
    }
    Ok(assignments)
}

/// Rules 2–4 for one internal node from its subtree summary.
#[allow(clippy::cast_precision_loss)]
fn confidence(tree: &MatTree, id: NodeId, summary: SubtreeSummary) -> Result<f64> {
    if summary.out_count == 0 {
        return Ok(1.0);
    }
    if summary.in_count == 0 {
        return Ok(0.0);
    }
    let (Some(mi), Some(mo)) = (summary.first_in, summary.first_out) else {
        return Err(Error::TreeInvariant(format!(
            "mixed node {} lost its nearest-leaf record",
            tree.node(id).identifier
        )));
    };
    // an identical descendant decides the state outright; IN wins the
    // doubly-identical tie by check order
    if mi == 0 {
        return Ok(1.0);
    }
    if mo == 0 {
        return Ok(0.0);
    }
    let vir = mi as f64 / summary.in_count as f64;
    let vor = mo as f64 / summary.out_count as f64;
    let r = vir / vor;
    let c = 1.0 / (1.0 + r);
    if c.is_nan() {
        return Err(Error::Numeric(format!(
            "invalid assignment at node {}: mi {mi}, mo {mo}, iL {}, oL {}, vir {vir}, vor {vor}, r {r}",
            tree.node(id).identifier,
            summary.in_count,
            summary.out_count
        )));
    }
    Ok(c)
}
