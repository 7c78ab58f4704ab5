// SPDX-License-Identifier: AGPL-3.0-or-later
//! Arena-backed mutation-annotated tree (MAT).
//!
//! A rooted tree where every node carries a stable string identifier, an
//! ordered child list, the single-site mutations on its incoming edge,
//! and one clade annotation slot per annotation axis (an empty string
//! means "not a clade root on that axis"). The length of a node's
//! incoming edge is its mutation count.
//!
//! Nodes live in a flat arena (`Vec<MatNode>`) addressed by [`NodeId`];
//! traversals return id vectors or walk parent links without per-step
//! allocation. Child order is insertion order, which fixes the
//! depth-first expansion and with it every downstream tie-break.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Index of a node in the tree arena.
pub type NodeId = usize;

/// A single-site substitution on a node's incoming edge, e.g. `A23403G`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// Parent-state nucleotide code.
    pub reference: u8,
    /// One-based site position.
    pub position: u32,
    /// Child-state nucleotide code.
    pub alternate: u8,
}

impl Mutation {
    /// Parse a compact mutation string of the form `<ref><position><alt>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TreeTable`] if the string is shorter than three
    /// characters, the endpoints are not letters, or the middle is not a
    /// decimal position.
    pub fn parse(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() < 3 {
            return Err(Error::TreeTable(format!("mutation string too short: {s:?}")));
        }
        let reference = bytes[0];
        let alternate = bytes[bytes.len() - 1];
        if !reference.is_ascii_alphabetic() || !alternate.is_ascii_alphabetic() {
            return Err(Error::TreeTable(format!(
                "mutation endpoints must be nucleotide codes: {s:?}"
            )));
        }
        let position = s[1..s.len() - 1]
            .parse::<u32>()
            .map_err(|_| Error::TreeTable(format!("bad mutation position: {s:?}")))?;
        Ok(Self {
            reference,
            position,
            alternate,
        })
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.reference as char, self.position, self.alternate as char
        )
    }
}

/// One node of a [`MatTree`].
#[derive(Debug, Clone)]
pub struct MatNode {
    /// Stable identifier (leaf ids double as sample ids).
    pub identifier: String,
    /// Parent in the arena; `None` only at the root.
    pub parent: Option<NodeId>,
    /// Children in insertion order.
    pub children: Vec<NodeId>,
    /// Mutations on the incoming edge, in site order.
    pub mutations: Vec<Mutation>,
    /// Clade annotations, one slot per axis; empty = not a clade root.
    pub clade_annotations: Vec<String>,
}

impl MatNode {
    /// Whether the node has no children.
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether the node has no parent.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Length of the incoming edge: the mutation count.
    #[inline]
    #[must_use]
    pub fn branch_length(&self) -> u64 {
        self.mutations.len() as u64
    }
}

/// Rooted mutation-annotated tree over an arena of [`MatNode`].
#[derive(Debug, Clone, Default)]
pub struct MatTree {
    nodes: Vec<MatNode>,
    root: Option<NodeId>,
    index: HashMap<String, NodeId>,
}

impl MatTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its arena id.
    ///
    /// `parent` must name a node already in the tree; `None` makes this
    /// node the root, which is allowed exactly once. Parent-before-child
    /// insertion keeps construction a single pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TreeTable`] on a duplicate identifier, an
    /// unknown parent, or a second root.
    pub fn add_node(
        &mut self,
        identifier: &str,
        parent: Option<&str>,
        mutations: Vec<Mutation>,
        clade_annotations: Vec<String>,
    ) -> Result<NodeId> {
        if self.index.contains_key(identifier) {
            return Err(Error::TreeTable(format!(
                "duplicate node identifier: {identifier}"
            )));
        }
        let id = self.nodes.len();
        let parent_id = match parent {
            None => {
                if self.root.is_some() {
                    return Err(Error::TreeTable(format!("second root: {identifier}")));
                }
                self.root = Some(id);
                None
            }
            Some(p) => {
                let pid = *self.index.get(p).ok_or_else(|| {
                    Error::TreeTable(format!("unknown parent {p} for node {identifier}"))
                })?;
                self.nodes[pid].children.push(id);
                Some(pid)
            }
        };
        self.nodes.push(MatNode {
            identifier: identifier.to_string(),
            parent: parent_id,
            children: Vec::new(),
            mutations,
            clade_annotations,
        });
        self.index.insert(identifier.to_string(), id);
        Ok(id)
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaves.
    #[must_use]
    pub fn num_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// The root id, or `None` for an empty tree.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Borrow a node by arena id.
    #[inline]
    #[must_use]
    pub fn node(&self, id: NodeId) -> &MatNode {
        &self.nodes[id]
    }

    /// Look up a node id by identifier.
    #[must_use]
    pub fn find(&self, identifier: &str) -> Option<NodeId> {
        self.index.get(identifier).copied()
    }

    /// Pre-order depth-first expansion: each node before its children,
    /// children in insertion order. `from = None` starts at the root.
    #[must_use]
    pub fn depth_first_expansion(&self, from: Option<NodeId>) -> Vec<NodeId> {
        let Some(start) = from.or(self.root) else {
            return Vec::new();
        };
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            // reversed push keeps child visitation in insertion order
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }

    /// Breadth-first expansion from `from` (root when `None`).
    #[must_use]
    pub fn breadth_first_expansion(&self, from: Option<NodeId>) -> Vec<NodeId> {
        let Some(start) = from.or(self.root) else {
            return Vec::new();
        };
        let mut order = vec![start];
        let mut next = 0;
        while next < order.len() {
            let id = order[next];
            next += 1;
            order.extend(self.nodes[id].children.iter().copied());
        }
        order
    }

    /// Root-ward iterator from `from`, optionally including `from`.
    #[must_use]
    pub fn rsearch(&self, from: NodeId, include_self: bool) -> Rsearch<'_> {
        let next = if include_self {
            Some(from)
        } else {
            self.nodes[from].parent
        };
        Rsearch { tree: self, next }
    }

    /// Leaves under `from` (inclusive if `from` is itself a leaf), in
    /// depth-first order.
    #[must_use]
    pub fn leaves_under(&self, from: NodeId) -> Vec<NodeId> {
        self.depth_first_expansion(Some(from))
            .into_iter()
            .filter(|&id| self.nodes[id].is_leaf())
            .collect()
    }
}

/// Root-ward traversal over parent links. See [`MatTree::rsearch`].
pub struct Rsearch<'a> {
    tree: &'a MatTree,
    next: Option<NodeId>,
}

impl Iterator for Rsearch<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.nodes[current].parent;
        Some(current)
    }
}
