// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mutation-annotated tree table — line-oriented tree exchange format.
//!
//! Streams a [`MatTree`] from disk via a buffered reader. Handles both
//! plain and gzip-compressed files (`.gz` extension).
//!
//! # Format (one node per line, tab-separated)
//!
//! ```text
//! identifier <TAB> parent_identifier <TAB> mutations <TAB> clade_annotations
//! ```
//!
//! - The root comes first and has an empty parent field; every other
//!   node's parent must appear on an earlier line, so construction is a
//!   single pass.
//! - `mutations` is a comma-joined list of compact mutation strings
//!   (`A23403G`); empty for no mutations.
//! - `clade_annotations` is a comma-joined list with one slot per
//!   annotation axis; empty slots are kept (`B.1.1.7,` means axis 2 has
//!   no clade root here). The trailing columns may be omitted entirely.
//! - Lines starting with `#` and blank lines are skipped.
//!
//! Child order is line order, which fixes the tree's depth-first
//! expansion and every tie-break derived from it.

use crate::error::{Error, Result};
use crate::io::{open_reader, read_line};
use crate::mat::{MatTree, Mutation};
use std::io::Write;
use std::path::Path;

/// Parse a tree table file into a [`MatTree`].
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened or read, or
/// [`Error::TreeTable`] on a structurally invalid table (no identifier,
/// unknown parent, duplicate identifier, multiple roots, malformed
/// mutation).
pub fn parse_tree_table(path: &Path) -> Result<MatTree> {
    let mut reader = open_reader(path)?;
    let mut tree = MatTree::new();
    let mut buf = String::new();
    let mut line_number = 0_usize;

    loop {
        buf.clear();
        if read_line(reader.as_mut(), &mut buf, path)? == 0 {
            break;
        }
        line_number += 1;
        let line = buf.trim_end_matches(['\n', '\r']);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split('\t');
        let identifier = fields.next().unwrap_or("");
        if identifier.is_empty() {
            return Err(Error::TreeTable(format!(
                "missing node identifier on line {line_number} of {}",
                path.display()
            )));
        }
        let parent = match fields.next() {
            None | Some("") => None,
            Some(p) => Some(p),
        };
        let mutations = parse_mutation_list(fields.next().unwrap_or(""))?;
        let clade_annotations = parse_annotation_list(fields.next().unwrap_or(""));
        tree.add_node(identifier, parent, mutations, clade_annotations)
            .map_err(|e| match e {
                Error::TreeTable(msg) => {
                    Error::TreeTable(format!("line {line_number} of {}: {msg}", path.display()))
                }
                other => other,
            })?;
    }
    if tree.root().is_none() {
        return Err(Error::TreeTable(format!(
            "{}: no root node found",
            path.display()
        )));
    }
    Ok(tree)
}

/// Write `tree` back out in table form (pre-order, so parents precede
/// children and a re-parse reproduces the same arena).
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be created or written.
pub fn write_tree_table(tree: &MatTree, path: &Path) -> Result<()> {
    let mut out = std::io::BufWriter::new(std::fs::File::create(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?);
    for id in tree.depth_first_expansion(None) {
        let node = tree.node(id);
        let parent = node
            .parent
            .map_or("", |p| tree.node(p).identifier.as_str());
        let mutations: Vec<String> = node.mutations.iter().map(ToString::to_string).collect();
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            node.identifier,
            parent,
            mutations.join(","),
            node.clade_annotations.join(",")
        )
        .map_err(|e| Error::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

fn parse_mutation_list(field: &str) -> Result<Vec<Mutation>> {
    if field.is_empty() {
        return Ok(Vec::new());
    }
    field.split(',').map(Mutation::parse).collect()
}

fn parse_annotation_list(field: &str) -> Vec<String> {
    if field.is_empty() {
        return Vec::new();
    }
    field.split(',').map(str::to_string).collect()
}
