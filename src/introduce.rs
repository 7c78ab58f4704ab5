// SPDX-License-Identifier: AGPL-3.0-or-later
//! Introduction inference: per-region ancestral assignments stitched
//! into a per-sample introduction report.
//!
//! The pipeline runs in four phases:
//!
//! 1. every region gets its own ancestral-state assignment (see
//!    [`crate::assign`]), with optional region-wide MC/AI statistics and
//!    a 100-replicate permuted-AI null reported to stderr;
//! 2. optionally, a per-clade region-support table is written: one row
//!    per clade root, one column per region, cells holding that
//!    region's confidence at the clade root;
//! 3. an origin index is built over all assignments: node → regions
//!    whose confidence there strictly exceeds the origin threshold;
//! 4. each in-region sample is walked root-ward until its ancestral
//!    state drops below the threshold. The last in-region node is the
//!    introduction point; the first out-of-region node supplies the
//!    parent confidence, the origin attribution, and the start of the
//!    mutation-path/clade walk to the root.
//!
//! Reaching the root forces the ancestral state to 0 and makes the root
//! itself the introduction node — a sample whose whole ancestry is
//! in-region was introduced at the root or earlier, and no region of
//! origin can be attributed there.

use crate::assign::assign_region;
use crate::association::{
    association_index, monophyletic_cladesize, permuted_association_index, Lcg64,
};
use crate::error::{Error, Result};
use crate::mat::{MatTree, NodeId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

/// Replicates drawn for the permuted-AI null distribution.
const NULL_REPLICATES: usize = 100;

/// Knobs for [`find_introductions`].
#[derive(Debug, Clone)]
pub struct IntroduceOptions {
    /// Compute region-wide MC/AI, the permutation null, and per-sample
    /// subtree metrics. Costly on large trees.
    pub additional_info: bool,
    /// Threshold separating IN from OUT for both the walker and origin
    /// attribution.
    pub min_origin_confidence: f64,
    /// Seed for the permutation-null RNG.
    pub seed: u64,
}

impl Default for IntroduceOptions {
    fn default() -> Self {
        Self {
            additional_info: false,
            min_origin_confidence: 0.5,
            seed: 0,
        }
    }
}

/// Region → per-node confidence vector, in sorted region order.
pub type RegionAssignments = BTreeMap<String, Vec<f64>>;

/// Six-digit confidence formatting shared by rows, the clade table, and
/// the stderr statistics lines.
fn fmt_conf(value: f64) -> String {
    format!("{value:.6}")
}

/// Build the per-region assignment table, logging progress per region
/// and, when requested, the region-wide association statistics with
/// their permutation null.
///
/// # Errors
///
/// Propagates assignment and association failures
/// ([`Error::Numeric`], [`Error::TreeInvariant`]).
pub fn build_region_assignments(
    tree: &MatTree,
    sample_regions: &BTreeMap<String, Vec<String>>,
    options: &IntroduceOptions,
) -> Result<RegionAssignments> {
    let mut region_assignments = RegionAssignments::new();
    let mut rng = Lcg64::new(options.seed);
    for (region, samples) in sample_regions {
        eprintln!(
            "Processing region {region} with {} total samples",
            samples.len()
        );
        let sample_set: HashSet<String> = samples.iter().cloned().collect();
        let assignments = assign_region(tree, &sample_set)?;
        if options.additional_info {
            let global_mc = monophyletic_cladesize(tree, &assignments, None);
            let global_ai = association_index(tree, &assignments, None)?;
            eprintln!(
                "Region largest monophyletic clade: {global_mc}, regional association index: {}",
                fmt_conf(global_ai)
            );
            let mut permvec = Vec::with_capacity(NULL_REPLICATES);
            for _ in 0..NULL_REPLICATES {
                permvec.push(permuted_association_index(
                    tree,
                    &assignments,
                    None,
                    &mut rng,
                )?);
            }
            permvec.sort_by(f64::total_cmp);
            eprintln!(
                "Real value {}. Quantiles of random expected AI for this sample size: {}, {}, {}, {}, {}",
                fmt_conf(global_ai),
                fmt_conf(permvec[5]),
                fmt_conf(permvec[25]),
                fmt_conf(permvec[50]),
                fmt_conf(permvec[75]),
                fmt_conf(permvec[95])
            );
        }
        region_assignments.insert(region.clone(), assignments);
    }
    Ok(region_assignments)
}

/// Node → regions whose confidence there strictly exceeds the origin
/// threshold, with the matching confidences. Regions appear in sorted
/// order, giving the walker an O(1) origin lookup.
#[must_use]
pub fn build_origin_index(
    region_assignments: &RegionAssignments,
    min_origin_confidence: f64,
) -> HashMap<NodeId, (Vec<String>, Vec<f64>)> {
    let mut index: HashMap<NodeId, (Vec<String>, Vec<f64>)> = HashMap::new();
    for (region, assignments) in region_assignments {
        for (node, &confidence) in assignments.iter().enumerate() {
            if confidence > min_origin_confidence {
                let entry = index.entry(node).or_default();
                entry.0.push(region.clone());
                entry.1.push(confidence);
            }
        }
    }
    index
}

/// Header row for the report shape.
#[must_use]
pub fn report_header(multi_region: bool, additional_info: bool) -> String {
    let mut header =
        String::from("sample\tintroduction_node\tintro_confidence\tparent_confidence\tdistance");
    if multi_region {
        header.push_str("\tregion\torigins\torigins_confidence");
    }
    header.push_str("\tclades\tmutation_path");
    if additional_info {
        header.push_str("\tmonophyl_size\tassoc_index");
    }
    header.push('\n');
    header
}

/// Write the per-clade region-support table: one row per non-empty
/// clade annotation in depth-first node order, one column per region in
/// sorted order, cells holding the region's confidence at that node.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be created or written.
pub fn record_clade_regions(
    tree: &MatTree,
    region_assignments: &RegionAssignments,
    path: &Path,
) -> Result<()> {
    let io_err = |e: std::io::Error| Error::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let mut out = std::io::BufWriter::new(std::fs::File::create(path).map_err(io_err)?);

    let mut header = String::from("clade\t");
    for region in region_assignments.keys() {
        header.push_str(region);
        header.push('\t');
    }
    header.push('\n');
    out.write_all(header.as_bytes()).map_err(io_err)?;

    for id in tree.depth_first_expansion(None) {
        for annotation in &tree.node(id).clade_annotations {
            if annotation.is_empty() {
                continue;
            }
            let mut row = String::from(annotation.as_str());
            row.push('\t');
            for assignments in region_assignments.values() {
                row.push_str(&fmt_conf(assignments[id]));
                row.push('\t');
            }
            row.push('\n');
            out.write_all(row.as_bytes()).map_err(io_err)?;
        }
    }
    Ok(())
}

/// Where a root-ward walk crossed the confidence threshold.
struct WalkEnd<'a> {
    /// First node below the threshold (the introduction's parent side).
    stop: NodeId,
    /// Identifier of the introduction node.
    introduction: &'a str,
    /// Last in-region node — the subtree evaluated for per-sample
    /// metrics. `None` only if the very first step was already below
    /// the threshold.
    subtree: Option<NodeId>,
    intro_confidence: f64,
    parent_confidence: f64,
    distance: u64,
}

/// Per-region walker: the region's assignment vector plus memoized
/// per-introduction metrics.
struct RegionWalker<'a> {
    tree: &'a MatTree,
    region: &'a str,
    assignments: &'a [f64],
    origin_index: &'a HashMap<NodeId, (Vec<String>, Vec<f64>)>,
    multi_region: bool,
    options: &'a IntroduceOptions,
    recorded_mc: HashMap<Option<NodeId>, u64>,
    recorded_ai: HashMap<Option<NodeId>, f64>,
}

impl RegionWalker<'_> {
    /// Walk one sample root-ward and emit its report row.
    ///
    /// Returns `None` for a sample absent from the tree (it holds no IN
    /// leaf and has no introduction), or when the threshold is so low
    /// the walk never crosses it.
    fn walk(&mut self, sample: &str) -> Result<Option<String>> {
        let tree = self.tree;
        let Some(leaf) = tree.find(sample) else {
            return Ok(None);
        };
        let threshold = self.options.min_origin_confidence;
        let mut last_encountered = sample;
        let mut subtree = None;
        let mut last_anc_state = 1.0_f64;
        let mut traversed = 0_u64;
        for ancestor in tree.rsearch(leaf, true) {
            let node = tree.node(ancestor);
            let anc_state = if node.is_root() {
                // the root is necessarily the introduction point once
                // the walk gets this far
                last_encountered = &node.identifier;
                0.0
            } else {
                self.assignments[ancestor]
            };
            if anc_state < threshold {
                let end = WalkEnd {
                    stop: ancestor,
                    introduction: last_encountered,
                    subtree,
                    intro_confidence: last_anc_state,
                    parent_confidence: anc_state,
                    distance: traversed,
                };
                return self.emit(sample, &end).map(Some);
            }
            last_encountered = &node.identifier;
            subtree = Some(ancestor);
            last_anc_state = anc_state;
            traversed += node.branch_length();
        }
        Ok(None)
    }

    /// Format the report row for a finished walk.
    fn emit(&mut self, sample: &str, end: &WalkEnd<'_>) -> Result<String> {
        let (clades, mutation_path) = self.path_and_clades(end.stop);
        let mut row = String::new();
        let _ = write!(
            row,
            "{sample}\t{}\t{}\t{}\t{}",
            end.introduction,
            fmt_conf(end.intro_confidence),
            fmt_conf(end.parent_confidence),
            end.distance
        );
        if self.multi_region {
            let (origins, origins_confidence) = self.origins_at(end.stop);
            let _ = write!(row, "\t{}\t{origins}\t{origins_confidence}", self.region);
        }
        let _ = write!(row, "\t{clades}\t{mutation_path}");
        if self.options.additional_info {
            let (mc, ai) = self.subtree_metrics(end.subtree)?;
            let _ = write!(row, "\t{mc}\t{}", fmt_conf(ai));
        }
        row.push('\n');
        Ok(row)
    }

    /// Origin attribution at the below-threshold node: every region
    /// confident there, or `indeterminate`. The root carries no origin
    /// information.
    fn origins_at(&self, stop: NodeId) -> (String, String) {
        if !self.tree.node(stop).is_root() {
            if let Some((regions, confidences)) = self.origin_index.get(&stop) {
                let origins = regions.join(",");
                let mut listed = String::new();
                for &confidence in confidences {
                    listed.push_str(&fmt_conf(confidence));
                    listed.push(',');
                }
                return (origins, listed);
            }
        }
        ("indeterminate".to_string(), fmt_conf(0.0))
    }

    /// Second root-ward walk from the below-threshold node: the
    /// `<`-separated mutation path (reverse direction indicator) and the
    /// comma-joined clade annotations encountered on the way up.
    fn path_and_clades(&self, stop: NodeId) -> (String, String) {
        let mut clades = String::new();
        let mut path = String::new();
        for ancestor in self.tree.rsearch(stop, true) {
            let node = self.tree.node(ancestor);
            let mutations: Vec<String> = node.mutations.iter().map(ToString::to_string).collect();
            path.push_str(&mutations.join(","));
            path.push('<');
            for annotation in &node.clade_annotations {
                if !annotation.is_empty() {
                    if !clades.is_empty() {
                        clades.push(',');
                    }
                    clades.push_str(annotation);
                }
            }
        }
        if clades.is_empty() {
            clades = "none".to_string();
        }
        (clades, path)
    }

    /// MC and AI over the introduction subtree, memoized per subtree
    /// root so duplicate introductions within the region are amortized.
    fn subtree_metrics(&mut self, subtree: Option<NodeId>) -> Result<(u64, f64)> {
        let mc = if let Some(&mc) = self.recorded_mc.get(&subtree) {
            mc
        } else {
            let mc = monophyletic_cladesize(self.tree, self.assignments, subtree);
            self.recorded_mc.insert(subtree, mc);
            mc
        };
        let ai = if let Some(&ai) = self.recorded_ai.get(&subtree) {
            ai
        } else {
            let ai = association_index(self.tree, self.assignments, subtree)?;
            self.recorded_ai.insert(subtree, ai);
            ai
        };
        Ok((mc, ai))
    }
}

/// Run the full pipeline: per-region assignment, optional clade-support
/// table, origin index, then the per-sample walks. Returns the report
/// rows with the header first.
///
/// # Errors
///
/// Propagates assignment, association, and clade-table failures.
pub fn find_introductions(
    tree: &MatTree,
    sample_regions: &BTreeMap<String, Vec<String>>,
    clade_output: Option<&Path>,
    options: &IntroduceOptions,
) -> Result<Vec<String>> {
    let region_assignments = build_region_assignments(tree, sample_regions, options)?;
    if let Some(path) = clade_output {
        eprintln!("Clade root region support requested; recording...");
        record_clade_regions(tree, &region_assignments, path)?;
    }
    let origin_index = build_origin_index(&region_assignments, options.min_origin_confidence);
    eprintln!("Regions processed; identifying introductions.");

    let multi_region = region_assignments.len() > 1;
    let mut rows = vec![report_header(multi_region, options.additional_info)];
    for (region, assignments) in &region_assignments {
        let mut walker = RegionWalker {
            tree,
            region,
            assignments,
            origin_index: &origin_index,
            multi_region,
            options,
            recorded_mc: HashMap::new(),
            recorded_ai: HashMap::new(),
        };
        for sample in &sample_regions[region] {
            if let Some(row) = walker.walk(sample)? {
                rows.push(row);
            }
        }
    }
    Ok(rows)
}
