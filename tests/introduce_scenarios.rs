// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end introduction scenarios: tree table and samples files are
//! written to a temporary directory, parsed with production code, and
//! the report rows are checked against hand-computed values.

use landfall::introduce::{find_introductions, IntroduceOptions};
use landfall::io::samples::read_sample_regions;
use landfall::io::tree_table::parse_tree_table;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Seven nodes, one mutation per edge, clade annotation on Y:
///
/// ```text
/// root
/// ├── A            (leaf)
/// └── X
///     ├── Y  [cladeY]
///     │   ├── B    (leaf)
///     │   └── C    (leaf)
///     └── D        (leaf)
/// ```
const TREE_TABLE: &str = "\
root\t\t\t
A\troot\tG1A\t
X\troot\tG2A\t
Y\tX\tG3A\tcladeY
B\tY\tG4A\t
C\tY\tG5A\t
D\tX\tG6A\t
";

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut f = File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
}

fn fields(row: &str) -> Vec<&str> {
    row.trim_end_matches('\n').split('\t').collect()
}

#[test]
fn all_in_region_walks_to_root() {
    let dir = TempDir::new().unwrap();
    let tree = parse_tree_table(&write_file(dir.path(), "t.tsv", TREE_TABLE)).unwrap();
    let samples =
        read_sample_regions(&write_file(dir.path(), "s.tsv", "A\nB\nC\nD\n")).unwrap();
    let rows =
        find_introductions(&tree, &samples, None, &IntroduceOptions::default()).unwrap();

    assert_eq!(rows.len(), 5, "header plus one row per sample");
    for row in &rows[1..] {
        let cols = fields(row);
        assert_eq!(cols[1], "root");
        assert_eq!(cols[3], "0.000000");
    }
    // distance equals depth in mutation-bearing edges
    let distance_of = |sample: &str| {
        let row = rows[1..].iter().find(|r| fields(r)[0] == sample).unwrap();
        fields(row)[4].to_string()
    };
    assert_eq!(distance_of("A"), "1");
    assert_eq!(distance_of("B"), "3");
    assert_eq!(distance_of("C"), "3");
    assert_eq!(distance_of("D"), "2");
}

#[test]
fn single_column_samples_use_default_region_and_short_header() {
    let dir = TempDir::new().unwrap();
    let tree = parse_tree_table(&write_file(dir.path(), "t.tsv", TREE_TABLE)).unwrap();
    let samples = read_sample_regions(&write_file(dir.path(), "s.txt", "A\n")).unwrap();
    assert_eq!(samples.keys().collect::<Vec<_>>(), vec!["default"]);

    let rows =
        find_introductions(&tree, &samples, None, &IntroduceOptions::default()).unwrap();
    let header = fields(&rows[0]);
    assert_eq!(
        header,
        vec![
            "sample",
            "introduction_node",
            "intro_confidence",
            "parent_confidence",
            "distance",
            "clades",
            "mutation_path"
        ]
    );
    assert!(!header.contains(&"region"));
}

#[test]
fn crlf_samples_file_parses_cleanly() {
    let dir = TempDir::new().unwrap();
    let samples =
        read_sample_regions(&write_file(dir.path(), "s.tsv", "B\tR1\r\nC\tR1\r\n")).unwrap();
    assert_eq!(samples["R1"], vec!["B", "C"]);
}

#[test]
fn mixed_region_stops_where_confidence_drops() {
    let dir = TempDir::new().unwrap();
    let tree = parse_tree_table(&write_file(dir.path(), "t.tsv", TREE_TABLE)).unwrap();
    let samples = read_sample_regions(&write_file(dir.path(), "s.tsv", "B\nC\n")).unwrap();

    // {B, C} puts Y at 1, X at 1/2, root at 1/4; θ = 0.6 stops the walk
    // at X, making Y the introduction node.
    let options = IntroduceOptions {
        min_origin_confidence: 0.6,
        ..IntroduceOptions::default()
    };
    let rows = find_introductions(&tree, &samples, None, &options).unwrap();
    assert_eq!(rows.len(), 3);
    for (sample, row) in [("B", &rows[1]), ("C", &rows[2])] {
        let cols = fields(row);
        assert_eq!(cols[0], sample);
        assert_eq!(cols[1], "Y");
        assert_eq!(cols[2], "1.000000");
        assert_eq!(cols[3], "0.500000");
        assert_eq!(cols[4], "2");
        assert_eq!(cols[6], "G2A<<", "mutation path from X up to the root");
    }

    // at the default θ = 0.5 the at-threshold X stays in-region and the
    // walk runs to the root
    let rows =
        find_introductions(&tree, &samples, None, &IntroduceOptions::default()).unwrap();
    let cols = fields(&rows[1]);
    assert_eq!(cols[1], "root");
    assert_eq!(cols[2], "0.500000");
    assert_eq!(cols[3], "0.000000");
    assert_eq!(cols[4], "3");
}

#[test]
fn two_regions_report_origins_or_indeterminate() {
    let dir = TempDir::new().unwrap();
    // root ── W ── {B, D1, D2, D3}, one mutation per edge: W sits at
    // 1/4 for {B} and 3/4 for {D1, D2, D3}.
    let table = "\
root\t\t\t
W\troot\tG1A\t
B\tW\tG2A\t
D1\tW\tG3A\t
D2\tW\tG4A\t
D3\tW\tG5A\t
";
    let tree = parse_tree_table(&write_file(dir.path(), "t.tsv", table)).unwrap();
    let samples = read_sample_regions(&write_file(
        dir.path(),
        "s.tsv",
        "B\tR1\nD1\tR2\nD2\tR2\nD3\tR2\n",
    ))
    .unwrap();
    let rows =
        find_introductions(&tree, &samples, None, &IntroduceOptions::default()).unwrap();

    let header = fields(&rows[0]);
    assert_eq!(header[5], "region");
    assert_eq!(header[6], "origins");
    assert_eq!(header[7], "origins_confidence");

    // B stops at W, where R2 is confidently IN: a determinate origin.
    let b_row = rows.iter().find(|r| r.starts_with("B\t")).unwrap();
    let cols = fields(b_row);
    assert_eq!(cols[1], "B");
    assert_eq!(cols[3], "0.250000");
    assert_eq!(cols[5], "R1");
    assert_eq!(cols[6], "R2");
    assert_eq!(cols[7], "0.750000,");

    // the R2 samples ride their confident ancestry to the root, which
    // never gets an origin
    let d_row = rows.iter().find(|r| r.starts_with("D1\t")).unwrap();
    let cols = fields(d_row);
    assert_eq!(cols[1], "root");
    assert_eq!(cols[6], "indeterminate");
    assert_eq!(cols[7], "0.000000");
}

#[test]
fn clade_support_table_lists_regions_in_sorted_order() {
    let dir = TempDir::new().unwrap();
    let tree = parse_tree_table(&write_file(dir.path(), "t.tsv", TREE_TABLE)).unwrap();
    let samples = read_sample_regions(&write_file(
        dir.path(),
        "s.tsv",
        "B\tR1\nC\tR1\nD\tR2\n",
    ))
    .unwrap();
    let clade_path = dir.path().join("clades.tsv");
    find_introductions(
        &tree,
        &samples,
        Some(&clade_path),
        &IntroduceOptions::default(),
    )
    .unwrap();

    let content = std::fs::read_to_string(&clade_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "clade\tR1\tR2\t");
    // Y is fully IN for R1 and fully OUT for R2
    assert_eq!(lines[1], "cladeY\t1.000000\t0.000000\t");
    assert_eq!(lines.len(), 2);
}

#[test]
fn additional_info_extends_rows_with_subtree_metrics() {
    let dir = TempDir::new().unwrap();
    let tree = parse_tree_table(&write_file(dir.path(), "t.tsv", TREE_TABLE)).unwrap();
    let samples = read_sample_regions(&write_file(dir.path(), "s.tsv", "B\nC\n")).unwrap();
    let options = IntroduceOptions {
        additional_info: true,
        min_origin_confidence: 0.6,
        ..IntroduceOptions::default()
    };
    let rows = find_introductions(&tree, &samples, None, &options).unwrap();
    let header = fields(&rows[0]);
    assert_eq!(header[header.len() - 2], "monophyl_size");
    assert_eq!(header[header.len() - 1], "assoc_index");

    // both samples introduce through Y, whose subtree is entirely IN
    for row in &rows[1..] {
        let cols = fields(row);
        assert_eq!(cols[cols.len() - 2], "2");
        assert_eq!(cols[cols.len() - 1], "0.000000");
    }
}

#[test]
fn unknown_and_duplicate_samples_are_tolerated() {
    let dir = TempDir::new().unwrap();
    let tree = parse_tree_table(&write_file(dir.path(), "t.tsv", TREE_TABLE)).unwrap();
    let samples = read_sample_regions(&write_file(
        dir.path(),
        "s.tsv",
        "B\nB\nnot_in_tree\nC\n",
    ))
    .unwrap();
    // duplicate collapsed at parse time, unknown dropped at walk time
    assert_eq!(samples["default"], vec!["B", "not_in_tree", "C"]);
    let rows =
        find_introductions(&tree, &samples, None, &IntroduceOptions::default()).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(fields(&rows[1])[0], "B");
    assert_eq!(fields(&rows[2])[0], "C");
}

#[test]
fn gzip_inputs_feed_the_same_pipeline() {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    let dir = TempDir::new().unwrap();
    let tree_path = dir.path().join("t.tsv.gz");
    let mut gz = GzEncoder::new(File::create(&tree_path).unwrap(), Compression::default());
    gz.write_all(TREE_TABLE.as_bytes()).unwrap();
    gz.finish().unwrap();

    let tree = parse_tree_table(&tree_path).unwrap();
    let samples = read_sample_regions(&write_file(dir.path(), "s.tsv", "B\nC\n")).unwrap();
    let rows =
        find_introductions(&tree, &samples, None, &IntroduceOptions::default()).unwrap();
    assert_eq!(rows.len(), 3);
}
