// SPDX-License-Identifier: AGPL-3.0-or-later
//! Region/samples table reader.
//!
//! One record per line, whitespace-separated. Column 1 is a sample
//! identifier; optional column 2 names its region. Lines with no second
//! column fall into the synthetic region `default`. Three or more
//! columns is a hard error. CRLF line endings are tolerated (the
//! carriage return is whitespace to the splitter) and `.gz` files are
//! read transparently.
//!
//! The file need not be sorted. Duplicate sample ids within a region are
//! accepted and collapsed to their first occurrence, so every surviving
//! sample produces exactly one introduction row downstream.

use crate::error::{Error, Result};
use crate::io::{open_reader, read_line};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Parse a samples file into region → ordered unique sample ids.
///
/// Regions are keyed in a [`BTreeMap`] so every downstream iteration
/// (assignment, origin attribution, clade-table columns) sees the same
/// sorted region order.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened or read, or
/// [`Error::Samples`] if any line has more than two columns.
pub fn read_sample_regions(path: &Path) -> Result<BTreeMap<String, Vec<String>>> {
    let mut reader = open_reader(path)?;
    let mut regions: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut buf = String::new();
    let mut line_number = 0_usize;

    loop {
        buf.clear();
        if read_line(reader.as_mut(), &mut buf, path)? == 0 {
            break;
        }
        line_number += 1;
        let mut words = buf.split_whitespace();
        let Some(sample) = words.next() else {
            continue; // blank line
        };
        let region = match words.next() {
            None => "default",
            Some(second) => {
                if words.next().is_some() {
                    return Err(Error::Samples(format!(
                        "too many columns on line {line_number} of {}",
                        path.display()
                    )));
                }
                second
            }
        };
        if seen.insert((region.to_string(), sample.to_string())) {
            regions
                .entry(region.to_string())
                .or_default()
                .push(sample.to_string());
        }
    }
    Ok(regions)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_samples(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn two_column_regions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_samples(&dir, "s.tsv", "B\tR1\nC\tR2\nD\tR1\n");
        let regions = read_sample_regions(&path).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions["R1"], vec!["B", "D"]);
        assert_eq!(regions["R2"], vec!["C"]);
    }

    #[test]
    fn single_column_falls_into_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_samples(&dir, "s.txt", "A\nB\n");
        let regions = read_sample_regions(&path).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions["default"], vec!["A", "B"]);
    }

    #[test]
    fn crlf_lines_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_samples(&dir, "crlf.tsv", "B\tR1\r\nC\r\n");
        let regions = read_sample_regions(&path).unwrap();
        assert_eq!(regions["R1"], vec!["B"]);
        assert_eq!(regions["default"], vec!["C"]);
    }

    #[test]
    fn three_columns_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_samples(&dir, "bad.tsv", "B\tR1\textra\n");
        let err = read_sample_regions(&path).unwrap_err();
        assert!(err.to_string().contains("too many columns"));
    }

    #[test]
    fn duplicates_collapse_to_first_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_samples(&dir, "dup.tsv", "B\tR1\nB\tR1\nB\tR2\n");
        let regions = read_sample_regions(&path).unwrap();
        assert_eq!(regions["R1"], vec!["B"]);
        assert_eq!(regions["R2"], vec!["B"]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_samples(&dir, "blank.tsv", "B\tR1\n\nC\tR1\n");
        let regions = read_sample_regions(&path).unwrap();
        assert_eq!(regions["R1"], vec!["B", "C"]);
    }

    #[test]
    fn gzip_input() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.tsv.gz");
        let file = File::create(&path).unwrap();
        let mut gz = GzEncoder::new(file, Compression::default());
        gz.write_all(b"B\tR1\nC\tR1\n").unwrap();
        gz.finish().unwrap();
        let regions = read_sample_regions(&path).unwrap();
        assert_eq!(regions["R1"], vec!["B", "C"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_sample_regions(Path::new("/no/such/samples.tsv")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
