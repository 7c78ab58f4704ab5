// SPDX-License-Identifier: AGPL-3.0-or-later
//! I/O for landfall inputs: the mutation-annotated tree table and the
//! region/samples table. Both readers stream lines through a shared
//! buffered reader that is transparent to gzip compression.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub mod samples;
pub mod tree_table;

/// Open a file for buffered line reading.
///
/// Detects gzip compression from the `.gz` file extension and wraps the
/// stream with [`flate2::read::GzDecoder`] when needed.
pub(crate) fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let ext = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("");
    if ext.eq_ignore_ascii_case("gz") {
        let decoder = flate2::read::GzDecoder::new(file);
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Read one line into `buf`, returning bytes read. Wraps I/O errors with
/// path context.
pub(crate) fn read_line(reader: &mut dyn BufRead, buf: &mut String, path: &Path) -> Result<usize> {
    reader.read_line(buf).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
