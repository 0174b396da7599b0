//! Input discovery for dump files.
//!
//! A run's `input` may name one dump or a pattern such as `dumps/ol_dump_*.txt`.
//! Matches are filtered to regular files and sorted so that chunk order, and
//! therefore worker labels, are stable across runs.
//!
//! ```no_run
//! use dumpbeam::io::glob::resolve_inputs;
//!
//! let dumps = resolve_inputs("dumps/ol_dump_editions_*.txt")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::{Path, PathBuf};

/// Expand a glob pattern into the sorted list of matching files.
///
/// Zero matches yield an empty vector.
///
/// # Errors
/// Returns an error for an invalid pattern or an unreadable directory entry.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.with_context(|| format!("read glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Whether `input` should be treated as a pattern rather than a literal path.
pub fn is_pattern(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

/// Resolve a run input to at least one existing dump file.
///
/// A literal path is returned as-is when it is a file; a pattern must match
/// at least one file.
///
/// # Errors
/// Returns an error when nothing usable is found.
pub fn resolve_inputs(input: &str) -> Result<Vec<PathBuf>> {
    if !is_pattern(input) {
        let path = Path::new(input);
        if !path.is_file() {
            bail!("input file not found: {input}");
        }
        return Ok(vec![path.to_path_buf()]);
    }
    let files = expand_glob(input)?;
    if files.is_empty() {
        bail!("no files found matching pattern: {input}");
    }
    Ok(files)
}
