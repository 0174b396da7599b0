//! JSON Lines output for pipeline sinks.
//!
//! - [`append_jsonl`] appends serialized values to a file, one per line.
//! - [`read_jsonl_vec`] reads a JSONL file back into a typed vector.
//!
//! Appends write the whole buffer with a single `write_all` on a file opened
//! in append mode, so lines from concurrent writers do not interleave.

use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Read a JSONL file into a typed `Vec<T>`, skipping blank lines.
///
/// # Errors
/// Returns an error if the file cannot be read or a line fails to parse.
pub fn read_jsonl_vec<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut out = Vec::new();
    for (i, line) in BufReader::new(f).lines().enumerate() {
        let line = line.with_context(|| format!("read line {} in {}", i + 1, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let v: T = serde_json::from_str(&line).with_context(|| {
            format!("parse JSONL line {} in {}: {}", i + 1, path.display(), line)
        })?;
        out.push(v);
    }
    Ok(out)
}

/// Append `data` to `path` as JSONL, creating the file and its parents.
///
/// # Returns
/// The number of lines written.
///
/// # Errors
/// Returns an error if an item fails to serialize or the file cannot be written.
pub fn append_jsonl<T: Serialize>(path: impl AsRef<Path>, data: &[T]) -> Result<usize> {
    let path = path.as_ref();
    if data.is_empty() {
        return Ok(0);
    }
    let mut buf = Vec::new();
    for (i, item) in data.iter().enumerate() {
        serde_json::to_writer(&mut buf, item)
            .with_context(|| format!("serialize item #{i} for {}", path.display()))?;
        buf.push(b'\n');
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {} for append", path.display()))?;
    f.write_all(&buf)
        .with_context(|| format!("append to {}", path.display()))?;
    Ok(data.len())
}
