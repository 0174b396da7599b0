//! Byte-exact, line-aligned chunk planning.
//!
//! [`FileChunker::split`] cuts a file into roughly `file_size / workers` byte
//! ranges. Every boundary is moved back to just after a `\n`, so no line is
//! ever shared by two chunks. When a range holds no newline at all (a single
//! line longer than the ideal size), the boundary moves forward to the end of
//! that line instead, which guarantees progress.
//!
//! The end of the file is always a valid boundary, even when the last line has
//! no trailing newline.

use crate::chunk::Chunk;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const SCAN_BLOCK: u64 = 64 * 1024;

/// Output of a chunking pass.
#[derive(Clone, Debug, Serialize)]
pub struct ChunkPlan {
    /// `min(max_workers, available_cpus)`.
    pub workers_used: usize,
    /// Number of chunks in `chunks`.
    pub chunk_count: usize,
    /// Contiguous chunks covering the whole file, in file order.
    pub chunks: Vec<Chunk>,
}

/// Splits files into line-aligned [`Chunk`]s.
#[derive(Clone, Copy, Debug)]
pub struct FileChunker {
    available_cpus: usize,
}

impl Default for FileChunker {
    fn default() -> Self {
        Self {
            available_cpus: num_cpus::get(),
        }
    }
}

impl FileChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the CPU count used to cap the number of workers.
    #[must_use]
    pub fn with_available_cpus(mut self, cpus: usize) -> Self {
        self.available_cpus = cpus;
        self
    }

    /// Plan the chunks of `file_name` for at most `max_workers` workers.
    ///
    /// # Errors
    /// Returns a configuration error when no worker is available, and an I/O
    /// error when the file cannot be inspected or scanned.
    pub fn split(&self, file_name: impl AsRef<Path>, max_workers: usize) -> Result<ChunkPlan> {
        let path = file_name.as_ref();
        let workers_used = max_workers.min(self.available_cpus);
        if workers_used < 1 {
            return Err(PipelineError::config(
                "at least one CPU core is required for processing",
            )
            .into());
        }

        let file_size = std::fs::metadata(path)
            .map_err(|e| PipelineError::io(path, e))
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        let ideal_size = file_size / workers_used as u64;
        tracing::debug!(
            file = %path.display(),
            file_size,
            workers_used,
            ideal_size,
            "planning chunks"
        );

        let mut f = File::open(path)
            .map_err(|e| PipelineError::io(path, e))
            .with_context(|| format!("open {}", path.display()))?;

        let mut chunks = Vec::with_capacity(workers_used);
        let mut start = 0u64;
        while start < file_size {
            let proposed = file_size.min(start + ideal_size);
            let mut end = if proposed == file_size {
                file_size
            } else {
                last_line_end(&mut f, start, proposed).map_err(|e| PipelineError::io(path, e))?
            };
            if end == start {
                end = next_line_end(&mut f, start, file_size)
                    .map_err(|e| PipelineError::io(path, e))?;
            }
            chunks.push(Chunk::new(path, start, end)?);
            start = end;
        }

        tracing::info!(
            file = %path.display(),
            chunks = chunks.len(),
            "file split into chunks"
        );
        Ok(ChunkPlan {
            workers_used,
            chunk_count: chunks.len(),
            chunks,
        })
    }
}

/// Plan chunks with the machine's CPU count.
pub fn split_file(file_name: impl AsRef<Path>, max_workers: usize) -> Result<ChunkPlan> {
    FileChunker::default().split(file_name, max_workers)
}

/// Largest offset in `(start, end]` that sits right after a `\n`, or `start`.
fn last_line_end(f: &mut File, start: u64, end: u64) -> std::io::Result<u64> {
    let mut buf = vec![0u8; SCAN_BLOCK as usize];
    let mut pos = end;
    while pos > start {
        let block_start = pos.saturating_sub(SCAN_BLOCK).max(start);
        let len = (pos - block_start) as usize;
        f.seek(SeekFrom::Start(block_start))?;
        f.read_exact(&mut buf[..len])?;
        if let Some(i) = buf[..len].iter().rposition(|&b| b == b'\n') {
            return Ok(block_start + i as u64 + 1);
        }
        pos = block_start;
    }
    Ok(start)
}

/// Offset right after the first `\n` at or after `start`, or `file_size`.
fn next_line_end(f: &mut File, start: u64, file_size: u64) -> std::io::Result<u64> {
    let mut buf = vec![0u8; SCAN_BLOCK as usize];
    let mut pos = start;
    f.seek(SeekFrom::Start(pos))?;
    while pos < file_size {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        if let Some(i) = buf[..n].iter().position(|&b| b == b'\n') {
            return Ok(pos + i as u64 + 1);
        }
        pos += n as u64;
    }
    Ok(file_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn last_line_end_finds_newline_across_blocks() {
        let mut data = vec![b'a'; (SCAN_BLOCK as usize) * 2 + 10];
        data[5] = b'\n';
        let tmp = temp_file(&data);
        let mut f = File::open(tmp.path()).unwrap();
        let end = last_line_end(&mut f, 0, data.len() as u64).unwrap();
        assert_eq!(end, 6);
    }

    #[test]
    fn next_line_end_runs_to_eof_without_newline() {
        let tmp = temp_file(b"no newline here");
        let mut f = File::open(tmp.path()).unwrap();
        assert_eq!(next_line_end(&mut f, 0, 15).unwrap(), 15);
    }

    #[test]
    fn zero_workers_is_a_config_error() {
        let tmp = temp_file(b"a\n");
        let err = FileChunker::new()
            .with_available_cpus(4)
            .split(tmp.path(), 0)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Config(_))
        ));
    }
}
