//! Line-aligned byte ranges of a source file.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A half-open byte range `[start, end)` of a named file.
///
/// A chunk is produced by the [`FileChunker`](crate::io::chunker::FileChunker)
/// and handed to exactly one worker. Its range is always non-empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chunk {
    file_name: PathBuf,
    start: u64,
    end: u64,
}

impl Chunk {
    /// Build a chunk, rejecting zero-width and inverted ranges.
    ///
    /// # Errors
    /// Returns [`PipelineError::Boundary`] when `start >= end`.
    pub fn new(file_name: impl Into<PathBuf>, start: u64, end: u64) -> Result<Self, PipelineError> {
        let file_name = file_name.into();
        if start >= end {
            return Err(PipelineError::Boundary {
                file: file_name,
                start,
                end,
            });
        }
        Ok(Self {
            file_name,
            start,
            end,
        })
    }

    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk of {} from {} to {}",
            self.file_name.display(),
            self.start,
            self.end
        )
    }
}
