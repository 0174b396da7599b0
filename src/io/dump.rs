//! Streaming reader for tab-separated record dumps.
//!
//! Each physical line of a dump has five tab-separated columns:
//! `type`, `id`, `revision`, `last_modified` and a JSON payload. The reader
//! turns every well-formed line into a [`TransportRecord`] and skips the rest.
//!
//! # Ownership of lines across chunks
//! [`RecordStream`] stops *before* a line whose end would pass the range end.
//! The chunk that contains a line's terminating newline owns the line, so two
//! adjacent ranges never yield the same record.

use crate::error::PipelineError;
use crate::record::TransportRecord;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Number of tab-separated columns in a dump line.
pub const DUMP_COLUMNS: usize = 5;

/// Lazy iterator over the transport records of one byte range.
///
/// Yields `Err` only for I/O failures; malformed lines are skipped with a
/// debug diagnostic. The stream is not restartable: open a new one to read the
/// range again.
pub struct RecordStream {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
    end: u64,
    line_no: u64,
    buf: Vec<u8>,
    done: bool,
}

/// Open a stream over `[start, end)` of `file_name`.
///
/// # Errors
/// Returns an I/O error if the file cannot be opened or positioned.
pub fn stream(file_name: impl AsRef<Path>, start: u64, end: u64) -> Result<RecordStream> {
    RecordStream::open(file_name, start, end)
}

/// Open a stream over the whole file.
///
/// # Errors
/// Returns an I/O error if the file cannot be inspected or opened.
pub fn stream_file(file_name: impl AsRef<Path>) -> Result<RecordStream> {
    let path = file_name.as_ref();
    let size = std::fs::metadata(path)
        .map_err(|e| PipelineError::io(path, e))
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    RecordStream::open(path, 0, size)
}

impl RecordStream {
    pub fn open(file_name: impl AsRef<Path>, start: u64, end: u64) -> Result<Self> {
        let path = file_name.as_ref().to_path_buf();
        let mut f = File::open(&path)
            .map_err(|e| PipelineError::io(&path, e))
            .with_context(|| format!("open {}", path.display()))?;
        f.seek(SeekFrom::Start(start))
            .map_err(|e| PipelineError::io(&path, e))
            .with_context(|| format!("seek to {start} in {}", path.display()))?;
        Ok(Self {
            path,
            reader: BufReader::new(f),
            offset: start,
            end,
            line_no: 0,
            buf: Vec::new(),
            done: false,
        })
    }

    /// Byte offset just past the last line consumed.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for RecordStream {
    type Item = Result<TransportRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            let n = match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    let err = anyhow::Error::new(PipelineError::io(&self.path, e)).context(format!(
                        "read line at byte {} in {}",
                        self.offset,
                        self.path.display()
                    ));
                    return Some(Err(err));
                }
            };
            if n == 0 || self.offset + n as u64 > self.end {
                self.done = true;
                break;
            }
            self.offset += n as u64;
            self.line_no += 1;

            match parse_line(&self.buf) {
                LineOutcome::Record(rec) => return Some(Ok(rec)),
                LineOutcome::Blank => continue,
                LineOutcome::Malformed(reason) => {
                    tracing::debug!(
                        file = %self.path.display(),
                        line = self.line_no,
                        offset = self.offset,
                        end = self.end,
                        "skipping malformed line: {reason}"
                    );
                }
            }
        }
        None
    }
}

enum LineOutcome {
    Record(TransportRecord),
    Blank,
    Malformed(String),
}

fn parse_line(raw: &[u8]) -> LineOutcome {
    let line = match std::str::from_utf8(raw) {
        Ok(s) => s.trim_end_matches(['\n', '\r']),
        Err(e) => return LineOutcome::Malformed(format!("invalid utf-8: {e}")),
    };
    if line.trim().is_empty() {
        return LineOutcome::Blank;
    }
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() != DUMP_COLUMNS {
        return LineOutcome::Malformed(format!(
            "expected {DUMP_COLUMNS} columns, found {}",
            parts.len()
        ));
    }
    LineOutcome::Record(TransportRecord::new(parts[1], parts[0], parts[4]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    #[test]
    fn parse_line_maps_columns() {
        let LineOutcome::Record(rec) =
            parse_line(b"/type/author\t/authors/OL1A\t3\t2020-01-01\t{\"name\":\"A\"}\r\n")
        else {
            panic!("expected a record");
        };
        assert_eq!(rec.type_tag(), "/type/author");
        assert_eq!(rec.id(), "/authors/OL1A");
        assert_eq!(rec.raw_json(), "{\"name\":\"A\"}");
    }

    #[test]
    fn parse_line_rejects_wrong_column_count() {
        assert!(matches!(parse_line(b"a\tb\tc\n"), LineOutcome::Malformed(_)));
        assert!(matches!(parse_line(b"   \n"), LineOutcome::Blank));
        assert!(matches!(parse_line(&[0xff, 0xfe, b'\n']), LineOutcome::Malformed(_)));
    }
}
