//! Dump files and lines for tests.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// One well-formed dump line (with trailing newline).
///
/// # Example
///
/// ```
/// use dumpbeam::testing::dump_line;
///
/// let line = dump_line("/type/edition", "/books/OL1M", r#"{"title":"T"}"#);
/// assert_eq!(line.split('\t').count(), 5);
/// ```
#[must_use]
pub fn dump_line(type_tag: &str, id: &str, json: &str) -> String {
    format!("{type_tag}\t{id}\t1\t2008-04-01T03:28:50.625462\t{json}\n")
}

#[must_use]
pub fn edition_line(n: usize, json: &str) -> String {
    dump_line("/type/edition", &format!("/books/OL{n}M"), json)
}

#[must_use]
pub fn author_line(n: usize, json: &str) -> String {
    dump_line("/type/author", &format!("/authors/OL{n}A"), json)
}

/// A complete, valid English edition payload.
#[must_use]
pub fn valid_edition_json(n: usize) -> String {
    format!(
        r#"{{"title":"Book {n}","ocaid":"book{n}ia","publish_date":"19{:02}","authors":[{{"key":"/authors/OL{n}A"}}],"languages":[{{"key":"/languages/eng"}}]}}"#,
        n % 100
    )
}

/// A mixed dump: valid editions, an author, a work, an edition missing its
/// ocaid, a French edition, a malformed 3-column line and a blank line.
#[must_use]
pub fn sample_dump_lines() -> Vec<String> {
    vec![
        edition_line(1, &valid_edition_json(1)),
        author_line(1, r#"{"name":"Ann Author","birth_date":"1820","death_date":"ca. 1890"}"#),
        edition_line(2, &valid_edition_json(2)),
        dump_line("/type/work", "/works/OL1W", r#"{"title":"A work"}"#),
        "/type/edition\t/books/OL99M\t1\n".to_string(),
        edition_line(3, r#"{"title":"No scan","publish_date":"1950"}"#),
        "\n".to_string(),
        edition_line(
            4,
            r#"{"title":"Livre","ocaid":"livre","publish_date":"1930","languages":[{"key":"/languages/fre"}]}"#,
        ),
        edition_line(5, &valid_edition_json(5)),
    ]
}

/// `n` valid edition lines.
#[must_use]
pub fn edition_lines(n: usize) -> Vec<String> {
    (1..=n).map(|i| edition_line(i, &valid_edition_json(i))).collect()
}

/// A dump file in a temporary directory, removed on drop.
#[derive(Debug)]
pub struct DumpFixture {
    dir: TempDir,
    path: PathBuf,
}

impl DumpFixture {
    /// Write `lines` verbatim (no separators added) to `dump.txt`.
    ///
    /// # Errors
    /// Returns an error if the temporary directory or file cannot be created.
    pub fn new<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let contents: String = lines.iter().map(AsRef::as_ref).collect();
        Self::from_bytes(contents.as_bytes())
    }

    pub fn from_bytes(contents: &[u8]) -> Result<Self> {
        let dir = tempfile::tempdir().context("create fixture dir")?;
        let path = dir.path().join("dump.txt");
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the dump; handy for stage outputs.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn contents(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).with_context(|| format!("read {}", self.path.display()))
    }

    pub fn size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }
}
