//! Entry point of every worker pipeline: transport records → domain records.
//!
//! Dispatch happens on the last `/` segment of the record's type tag through an
//! explicit table held by [`EntryParser`]. A record that cannot be normalized
//! becomes a [`RecordFailure`] in the returned [`StageResult`]; the rest of the
//! batch is parsed regardless.

use super::{AuthorRecord, DomainRecord, EditionRecord, Record, TransportRecord};
use crate::result::{RecordFailure, StageResult};
use crate::year::{YearOptions, extract_year};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Stage name reported by [`parse_batch`].
pub const ENTRY_POINT: &str = "Entry point";

/// Record kinds recognized in a dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Author,
    Edition,
    Work,
}

impl RecordKind {
    /// Map a dump type tag such as `/type/edition` to a kind.
    pub fn from_tag(type_tag: &str) -> Option<Self> {
        match last_segment(type_tag) {
            "author" => Some(Self::Author),
            "edition" => Some(Self::Edition),
            "work" => Some(Self::Work),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Edition => "edition",
            Self::Work => "work",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type NormalizeFn = fn(&str, &Map<String, Value>) -> Result<DomainRecord, String>;

#[derive(Clone, Copy)]
enum Normalizer {
    Supported(NormalizeFn),
    Unsupported,
}

/// Tag-driven parser from [`TransportRecord`] to [`DomainRecord`].
#[derive(Clone)]
pub struct EntryParser {
    table: HashMap<RecordKind, Normalizer>,
}

impl Default for EntryParser {
    fn default() -> Self {
        let mut table = HashMap::new();
        table.insert(RecordKind::Author, Normalizer::Supported(normalize_author));
        table.insert(RecordKind::Edition, Normalizer::Supported(normalize_edition));
        table.insert(RecordKind::Work, Normalizer::Unsupported);
        Self { table }
    }
}

static DEFAULT_PARSER: LazyLock<EntryParser> = LazyLock::new(EntryParser::default);

impl EntryParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kinds this parser turns into domain records.
    pub fn supported_kinds(&self) -> Vec<RecordKind> {
        let mut kinds: Vec<_> = self
            .table
            .iter()
            .filter(|(_, n)| matches!(n, Normalizer::Supported(_)))
            .map(|(k, _)| *k)
            .collect();
        kinds.sort();
        kinds
    }

    /// Parse one transport record.
    ///
    /// # Errors
    /// Returns a [`RecordFailure`] for unknown or unsupported types and for
    /// payloads that are not valid JSON objects of the expected shape.
    pub fn parse(&self, record: &TransportRecord) -> Result<DomainRecord, RecordFailure> {
        let fail = |msg: String| RecordFailure::new(ENTRY_POINT, msg).with_record(record.id());

        let kind = RecordKind::from_tag(record.type_tag())
            .ok_or_else(|| fail(format!("unknown record type `{}`", record.type_tag())))?;
        let normalize = match self.table.get(&kind) {
            Some(Normalizer::Supported(f)) => *f,
            Some(Normalizer::Unsupported) => {
                return Err(fail(format!("{kind} records are not supported")));
            }
            None => return Err(fail(format!("no normalizer registered for {kind}"))),
        };

        let payload: Value = serde_json::from_str(record.raw_json())
            .map_err(|e| fail(format!("invalid JSON payload: {e}")))?;
        let Value::Object(obj) = payload else {
            return Err(fail("payload is not a JSON object".to_string()));
        };
        normalize(last_segment(record.id()), &obj).map_err(fail)
    }

    pub fn parse_batch<I>(&self, records: I) -> StageResult<DomainRecord, RecordFailure>
    where
        I: IntoIterator<Item = TransportRecord>,
    {
        let mut result = StageResult::new(ENTRY_POINT, "");
        for record in records {
            match self.parse(&record) {
                Ok(parsed) => result.add_ok(parsed),
                Err(failure) => result.add_err(failure),
            }
        }
        result.details = format!(
            "parsed {} of {} records",
            result.successes().len(),
            result.len()
        );
        result
    }
}

/// Parse one record with the default table.
pub fn parse_record(record: &TransportRecord) -> Result<DomainRecord, RecordFailure> {
    DEFAULT_PARSER.parse(record)
}

/// Parse a batch with the default table.
///
/// ```
/// use dumpbeam::record::{parse_batch, TransportRecord};
///
/// let batch = vec![
///     TransportRecord::new("/books/OL1M", "/type/edition", r#"{"title":"T"}"#),
///     TransportRecord::new("/works/OL1W", "/type/work", "{}"),
/// ];
/// let result = parse_batch(batch);
/// assert_eq!(result.successes().len(), 1);
/// assert_eq!(result.failures().len(), 1);
/// ```
pub fn parse_batch<I>(records: I) -> StageResult<DomainRecord, RecordFailure>
where
    I: IntoIterator<Item = TransportRecord>,
{
    DEFAULT_PARSER.parse_batch(records)
}

fn last_segment(s: &str) -> &str {
    s.rsplit('/').next().unwrap_or(s)
}

fn normalize_author(id: &str, obj: &Map<String, Value>) -> Result<DomainRecord, String> {
    let name = string_field(obj, "name")?;
    let (birth, _) = date_field(obj, "birth_date", YearOptions::default())?;
    let (death, approximate) = date_field(obj, "death_date", YearOptions::default())?;
    Ok(AuthorRecord::new(id, name)
        .with_dates(birth, death, death != -1 && !approximate)
        .into())
}

fn normalize_edition(id: &str, obj: &Map<String, Value>) -> Result<DomainRecord, String> {
    let (publishing_date, _) = date_field(obj, "publish_date", YearOptions::exact())?;
    let copyright_key = if obj.contains_key("copyright_date") {
        "copyright_date"
    } else {
        "copyright"
    };
    let (copyright_date, _) = date_field(obj, copyright_key, YearOptions::exact())?;

    Ok(EditionRecord {
        id: id.to_string(),
        ocaid: string_field(obj, "ocaid")?,
        title: string_field(obj, "title")?,
        publishing_date,
        copyright_date,
        authors: reference_list(obj, "authors")?,
        languages: reference_list(obj, "languages")?,
        isbn_10: string_list(obj, "isbn_10"),
        isbn_13: string_list(obj, "isbn_13"),
        works: reference_list(obj, "works")?,
    }
    .into())
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Result<String, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(format!("field `{key}` must be a string, got {other}")),
    }
}

fn date_field(
    obj: &Map<String, Value>,
    key: &str,
    opts: YearOptions,
) -> Result<(i32, bool), String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok((-1, false)),
        Some(Value::String(s)) => Ok(extract_year(s, opts)),
        Some(Value::Number(n)) => Ok(extract_year(&n.to_string(), opts)),
        Some(other) => Err(format!("field `{key}` is not a date, got {other}")),
    }
}

/// `"OL1A"`, `"/authors/OL1A"` and `{"key": "/authors/OL1A"}` all yield `OL1A`.
fn reference(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(last_segment(s)),
        Value::Object(o) => o.get("key").and_then(Value::as_str).map(last_segment),
        _ => None,
    }
}

fn reference_list(obj: &Map<String, Value>, key: &str) -> Result<Vec<String>, String> {
    let bad = |v: &Value| format!("field `{key}` holds an invalid reference: {v}");
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| reference(v).map(str::to_string).ok_or_else(|| bad(v)))
            .collect(),
        Some(single) => reference(single)
            .map(|r| vec![r.to_string()])
            .ok_or_else(|| bad(single)),
    }
}

fn string_list(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edition(json: &str) -> EditionRecord {
        let rec = TransportRecord::new("/books/OL1M", "/type/edition", json);
        match parse_record(&rec) {
            Ok(DomainRecord::Edition(e)) => e,
            other => panic!("expected edition, got {other:?}"),
        }
    }

    #[test]
    fn references_accept_strings_and_key_objects() {
        let e = edition(
            r#"{"authors":[{"key":"/authors/OL1A"},"/authors/OL2A"],
                "languages":{"key":"/languages/eng"},
                "works":"OL9W"}"#,
        );
        assert_eq!(e.authors, vec!["OL1A", "OL2A"]);
        assert_eq!(e.languages, vec!["eng"]);
        assert_eq!(e.works, vec!["OL9W"]);
    }

    #[test]
    fn copyright_falls_back_to_alternate_key() {
        let e = edition(r#"{"copyright":"1953","publish_date":"ca. 1960"}"#);
        assert_eq!(e.copyright_date, 1953);
        assert_eq!(e.publishing_date, 1960);
    }

    #[test]
    fn isbn_lists_keep_strings_only() {
        let e = edition(r#"{"isbn_10":["0140328726", 42, null]}"#);
        assert_eq!(e.isbn_10, vec!["0140328726"]);
        assert!(e.isbn_13.is_empty());
    }

    #[test]
    fn wrong_shapes_are_failures() {
        let rec = TransportRecord::new("/books/OL1M", "/type/edition", r#"{"title":3}"#);
        let err = parse_record(&rec).unwrap_err();
        assert_eq!(err.record_id.as_deref(), Some("/books/OL1M"));
        assert!(err.message.contains("title"));
    }

    #[test]
    fn supported_kinds_excludes_work() {
        assert_eq!(
            EntryParser::new().supported_kinds(),
            vec![RecordKind::Author, RecordKind::Edition]
        );
    }
}
