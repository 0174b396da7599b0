//! Record types flowing through a worker pipeline.
//!
//! - [`TransportRecord`] is the raw `(type, id, json)` triple read from a dump line.
//! - [`DomainRecord`] is the typed, normalized view built by the
//!   [entry parser](parser). It is a closed set of variants: stages match on
//!   it instead of probing types at runtime.
//!
//! Every record type implements [`Record`], which provides the dictionary and
//! tuple projections used by sinks and repositories.

pub mod author;
pub mod edition;
pub mod parser;

pub use author::AuthorRecord;
pub use edition::EditionRecord;
pub use parser::{EntryParser, RecordKind, parse_batch, parse_record};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Common projections shared by all records.
pub trait Record {
    /// Record identifier (the last segment of the dump id).
    fn id(&self) -> &str;

    /// Field name → value projection.
    fn as_dict(&self) -> Map<String, Value>;

    /// Positional projection in declaration order of the record's fields.
    fn as_tuple(&self) -> Vec<Value>;

    /// Compact JSON rendering of [`as_dict`](Record::as_dict).
    fn as_json(&self) -> String {
        Value::Object(self.as_dict()).to_string()
    }
}

/// The raw record read from one dump line, before interpretation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportRecord {
    id: String,
    type_tag: String,
    raw_json: String,
}

impl TransportRecord {
    pub fn new(
        id: impl Into<String>,
        type_tag: impl Into<String>,
        raw_json: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            type_tag: type_tag.into(),
            raw_json: raw_json.into(),
        }
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn raw_json(&self) -> &str {
        &self.raw_json
    }
}

impl Record for TransportRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn as_dict(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("ol_id".into(), Value::from(self.id.clone()));
        m.insert("type".into(), Value::from(self.type_tag.clone()));
        m.insert("json_string".into(), Value::from(self.raw_json.clone()));
        m
    }

    fn as_tuple(&self) -> Vec<Value> {
        vec![
            Value::from(self.id.clone()),
            Value::from(self.type_tag.clone()),
            Value::from(self.raw_json.clone()),
        ]
    }
}

/// A typed, normalized record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainRecord {
    Author(AuthorRecord),
    Edition(EditionRecord),
}

impl DomainRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Author(_) => RecordKind::Author,
            Self::Edition(_) => RecordKind::Edition,
        }
    }

    pub fn as_author(&self) -> Option<&AuthorRecord> {
        match self {
            Self::Author(a) => Some(a),
            Self::Edition(_) => None,
        }
    }

    pub fn as_author_mut(&mut self) -> Option<&mut AuthorRecord> {
        match self {
            Self::Author(a) => Some(a),
            Self::Edition(_) => None,
        }
    }

    pub fn as_edition(&self) -> Option<&EditionRecord> {
        match self {
            Self::Edition(e) => Some(e),
            Self::Author(_) => None,
        }
    }
}

impl Record for DomainRecord {
    fn id(&self) -> &str {
        match self {
            Self::Author(a) => a.id(),
            Self::Edition(e) => e.id(),
        }
    }

    fn as_dict(&self) -> Map<String, Value> {
        match self {
            Self::Author(a) => a.as_dict(),
            Self::Edition(e) => e.as_dict(),
        }
    }

    fn as_tuple(&self) -> Vec<Value> {
        match self {
            Self::Author(a) => a.as_tuple(),
            Self::Edition(e) => e.as_tuple(),
        }
    }
}

impl From<AuthorRecord> for DomainRecord {
    fn from(value: AuthorRecord) -> Self {
        Self::Author(value)
    }
}

impl From<EditionRecord> for DomainRecord {
    fn from(value: EditionRecord) -> Self {
        Self::Edition(value)
    }
}
