use super::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A published edition with normalized references.
///
/// `authors`, `languages` and `works` hold bare ids (`OL1A`, `eng`, `OL1W`),
/// never link objects. Years are `-1` when unknown.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditionRecord {
    pub id: String,
    /// Internet Archive identifier, empty when absent.
    pub ocaid: String,
    pub title: String,
    pub publishing_date: i32,
    pub copyright_date: i32,
    pub authors: Vec<String>,
    pub languages: Vec<String>,
    pub isbn_10: Vec<String>,
    pub isbn_13: Vec<String>,
    pub works: Vec<String>,
}

impl EditionRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            publishing_date: -1,
            copyright_date: -1,
            ..Self::default()
        }
    }
}

fn strings(v: &[String]) -> Value {
    Value::Array(v.iter().cloned().map(Value::from).collect())
}

impl Record for EditionRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn as_dict(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("ol_id".into(), Value::from(self.id.clone()));
        m.insert("ocaid".into(), Value::from(self.ocaid.clone()));
        m.insert("title".into(), Value::from(self.title.clone()));
        m.insert("authors".into(), strings(&self.authors));
        m.insert("publishing_date".into(), Value::from(self.publishing_date));
        m.insert("copyright_date".into(), Value::from(self.copyright_date));
        m.insert("languages".into(), strings(&self.languages));
        m.insert("isbn_10".into(), strings(&self.isbn_10));
        m.insert("isbn_13".into(), strings(&self.isbn_13));
        m.insert("works".into(), strings(&self.works));
        m
    }

    fn as_tuple(&self) -> Vec<Value> {
        vec![
            Value::from(self.id.clone()),
            Value::from(self.ocaid.clone()),
            Value::from(self.title.clone()),
            strings(&self.authors),
            Value::from(self.publishing_date),
            Value::from(self.copyright_date),
            strings(&self.languages),
            strings(&self.isbn_10),
            strings(&self.isbn_13),
            strings(&self.works),
        ]
    }
}
