use super::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An author with normalized life dates.
///
/// Years are `-1` when the dump gives no usable date. `work_count` is an
/// accumulator that later stages bump with [`add_work`](AuthorRecord::add_work).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: String,
    pub name: String,
    pub birth_date: i32,
    pub death_date: i32,
    pub is_death_date_exact: bool,
    work_count: u64,
}

impl AuthorRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            birth_date: -1,
            death_date: -1,
            is_death_date_exact: false,
            work_count: 0,
        }
    }

    #[must_use]
    pub fn with_dates(mut self, birth_date: i32, death_date: i32, is_death_date_exact: bool) -> Self {
        self.birth_date = birth_date;
        self.death_date = death_date;
        self.is_death_date_exact = is_death_date_exact;
        self
    }

    pub fn add_work(&mut self, amount: u64) {
        self.work_count += amount;
    }

    pub fn work_count(&self) -> u64 {
        self.work_count
    }
}

impl Record for AuthorRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn as_dict(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("ol_id".into(), Value::from(self.id.clone()));
        m.insert("name".into(), Value::from(self.name.clone()));
        m.insert("birth_date".into(), Value::from(self.birth_date));
        m.insert("death_date".into(), Value::from(self.death_date));
        m.insert("is_death_date_exact".into(), Value::from(self.is_death_date_exact));
        m.insert("work_count".into(), Value::from(self.work_count));
        m
    }

    fn as_tuple(&self) -> Vec<Value> {
        vec![
            Value::from(self.id.clone()),
            Value::from(self.name.clone()),
            Value::from(self.birth_date),
            Value::from(self.death_date),
            Value::from(self.is_death_date_exact),
            Value::from(self.work_count),
        ]
    }
}
