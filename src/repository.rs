//! Persistence collaborator.
//!
//! [`Repository`] is the CRUD surface the pipeline needs from a store.
//! [`InMemoryRepository`] implements it over a mutex-guarded vector, which is
//! enough for tests and for single-process runs that post-process results.

use crate::record::Record;
use anyhow::{Result, bail};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Generic CRUD access to stored values of type `T`, keyed by `Id`.
pub trait Repository<T, Id>: Send + Sync {
    /// Insert one value.
    ///
    /// # Errors
    /// Fails if a value with the same id already exists.
    fn create(&self, value: T) -> Result<T>;

    /// Insert many values, silently skipping any that collide with a stored
    /// value (or an earlier value of the same call) on all of `conflict_keys`.
    /// An empty key list means the record id.
    ///
    /// Returns the number of values inserted.
    fn create_many(&self, values: Vec<T>, conflict_keys: &[String]) -> Result<usize>;

    fn get_by_id(&self, id: &Id) -> Result<Option<T>>;

    fn get_all(&self) -> Result<Vec<T>>;

    /// Replace the value stored under `id`, returning the new value, or
    /// `None` when nothing is stored under `id`.
    fn update(&self, id: &Id, value: T) -> Result<Option<T>>;

    /// Remove the value stored under `id`. Returns whether one existed.
    fn delete(&self, id: &Id) -> Result<bool>;
}

#[derive(Debug)]
pub struct InMemoryRepository<T> {
    rows: Mutex<Vec<T>>,
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }
}

impl<T> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rows(&self) -> MutexGuard<'_, Vec<T>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Values of `keys` in `record`, rendered for comparison.
fn conflict_key<T: Record>(record: &T, keys: &[String]) -> Vec<String> {
    if keys.is_empty() {
        return vec![record.id().to_string()];
    }
    let dict = record.as_dict();
    keys.iter()
        .map(|k| dict.get(k).map_or_else(String::new, Value::to_string))
        .collect()
}

impl<T> Repository<T, String> for InMemoryRepository<T>
where
    T: Record + Clone + Send,
{
    fn create(&self, value: T) -> Result<T> {
        let mut rows = self.rows();
        if rows.iter().any(|r| r.id() == value.id()) {
            bail!("a record with id {} already exists", value.id());
        }
        rows.push(value.clone());
        Ok(value)
    }

    fn create_many(&self, values: Vec<T>, conflict_keys: &[String]) -> Result<usize> {
        let mut rows = self.rows();
        let mut seen: HashSet<Vec<String>> =
            rows.iter().map(|r| conflict_key(r, conflict_keys)).collect();
        let mut inserted = 0;
        for value in values {
            if seen.insert(conflict_key(&value, conflict_keys)) {
                rows.push(value);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn get_by_id(&self, id: &String) -> Result<Option<T>> {
        Ok(self.rows().iter().find(|r| r.id() == id).cloned())
    }

    fn get_all(&self) -> Result<Vec<T>> {
        Ok(self.rows().clone())
    }

    fn update(&self, id: &String, value: T) -> Result<Option<T>> {
        let mut rows = self.rows();
        match rows.iter_mut().find(|r| r.id() == id) {
            Some(slot) => {
                *slot = value.clone();
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, id: &String) -> Result<bool> {
        let mut rows = self.rows();
        let before = rows.len();
        rows.retain(|r| r.id() != id);
        Ok(rows.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AuthorRecord;

    #[test]
    fn create_many_ignores_conflicts() -> Result<()> {
        let repo = InMemoryRepository::new();
        repo.create(AuthorRecord::new("OL1A", "Ann"))?;
        let inserted = repo.create_many(
            vec![
                AuthorRecord::new("OL1A", "Ann again"),
                AuthorRecord::new("OL2A", "Bob"),
                AuthorRecord::new("OL2A", "Bob twice"),
            ],
            &[],
        )?;
        assert_eq!(inserted, 1);
        assert_eq!(repo.len(), 2);
        Ok(())
    }

    #[test]
    fn conflict_keys_use_dictionary_fields() -> Result<()> {
        let repo = InMemoryRepository::new();
        let inserted = repo.create_many(
            vec![AuthorRecord::new("OL1A", "Ann"), AuthorRecord::new("OL2A", "Ann")],
            &["name".to_string()],
        )?;
        assert_eq!(inserted, 1);
        Ok(())
    }

    #[test]
    fn update_and_delete() -> Result<()> {
        let repo = InMemoryRepository::new();
        repo.create(AuthorRecord::new("OL1A", "Ann"))?;
        assert!(repo.create(AuthorRecord::new("OL1A", "Dup")).is_err());

        let id = "OL1A".to_string();
        repo.update(&id, AuthorRecord::new("OL1A", "Anne"))?;
        assert_eq!(repo.get_by_id(&id)?.map(|a| a.name), Some("Anne".to_string()));
        assert!(repo.update(&"OL9A".to_string(), AuthorRecord::new("OL9A", "x"))?.is_none());

        assert!(repo.delete(&id)?);
        assert!(!repo.delete(&id)?);
        assert!(repo.get_all()?.is_empty());
        Ok(())
    }
}
