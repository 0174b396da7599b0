//! Path-keyed mutex registry.
//!
//! Stages that append to shared files at shutdown serialize their writes
//! through a [`PathLocks`] registry. Keys are normalized absolute paths, so
//! `out/summary.jsonl` and `./out/../out/summary.jsonl` share one lock.
//!
//! The registry is an explicit value owned by whoever runs the workers and
//! cloned into each of them. Clones share the same underlying map. It only
//! coordinates threads of one process.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

type LockMap = HashMap<PathBuf, Arc<Mutex<()>>>;

#[derive(Clone, Debug, Default)]
pub struct PathLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding `path`, created on first use.
    ///
    /// # Errors
    /// Returns an error if `path` cannot be made absolute.
    pub fn lock_for(&self, path: impl AsRef<Path>) -> Result<Arc<Mutex<()>>> {
        let key = normalize_path(path.as_ref())?;
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(map.entry(key).or_default()))
    }

    /// Run `f` while holding the lock for `path`.
    ///
    /// # Errors
    /// Propagates errors from path normalization and from `f`.
    pub fn with_lock<R>(&self, path: impl AsRef<Path>, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let lock = self.lock_for(path)?;
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Number of distinct paths seen so far.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Absolute, lexically cleaned form of `path` (no `.` or `..` components).
///
/// Symlinks are not resolved and the path need not exist.
///
/// # Errors
/// Returns an error if the current directory cannot be determined.
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    let abs = std::path::absolute(path)
        .with_context(|| format!("make {} absolute", path.display()))?;
    let mut out = PathBuf::new();
    for comp in abs.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_paths_share_a_lock() -> Result<()> {
        let locks = PathLocks::new();
        let a = locks.lock_for("out/summary.jsonl")?;
        let b = locks.lock_for("./out/../out/summary.jsonl")?;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(locks.len(), 1);
        Ok(())
    }

    #[test]
    fn clones_share_the_registry() -> Result<()> {
        let locks = PathLocks::new();
        let other = locks.clone();
        other.with_lock("a.txt", || Ok(()))?;
        assert_eq!(locks.len(), 1);
        Ok(())
    }
}
