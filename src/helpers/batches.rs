//! Fixed-size batching over any iterator.
//!
//! Workers never hold a whole chunk in memory: records are pulled from the
//! stream `batch_size` at a time and handed to the pipeline as one group.
//!
//! - [`batched`] wraps an iterator, rejecting a zero batch size up front.
//! - [`BatchExt::batches`] is the same thing as an extension method.
//!
//! Every batch holds exactly `size` items except possibly the last, which
//! holds the remainder. An empty input yields no batches.

use crate::error::PipelineError;
use std::iter::FusedIterator;

/// Iterator adapter yielding `Vec<I::Item>` groups of a fixed size.
#[derive(Debug)]
pub struct Batches<I> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Batches<I> {
    /// Batch size in use.
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Group `iter` into batches of `size` items.
///
/// # Errors
/// Returns [`PipelineError::Config`] when `size == 0`.
///
/// # Example
/// ```
/// use dumpbeam::helpers::batched;
///
/// let groups: Vec<Vec<u32>> = batched(0..10, 4)?.collect();
/// assert_eq!(groups, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);
/// # Ok::<(), dumpbeam::PipelineError>(())
/// ```
pub fn batched<T: IntoIterator>(
    iter: T,
    size: usize,
) -> Result<Batches<T::IntoIter>, PipelineError> {
    if size == 0 {
        return Err(PipelineError::config("batch size must be at least 1"));
    }
    Ok(Batches {
        inner: iter.into_iter(),
        size,
    })
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<_> = self.inner.by_ref().take(self.size).collect();
        if batch.is_empty() { None } else { Some(batch) }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.inner.size_hint();
        (lo.div_ceil(self.size), hi.map(|h| h.div_ceil(self.size)))
    }
}

impl<I: FusedIterator> FusedIterator for Batches<I> {}

/// Extension trait adding [`batches`](BatchExt::batches) to every iterator.
pub trait BatchExt: Iterator + Sized {
    /// See [`batched`].
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] when `size == 0`.
    fn batches(self, size: usize) -> Result<Batches<Self>, PipelineError> {
        batched(self, size)
    }
}

impl<I: Iterator> BatchExt for I {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_size() {
        assert!(matches!(batched(0..3, 0), Err(PipelineError::Config(_))));
    }

    #[test]
    fn size_hint_rounds_up() -> anyhow::Result<()> {
        let b = (0..10).batches(3)?;
        assert_eq!(b.size_hint(), (4, Some(4)));
        Ok(())
    }
}
