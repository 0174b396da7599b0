//! Assertions for chunk plans, record streams and stage results.

use crate::chunk::Chunk;
use crate::record::{Record, TransportRecord};
use crate::result::StageResult;
use std::fmt::Debug;

/// Assert that `chunks` tile `[0, file_size)` exactly and that every
/// boundary except the last sits right after a newline of `contents`.
///
/// # Panics
///
/// Panics on a gap, an overlap, an empty chunk or a misaligned boundary.
///
/// # Example
///
/// ```
/// use dumpbeam::chunk::Chunk;
/// use dumpbeam::testing::assert_chunks_cover;
///
/// let contents = b"a\nb\n";
/// let chunks = vec![Chunk::new("f", 0, 2)?, Chunk::new("f", 2, 4)?];
/// assert_chunks_cover(&chunks, contents);
/// # Ok::<(), dumpbeam::PipelineError>(())
/// ```
pub fn assert_chunks_cover(chunks: &[Chunk], contents: &[u8]) {
    let size = contents.len() as u64;
    if size == 0 {
        assert!(chunks.is_empty(), "Empty file produced chunks: {chunks:?}");
        return;
    }
    let mut expected_start = 0;
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(
            c.start(),
            expected_start,
            "Chunk {i} does not start where chunk {} ended:\n  Chunks: {chunks:?}",
            i.saturating_sub(1)
        );
        assert!(c.start() < c.end(), "Chunk {i} is empty: {c:?}");
        if c.end() < size {
            assert_eq!(
                contents[c.end() as usize - 1],
                b'\n',
                "Chunk {i} ends mid-line at byte {}",
                c.end()
            );
        }
        expected_start = c.end();
    }
    assert_eq!(expected_start, size, "Chunks stop at {expected_start} of {size} bytes");
}

/// Assert the success and failure counts of a stage result.
///
/// # Panics
///
/// Panics if either count differs; the message lists the failures.
pub fn assert_stage_counts<T, E: Debug>(
    result: &StageResult<T, E>,
    successes: usize,
    failures: usize,
) {
    assert_eq!(
        (result.successes().len(), result.failures().len()),
        (successes, failures),
        "Unexpected counts for stage `{}`:\n  Expected: {successes} ok / {failures} err\n  Failures: {:?}",
        result.stage_name,
        result.failure_values().collect::<Vec<_>>()
    );
    assert_eq!(result.len(), successes + failures);
}

/// Assert that two record sequences carry the same ids in the same order.
///
/// # Panics
///
/// Panics with both id lists on any difference.
pub fn assert_same_ids(actual: &[TransportRecord], expected: &[TransportRecord]) {
    let a: Vec<&str> = actual.iter().map(Record::id).collect();
    let e: Vec<&str> = expected.iter().map(Record::id).collect();
    assert_eq!(a, e, "Record ids differ:\n  Expected: {e:?}\n  Actual: {a:?}");
}
