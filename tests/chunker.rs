//! Chunk planning: contiguous, line-aligned, complete cover of the file.

use anyhow::Result;
use dumpbeam::io::{FileChunker, stream, stream_file};
use dumpbeam::testing::*;
use dumpbeam::{Chunk, PipelineError, TransportRecord};

fn line_of(len: usize, tag: char) -> String {
    let mut s: String = std::iter::repeat_n(tag, len - 1).collect();
    s.push('\n');
    s
}

#[test]
fn seven_lines_on_two_cpus_gives_two_chunks() -> Result<()> {
    // 70 bytes with a newline exactly at the midpoint.
    let lines: Vec<String> = [10, 10, 15, 10, 10, 10, 5]
        .iter()
        .zip("abcdefg".chars())
        .map(|(len, c)| line_of(*len, c))
        .collect();
    let dump = DumpFixture::new(&lines)?;

    let plan = FileChunker::new()
        .with_available_cpus(2)
        .split(dump.path(), 4)?;

    assert_eq!(plan.workers_used, 2);
    assert_eq!(plan.chunk_count, 2);
    assert_eq!(plan.chunks[0].end(), 35);
    assert_chunks_cover(&plan.chunks, &dump.contents()?);
    Ok(())
}

#[test]
fn cover_holds_for_many_worker_counts() -> Result<()> {
    let lines: Vec<String> = (1..=40).map(|i| line_of(5 + (i * 7) % 23, 'x')).collect();
    let dump = DumpFixture::new(&lines)?;
    let contents = dump.contents()?;

    for workers in 1..=12 {
        let plan = FileChunker::new()
            .with_available_cpus(16)
            .split(dump.path(), workers)?;
        assert_eq!(plan.workers_used, workers);
        assert_eq!(plan.chunk_count, plan.chunks.len());
        assert_chunks_cover(&plan.chunks, &contents);
    }
    Ok(())
}

#[test]
fn empty_file_yields_no_chunks() -> Result<()> {
    let dump = DumpFixture::from_bytes(b"")?;
    let plan = FileChunker::new().with_available_cpus(4).split(dump.path(), 4)?;
    assert_eq!(plan.chunk_count, 0);
    assert!(plan.chunks.is_empty());
    Ok(())
}

#[test]
fn line_longer_than_ideal_size_moves_boundary_forward() -> Result<()> {
    let lines = vec![line_of(200, 'a'), line_of(3, 'b'), line_of(3, 'c')];
    let dump = DumpFixture::new(&lines)?;
    let plan = FileChunker::new().with_available_cpus(8).split(dump.path(), 8)?;

    assert_eq!(plan.chunks[0].end(), 200);
    assert_chunks_cover(&plan.chunks, &dump.contents()?);
    Ok(())
}

#[test]
fn missing_trailing_newline_is_still_covered() -> Result<()> {
    let dump = DumpFixture::from_bytes(b"aaaa\nbbbb\ncccc")?;
    let plan = FileChunker::new().with_available_cpus(3).split(dump.path(), 3)?;
    assert_eq!(plan.chunks.last().map(Chunk::end), Some(14));
    assert_chunks_cover(&plan.chunks, &dump.contents()?);
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = FileChunker::new()
        .with_available_cpus(2)
        .split("/definitely/not/here.txt", 2)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::Io { .. })
    ));
}

#[test]
fn chunked_streaming_equals_whole_file_streaming() -> Result<()> {
    let dump = DumpFixture::new(&sample_dump_lines())?;
    let whole: Vec<TransportRecord> = stream_file(dump.path())?.collect::<Result<_>>()?;
    assert_eq!(whole.len(), 7);

    for workers in 1..=6 {
        let plan = FileChunker::new()
            .with_available_cpus(workers)
            .split(dump.path(), workers)?;
        let mut chunked = Vec::new();
        for c in &plan.chunks {
            for rec in stream(c.file_name(), c.start(), c.end())? {
                chunked.push(rec?);
            }
        }
        assert_same_ids(&chunked, &whole);
        assert_eq!(chunked, whole, "workers={workers}");
    }
    Ok(())
}

#[test]
fn chunk_rejects_empty_and_inverted_ranges() {
    assert!(matches!(
        Chunk::new("f", 5, 5),
        Err(PipelineError::Boundary { start: 5, end: 5, .. })
    ));
    assert!(Chunk::new("f", 6, 5).is_err());
    assert!(Chunk::new("f", 0, 1).is_ok());
}
