use anyhow::Result;
use dumpbeam::io::stream_file;
use dumpbeam::testing::*;
use dumpbeam::{BatchExt, PipelineError, batched};

#[test]
fn batch_counts_match_ceil_division() -> Result<()> {
    for len in [0usize, 1, 7, 10, 103] {
        for bs in [1usize, 3, 8, 10, 128] {
            let batches: Vec<Vec<usize>> = batched(0..len, bs)?.collect();
            assert_eq!(batches.len(), len.div_ceil(bs), "len={len} batch_size={bs}");
            if let Some((last, full)) = batches.split_last() {
                assert!(full.iter().all(|b| b.len() == bs));
                let expected_tail = if len % bs == 0 { bs } else { len % bs };
                assert_eq!(last.len(), expected_tail);
            }
            let flat: Vec<usize> = batches.into_iter().flatten().collect();
            assert_eq!(flat, (0..len).collect::<Vec<_>>());
        }
    }
    Ok(())
}

#[test]
fn batches_tail_handling() -> Result<()> {
    let sizes: Vec<usize> = (0..10).batches(4)?.map(|b| b.len()).collect();
    // 10 with batch size 4 -> [4, 4, 2]
    assert_eq!(sizes, vec![4, 4, 2]);
    Ok(())
}

#[test]
fn zero_batch_size_is_a_config_error() {
    let err = (0..3).batches(0).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn record_stream_batches_preserve_order() -> Result<()> {
    let dump = DumpFixture::new(&edition_lines(11))?;
    let batches: Vec<Vec<_>> = stream_file(dump.path())?.batches(5)?.collect();
    assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![5, 5, 1]);
    Ok(())
}
