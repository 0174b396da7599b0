pub mod chunker;
pub mod dump;
pub mod glob;

#[cfg_attr(docsrs, doc(cfg(feature = "io-jsonl")))]
#[cfg(feature = "io-jsonl")]
pub mod jsonl;

pub use chunker::{ChunkPlan, FileChunker, split_file};
pub use dump::{DUMP_COLUMNS, RecordStream, stream, stream_file};
pub use glob::{expand_glob, resolve_inputs};
