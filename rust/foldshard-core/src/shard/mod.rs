// rust/foldshard-core/src/shard/mod.rs

//! Shard files and the parallel writer pool that produces them.

mod format;
mod pool;
mod reader;
mod writer;

pub use format::{
    checksum, shard_file_name, Compression, ShardHeader, ShardRecord, FRAME_HEADER_LEN,
};
pub use pool::{
    run_worker, slice_bounds, ShardWriterPool, SplitWriteSummary, WorkerContext, WorkerSummary,
};
pub use reader::ShardReader;
pub use writer::{SealedShard, ShardOptions, ShardWriter};

/// Extension of sealed shard files.
pub const SHARD_EXTENSION: &str = "shard";
