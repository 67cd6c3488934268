// rust/foldshard-core/src/lib.rs

//! foldshard - Core Library
//!
//! Cluster-aware train/validate/test splitting of amino-acid records and
//! parallel, checksummed shard serialization of the resulting splits.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::PipelineConfig;
pub use error::{FoldshardError, Result, WorkerFailure};
pub use storage::{LocalStorage, ObjectMeta, StorageBackend, StorageReader, StorageWriter};

pub mod index;
pub use index::{RecordId, RecordIndex, RecordLocation};

pub mod source;
pub use source::{
    FixedSizeFormat, LengthPrefixedFormat, NewlineDelimitedFormat, RawRecord, RecordFormat,
};

pub mod encoding;
pub use encoding::{EncodedRecord, RecordEncoder, ResidueTable, TableEncoder};

pub mod split;
pub use split::{Group, SplitAssignment, SplitKind, SplitRatios, SplitReport};

pub mod shard;
pub use shard::{Compression, ShardReader, ShardWriterPool, SplitWriteSummary, WorkerContext};

pub mod manifest;
pub use manifest::Manifest;

pub mod verify;
pub use verify::{verify_dataset, VerificationReport};

pub mod pipeline;
pub use pipeline::{BuildOutcome, Pipeline, SplitOutcome};
