// rust/foldshard-core/src/shard/writer.rs

//! Append-only shard writer.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::format::{encode_frame, shard_file_name, Compression, ShardHeader, ShardRecord};
use crate::config::WriterConfig;
use crate::error::{FoldshardError, Result};
use crate::storage::{temp_sibling, StorageBackend, StorageWriter};

/// Per-shard write options shared by every worker.
#[derive(Debug, Clone)]
pub struct ShardOptions {
    pub compression: Compression,
    /// Compression level (zstd only).
    pub compression_level: i32,
    /// Write to `.part*.tmp` and rename on seal.
    pub atomic_writes: bool,
}

impl Default for ShardOptions {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            compression_level: 3,
            atomic_writes: true,
        }
    }
}

impl ShardOptions {
    pub fn from_config(config: &WriterConfig) -> Result<Self> {
        Ok(Self {
            compression: Compression::from_name(&config.compression)?,
            compression_level: config.compression_level,
            atomic_writes: config.atomic_writes,
        })
    }
}

/// A shard that has been sealed and renamed into place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedShard {
    pub path: PathBuf,
    pub records: u64,
}

/// Writes records into one shard file.
///
/// The file is created with its header on construction, appended to record
/// by record, and finalized by [`ShardWriter::seal`]. A writer dropped
/// without sealing leaves its temporary file behind.
pub struct ShardWriter {
    writer: Box<dyn StorageWriter>,
    storage: Arc<dyn StorageBackend>,
    final_path: PathBuf,
    write_path: PathBuf,
    // Mirrors `header.compression`.
    compression: Compression,
    compression_level: i32,
    records: u64,
}

impl ShardWriter {
    /// Creates `dir/part<worker>_<shard>.shard` and writes its header.
    pub fn create(
        storage: Arc<dyn StorageBackend>,
        dir: &Path,
        header: &ShardHeader,
        options: &ShardOptions,
    ) -> Result<Self> {
        let final_path = dir.join(shard_file_name(
            header.worker_id as usize,
            header.shard_index as usize,
        ));
        let write_path = if options.atomic_writes {
            temp_sibling(&final_path)
        } else {
            final_path.clone()
        };

        let mut writer = storage.open_write(&write_path)?;
        writer
            .write_all(&header.to_bytes()?)
            .map_err(|e| FoldshardError::storage_with_source(&write_path, "failed to write shard header", e))?;

        debug!(path = %write_path.display(), "Opened shard");

        Ok(Self {
            writer,
            storage,
            final_path,
            write_path,
            compression: header.compression,
            compression_level: options.compression_level,
            records: 0,
        })
    }

    /// Serializes and appends one record frame.
    pub fn append(&mut self, record: &ShardRecord) -> Result<()> {
        let encoded = bincode::serialize(record).map_err(|e| {
            FoldshardError::serialization(format!("failed to serialize record '{}': {e}", record.key))
        })?;
        let payload = self.compression.compress(&encoded, self.compression_level)?;
        let frame = encode_frame(&payload)?;

        self.writer
            .write_all(&frame)
            .map_err(|e| FoldshardError::storage_with_source(&self.write_path, "failed to append record", e))?;
        self.records += 1;
        Ok(())
    }

    /// Records appended so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flushes, syncs and moves the shard into place.
    pub fn seal(self) -> Result<SealedShard> {
        self.writer.finish()?;

        if self.write_path != self.final_path {
            self.storage.rename(&self.write_path, &self.final_path)?;
        }

        debug!(
            path = %self.final_path.display(),
            records = self.records,
            "Sealed shard"
        );

        Ok(SealedShard {
            path: self.final_path,
            records: self.records,
        })
    }
}
