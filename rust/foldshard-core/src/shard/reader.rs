// rust/foldshard-core/src/shard/reader.rs

//! Sequential shard reader with per-frame checksum verification.

use std::path::{Path, PathBuf};

use super::format::{checksum, decode_frame_header, ShardHeader, ShardRecord, FRAME_HEADER_LEN};
use crate::error::{FoldshardError, Result};
use crate::storage::{StorageBackend, StorageReader};

/// Reads a shard file frame by frame.
///
/// Every frame's checksum is verified before its payload is returned. A
/// checksum mismatch or a frame cut short by end-of-file is reported as
/// [`FoldshardError::CorruptShard`].
pub struct ShardReader {
    reader: Box<dyn StorageReader>,
    path: PathBuf,
    header: ShardHeader,
    position: u64,
    size: u64,
}

impl ShardReader {
    /// Opens a shard and validates its header.
    pub fn open(storage: &dyn StorageBackend, path: &Path) -> Result<Self> {
        let mut reader = storage.open_read(path)?;
        let size = reader.size();

        if size < 4 {
            return Err(FoldshardError::corrupt_shard(path, "file too small for a header"));
        }
        let len_bytes = reader.read_range(0, 4)?;
        let header_len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as u64;

        if 4 + header_len > size {
            return Err(FoldshardError::corrupt_shard(path, "truncated header"));
        }
        let header_bytes = reader.read_range(4, header_len as usize)?;
        let header: ShardHeader = bincode::deserialize(&header_bytes).map_err(|e| {
            FoldshardError::corrupt_shard(path, format!("failed to deserialize header: {e}"))
        })?;

        if !header.validate_magic() {
            return Err(FoldshardError::corrupt_shard(
                path,
                format!(
                    "invalid magic bytes: expected {:?}, got {:?}",
                    ShardHeader::MAGIC,
                    header.magic
                ),
            ));
        }
        if !header.validate_version() {
            return Err(FoldshardError::corrupt_shard(
                path,
                format!(
                    "unsupported version: expected {}, got {}",
                    ShardHeader::VERSION,
                    header.version
                ),
            ));
        }

        Ok(Self {
            reader,
            path: path.to_path_buf(),
            header,
            position: 4 + header_len,
            size,
        })
    }

    pub fn header(&self) -> &ShardHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the next verified (still compressed) payload.
    fn next_payload(&mut self) -> Result<Option<Vec<u8>>> {
        if self.position == self.size {
            return Ok(None);
        }

        let frame_start = self.position;
        if frame_start + FRAME_HEADER_LEN as u64 > self.size {
            return Err(FoldshardError::corrupt_shard(
                &self.path,
                format!("truncated frame header at byte {frame_start}"),
            ));
        }

        let mut frame_header = [0u8; FRAME_HEADER_LEN];
        frame_header.copy_from_slice(&self.reader.read_range(frame_start, FRAME_HEADER_LEN)?);
        let (length, expected) = decode_frame_header(&frame_header);

        let payload_start = frame_start + FRAME_HEADER_LEN as u64;
        if payload_start + length as u64 > self.size {
            return Err(FoldshardError::corrupt_shard(
                &self.path,
                format!(
                    "truncated frame at byte {frame_start}: payload of {length} bytes, {} available",
                    self.size - payload_start
                ),
            ));
        }

        let payload = self.reader.read_range(payload_start, length)?;
        let actual = checksum(&payload);
        if actual != expected {
            return Err(FoldshardError::corrupt_shard(
                &self.path,
                format!("checksum mismatch in frame at byte {frame_start}: expected {expected:016x}, got {actual:016x}"),
            ));
        }

        self.position = payload_start + length as u64;
        Ok(Some(payload))
    }

    /// Reads and decodes the next record.
    pub fn next_record(&mut self) -> Result<Option<ShardRecord>> {
        let Some(payload) = self.next_payload()? else {
            return Ok(None);
        };

        let decoded = self.header.compression.decompress(&payload).map_err(|e| {
            FoldshardError::corrupt_shard(&self.path, e.to_string())
        })?;
        let record = bincode::deserialize(&decoded).map_err(|e| {
            FoldshardError::corrupt_shard(&self.path, format!("failed to decode record: {e}"))
        })?;
        Ok(Some(record))
    }

    /// Counts the remaining frames, verifying checksums without decoding.
    pub fn count_records(&mut self) -> Result<u64> {
        let mut count = 0;
        while self.next_payload()?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}

impl Iterator for ShardReader {
    type Item = Result<ShardRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                // Stop after the first error.
                self.position = self.size;
                Some(Err(e))
            }
        }
    }
}
