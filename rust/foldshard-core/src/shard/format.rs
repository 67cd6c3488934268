// rust/foldshard-core/src/shard/format.rs

//! Shard file format.
//!
//! ```text
//! +----------------------------+
//! | Header Length (4 bytes)    |  <- u32 little-endian
//! +----------------------------+
//! | Header (bincode)           |  <- ShardHeader
//! +----------------------------+
//! | Frame 0                    |
//! | Frame 1 ...                |
//! +----------------------------+
//!
//! Frame:
//! +----------------------------+
//! | Payload Length (4 bytes)   |  <- u32 big-endian
//! +----------------------------+
//! | Checksum (8 bytes)         |  <- XXHash64 of the stored payload, little-endian
//! +----------------------------+
//! | Payload                    |  <- bincode ShardRecord, compressed per header
//! +----------------------------+
//! ```
//!
//! The checksum covers the bytes as stored, so frames can be counted and
//! verified without decompressing or decoding them.

use std::hash::Hasher;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::encoding::EncodedRecord;
use crate::error::{FoldshardError, Result};
use crate::split::SplitKind;

/// Length of the fixed part of a frame (length + checksum).
pub const FRAME_HEADER_LEN: usize = 12;

/// Payload compression applied per record frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Lz4,
    Zstd,
}

impl Compression {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "none" => Ok(Compression::None),
            "lz4" => Ok(Compression::Lz4),
            "zstd" => Ok(Compression::Zstd),
            _ => Err(FoldshardError::config(format!(
                "unknown compression algorithm: '{name}'. Expected 'none', 'lz4', or 'zstd'"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Lz4 => "lz4",
            Compression::Zstd => "zstd",
        }
    }

    pub fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            Compression::Zstd => zstd::encode_all(data, level)
                .map_err(|e| FoldshardError::serialization(format!("zstd compression failed: {e}"))),
        }
    }

    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Lz4 => lz4_flex::decompress_size_prepended(data).map_err(|e| {
                FoldshardError::serialization(format!("lz4 decompression failed: {e}"))
            }),
            Compression::Zstd => zstd::decode_all(data).map_err(|e| {
                FoldshardError::serialization(format!("zstd decompression failed: {e}"))
            }),
        }
    }
}

impl FromStr for Compression {
    type Err = FoldshardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// Header at the start of every shard file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardHeader {
    /// Magic bytes identifying a shard file ("FSHD")
    pub magic: [u8; 4],
    pub version: u32,
    pub split: SplitKind,
    pub worker_id: u32,
    pub shard_index: u32,
    pub compression: Compression,
    pub feature_channels: u32,
    pub label_channels: u32,
}

impl ShardHeader {
    pub const MAGIC: [u8; 4] = *b"FSHD";

    pub const VERSION: u32 = 1;

    pub fn new(
        split: SplitKind,
        worker_id: u32,
        shard_index: u32,
        compression: Compression,
        feature_channels: u32,
        label_channels: u32,
    ) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            split,
            worker_id,
            shard_index,
            compression,
            feature_channels,
            label_channels,
        }
    }

    pub fn validate_magic(&self) -> bool {
        self.magic == Self::MAGIC
    }

    pub fn validate_version(&self) -> bool {
        self.version == Self::VERSION
    }

    /// Serializes the header with its little-endian length prefix.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header_bytes = bincode::serialize(self)
            .map_err(|e| FoldshardError::serialization(format!("failed to serialize shard header: {e}")))?;

        let mut out = Vec::with_capacity(4 + header_bytes.len());
        out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&header_bytes);
        Ok(out)
    }
}

/// One serialized record: `{identifier, feature-vector, label-vector}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardRecord {
    pub key: String,
    pub positions: u32,
    pub features: Vec<f32>,
    pub labels: Vec<f32>,
}

impl ShardRecord {
    /// Checks tensor widths against `positions * channels`.
    pub fn check_schema(&self, feature_channels: usize, label_channels: usize) -> Result<()> {
        let positions = self.positions as usize;
        for (tensor, actual, channels) in [
            ("feature", self.features.len(), feature_channels),
            ("label", self.labels.len(), label_channels),
        ] {
            let expected = positions * channels;
            if actual != expected {
                return Err(FoldshardError::SchemaViolation {
                    key: self.key.clone(),
                    tensor,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

impl From<EncodedRecord> for ShardRecord {
    fn from(record: EncodedRecord) -> Self {
        Self {
            key: record.key,
            positions: record.positions as u32,
            features: record.features,
            labels: record.labels,
        }
    }
}

/// Builds a frame around an already-compressed payload.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let length = u32::try_from(payload.len()).map_err(|_| {
        FoldshardError::serialization(format!("record payload of {} bytes exceeds frame limit", payload.len()))
    })?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(&checksum(payload).to_le_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Splits a fixed frame header into `(payload length, checksum)`.
pub fn decode_frame_header(bytes: &[u8; FRAME_HEADER_LEN]) -> (usize, u64) {
    let mut length = [0u8; 4];
    let mut sum = [0u8; 8];
    length.copy_from_slice(&bytes[..4]);
    sum.copy_from_slice(&bytes[4..]);
    (u32::from_be_bytes(length) as usize, u64::from_le_bytes(sum))
}

/// XXHash64 with seed 0.
pub fn checksum(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}

/// `part<worker>_<shard>.shard`
pub fn shard_file_name(worker_id: usize, shard_index: usize) -> String {
    format!("part{worker_id}_{shard_index}.shard")
}
