// rust/foldshard-core/src/config.rs

//! Configuration management for dataset builds.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::encoding::ResidueTable;
use crate::error::{FoldshardError, Result};
use crate::shard::Compression;
use crate::split::SplitRatios;

// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub storage: StorageConfig,
    pub source: SourceConfig,
    pub split: SplitConfig,
    pub encoding: EncodingConfig,
    pub writer: WriterConfig,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Base path that relative input and output paths resolve against.
    pub base_path: PathBuf,
    // Buffer size in bytes for I/O operations.
    pub buffer_size: usize,
    // Whether to use memory-mapped I/O for backing data files.
    pub use_mmap: bool,
    // File size threshold (bytes) above which to use mmap.
    pub mmap_threshold: u64,
}

/// Locations of the upstream artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Index files; entry `k` describes `data_files[k]`.
    pub index_files: Vec<PathBuf>,
    /// Backing data files holding the raw per-record rows.
    pub data_files: Vec<PathBuf>,
    /// Cluster membership file, one group per line.
    pub cluster_file: PathBuf,
    /// Record framing in the backing files: "newline", "length-prefixed" or "fixed:N".
    pub record_format: String,
}

// Split parameters. Ratios are renormalized to sum to 1.0 before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub seed: u64,
    pub train: f64,
    pub validate: f64,
    pub test: f64,
    // Where `foldshard split` writes the assignment and `foldshard write` reads it.
    pub assignment_file: PathBuf,
}

/// Residue tables used to build feature and label tensors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub features: String,
    pub labels: String,
}

// Shard writer options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    // Worker threads per split. `None` means available parallelism.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_count: Option<usize>,
    // Maximum records per shard file.
    pub shard_record_limit: usize,
    // Record payload compression: "none", "lz4", or "zstd".
    pub compression: String,
    // Compression level (zstd only).
    pub compression_level: i32,
    // Whether to write shards to a temp file and rename on seal.
    pub atomic_writes: bool,
    // Root output directory; one subdirectory per split.
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: true,
            mmap_threshold: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            index_files: Vec::new(),
            data_files: Vec::new(),
            cluster_file: PathBuf::from("clusters.txt"),
            record_format: "newline".to_string(),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            train: 0.8,
            validate: 0.1,
            test: 0.1,
            assignment_file: PathBuf::from("split_assignment.txt"),
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            features: ResidueTable::AandxReduced.name().to_string(),
            labels: ResidueTable::OneHot.name().to_string(),
        }
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            shard_record_limit: 1000,
            compression: "none".to_string(),
            compression_level: 3,
            atomic_writes: true,
            output_dir: PathBuf::from("./shards"),
        }
    }
}

impl FromStr for PipelineConfig {
    type Err = FoldshardError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| FoldshardError::config_with_source("failed to parse TOML config", e))
    }
}

impl PipelineConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FoldshardError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `FOLDSHARD_` and use underscores
    // to separate nested fields. For example:
    // - `FOLDSHARD_SPLIT_SEED` overrides `split.seed`
    // - `FOLDSHARD_WRITER_WORKER_COUNT` overrides `writer.worker_count`
    // - `FOLDSHARD_WRITER_OUTPUT_DIR` overrides `writer.output_dir`
    // - `FOLDSHARD_ENCODING_FEATURES` overrides `encoding.features`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Storage overrides
        if let Ok(val) = std::env::var("FOLDSHARD_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("FOLDSHARD_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("FOLDSHARD_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }

        // Source overrides
        if let Ok(val) = std::env::var("FOLDSHARD_SOURCE_CLUSTER_FILE") {
            self.source.cluster_file = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("FOLDSHARD_SOURCE_RECORD_FORMAT") {
            self.source.record_format = val;
        }

        // Split overrides
        if let Ok(val) = std::env::var("FOLDSHARD_SPLIT_SEED") {
            if let Ok(v) = val.parse() {
                self.split.seed = v;
            }
        }
        if let Ok(val) = std::env::var("FOLDSHARD_SPLIT_TRAIN") {
            if let Ok(v) = val.parse() {
                self.split.train = v;
            }
        }
        if let Ok(val) = std::env::var("FOLDSHARD_SPLIT_VALIDATE") {
            if let Ok(v) = val.parse() {
                self.split.validate = v;
            }
        }
        if let Ok(val) = std::env::var("FOLDSHARD_SPLIT_TEST") {
            if let Ok(v) = val.parse() {
                self.split.test = v;
            }
        }

        // Encoding overrides
        if let Ok(val) = std::env::var("FOLDSHARD_ENCODING_FEATURES") {
            self.encoding.features = val;
        }
        if let Ok(val) = std::env::var("FOLDSHARD_ENCODING_LABELS") {
            self.encoding.labels = val;
        }

        // Writer overrides
        if let Ok(val) = std::env::var("FOLDSHARD_WRITER_WORKER_COUNT") {
            if let Ok(v) = val.parse() {
                self.writer.worker_count = Some(v);
            }
        }
        if let Ok(val) = std::env::var("FOLDSHARD_WRITER_SHARD_RECORD_LIMIT") {
            if let Ok(v) = val.parse() {
                self.writer.shard_record_limit = v;
            }
        }
        if let Ok(val) = std::env::var("FOLDSHARD_WRITER_COMPRESSION") {
            self.writer.compression = val;
        }
        if let Ok(val) = std::env::var("FOLDSHARD_WRITER_OUTPUT_DIR") {
            self.writer.output_dir = PathBuf::from(val);
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.buffer_size == 0 {
            return Err(FoldshardError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        if self.source.index_files.len() != self.source.data_files.len() {
            return Err(FoldshardError::config(format!(
                "source.index_files ({}) and source.data_files ({}) must pair up one-to-one",
                self.source.index_files.len(),
                self.source.data_files.len()
            )));
        }
        crate::source::parse_format(&self.source.record_format)?;

        self.split_ratios()?;

        ResidueTable::from_name(&self.encoding.features)?;
        ResidueTable::from_name(&self.encoding.labels)?;

        if self.writer.worker_count == Some(0) {
            return Err(FoldshardError::config(
                "writer.worker_count must be greater than 0",
            ));
        }
        if self.writer.shard_record_limit == 0 {
            return Err(FoldshardError::config(
                "writer.shard_record_limit must be greater than 0",
            ));
        }
        Compression::from_name(&self.writer.compression)?;

        Ok(())
    }

    /// Split ratios renormalized to sum to 1.0.
    pub fn split_ratios(&self) -> Result<SplitRatios> {
        SplitRatios::new(self.split.train, self.split.validate, self.split.test).normalized()
    }

    /// Worker count, falling back to the machine's available parallelism.
    pub fn worker_count(&self) -> usize {
        self.writer.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}
