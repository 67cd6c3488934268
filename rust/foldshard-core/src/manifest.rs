// rust/foldshard-core/src/manifest.rs

//! Dataset manifest (`manifest.toml`).
//!
//! Written once after all three splits are on disk. The per-split record
//! counts are the counts the splitter assigned, not counts read back from
//! shards; verification compares the two.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::encoding::RecordEncoder;
use crate::error::{FoldshardError, Result};
use crate::shard::{Compression, SplitWriteSummary};
use crate::split::{SplitKind, SplitRatios};
use crate::storage::{read_text, write_atomic, StorageBackend};

/// File name of the manifest inside the output directory.
pub const MANIFEST_FILE: &str = "manifest.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub created_at_ms: i64,
    pub total_records: u64,
    pub seed: u64,
    pub feature_channels: usize,
    pub label_channels: usize,
    pub feature_encoding: String,
    pub label_encoding: String,
    pub compression: Compression,
    pub splits: ManifestSplits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSplits {
    pub train: SplitEntry,
    pub validate: SplitEntry,
    pub test: SplitEntry,
}

impl ManifestSplits {
    pub fn get(&self, kind: SplitKind) -> &SplitEntry {
        match kind {
            SplitKind::Train => &self.train,
            SplitKind::Validate => &self.validate,
            SplitKind::Test => &self.test,
        }
    }

    fn get_mut(&mut self, kind: SplitKind) -> &mut SplitEntry {
        match kind {
            SplitKind::Train => &mut self.train,
            SplitKind::Validate => &mut self.validate,
            SplitKind::Test => &mut self.test,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitEntry {
    /// Directory name relative to the output directory.
    pub directory: String,
    pub expected_records: u64,
    pub shards: usize,
    /// Target group ratio.
    pub ratio: f64,
}

impl Manifest {
    pub const FORMAT_VERSION: u32 = 1;

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// Writes `dir/manifest.toml` atomically.
    pub fn write(&self, storage: &dyn StorageBackend, dir: &Path) -> Result<PathBuf> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FoldshardError::serialization(format!("failed to serialize manifest: {e}")))?;

        storage.create_dir_all(dir)?;
        let path = Self::path(dir);
        write_atomic(storage, &path, content.as_bytes())?;

        info!(
            path = %path.display(),
            total_records = self.total_records,
            "Wrote manifest"
        );
        Ok(path)
    }

    /// Reads `dir/manifest.toml`.
    pub fn read(storage: &dyn StorageBackend, dir: &Path) -> Result<Self> {
        let path = Self::path(dir);
        let content = read_text(storage, &path)?;
        let manifest: Self = toml::from_str(&content)
            .map_err(|e| FoldshardError::config_with_source(format!("failed to parse manifest '{}'", path.display()), e))?;

        if manifest.format_version != Self::FORMAT_VERSION {
            return Err(FoldshardError::config(format!(
                "unsupported manifest version {} in '{}'",
                manifest.format_version,
                path.display()
            )));
        }
        Ok(manifest)
    }
}

/// Accumulates split results into a [`Manifest`].
pub struct ManifestBuilder {
    seed: u64,
    feature_channels: usize,
    label_channels: usize,
    feature_encoding: String,
    label_encoding: String,
    compression: Compression,
    splits: ManifestSplits,
}

impl ManifestBuilder {
    pub fn new(
        seed: u64,
        ratios: &SplitRatios,
        encoder: &dyn RecordEncoder,
        compression: Compression,
    ) -> Self {
        let entry = |kind: SplitKind| SplitEntry {
            directory: kind.name().to_string(),
            expected_records: 0,
            shards: 0,
            ratio: ratios.get(kind),
        };
        Self {
            seed,
            feature_channels: encoder.feature_channels(),
            label_channels: encoder.label_channels(),
            feature_encoding: encoder.feature_encoding().to_string(),
            label_encoding: encoder.label_encoding().to_string(),
            compression,
            splits: ManifestSplits {
                train: entry(SplitKind::Train),
                validate: entry(SplitKind::Validate),
                test: entry(SplitKind::Test),
            },
        }
    }

    /// Records one written split. `expected_records` is the splitter's count.
    pub fn add_split(&mut self, expected_records: usize, summary: &SplitWriteSummary) {
        let entry = self.splits.get_mut(summary.split);
        if let Some(name) = summary.directory.file_name() {
            entry.directory = name.to_string_lossy().into_owned();
        }
        entry.expected_records = expected_records as u64;
        entry.shards = summary.shard_count();
    }

    pub fn build(self) -> Manifest {
        let total_records = SplitKind::ALL
            .iter()
            .map(|&kind| self.splits.get(kind).expected_records)
            .sum();

        Manifest {
            format_version: Manifest::FORMAT_VERSION,
            created_at_ms: chrono::Utc::now().timestamp_millis(),
            total_records,
            seed: self.seed,
            feature_channels: self.feature_channels,
            label_channels: self.label_channels,
            feature_encoding: self.feature_encoding,
            label_encoding: self.label_encoding,
            compression: self.compression,
            splits: self.splits,
        }
    }
}
