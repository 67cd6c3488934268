// rust/foldshard-core/src/verify.rs

//! Post-write verification of a dataset directory.

use std::fmt;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{FoldshardError, Result};
use crate::manifest::Manifest;
use crate::shard::{ShardReader, SHARD_EXTENSION};
use crate::split::SplitKind;
use crate::storage::StorageBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitVerification {
    pub split: SplitKind,
    pub expected: u64,
    pub actual: u64,
    pub shards: usize,
    /// Bytes on disk across the split's sealed shards.
    pub bytes: u64,
}

/// Outcome of a successful [`verify_dataset`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub splits: Vec<SplitVerification>,
    /// Non-fatal findings, such as empty shards.
    pub warnings: Vec<String>,
}

impl VerificationReport {
    pub fn total_records(&self) -> u64 {
        self.splits.iter().map(|s| s.actual).sum()
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} records verified", self.total_records())?;
        for split in &self.splits {
            writeln!(
                f,
                "  {:<8} {:>10} records in {} shard(s), {} bytes",
                split.split.name(),
                split.actual,
                split.shards,
                split.bytes
            )?;
        }
        for warning in &self.warnings {
            writeln!(f, "  warning: {warning}")?;
        }
        Ok(())
    }
}

/// Re-reads every shard under `output_dir` and checks the per-split record
/// counts against the manifest.
///
/// Every frame checksum is verified along the way. Dot-prefixed files
/// (unsealed shards, pending manifests) are ignored.
///
/// # Errors
///
/// [`FoldshardError::VerificationMismatch`] for the first split whose count
/// disagrees, [`FoldshardError::CorruptShard`] for an unreadable shard.
pub fn verify_dataset(storage: &dyn StorageBackend, output_dir: &Path) -> Result<VerificationReport> {
    let manifest = Manifest::read(storage, output_dir)?;
    let mut report = VerificationReport::default();

    for kind in SplitKind::ALL {
        let entry = manifest.splits.get(kind);
        let dir = output_dir.join(&entry.directory);

        let mut actual = 0u64;
        let mut shards = 0usize;
        let mut bytes = 0u64;
        for name in storage.list(&dir)? {
            if name.starts_with('.') || !name.ends_with(&format!(".{SHARD_EXTENSION}")) {
                continue;
            }
            let path = dir.join(&name);
            let mut reader = ShardReader::open(storage, &path)?;

            let header = reader.header();
            if header.split != kind {
                return Err(FoldshardError::corrupt_shard(
                    &path,
                    format!("header names split '{}', found under '{kind}'", header.split),
                ));
            }
            if header.feature_channels as usize != manifest.feature_channels
                || header.label_channels as usize != manifest.label_channels
            {
                return Err(FoldshardError::corrupt_shard(
                    &path,
                    format!(
                        "header channels {}/{} do not match manifest {}/{}",
                        header.feature_channels,
                        header.label_channels,
                        manifest.feature_channels,
                        manifest.label_channels
                    ),
                ));
            }

            let count = reader.count_records()?;
            if count == 0 {
                warn!(path = %path.display(), "Shard holds no records");
                report.warnings.push(format!("{} holds no records", path.display()));
            }
            actual += count;
            shards += 1;
            bytes += storage.metadata(&path)?.size;
        }

        if shards != entry.shards {
            warn!(
                split = %kind,
                expected = entry.shards,
                found = shards,
                "Shard count differs from manifest"
            );
            report.warnings.push(format!(
                "split '{kind}': manifest lists {} shard(s), found {shards}",
                entry.shards
            ));
        }

        if actual != entry.expected_records {
            return Err(FoldshardError::VerificationMismatch {
                split: kind,
                expected: entry.expected_records,
                actual,
            });
        }

        info!(split = %kind, records = actual, shards, bytes, "Verified split");
        report.splits.push(SplitVerification {
            split: kind,
            expected: entry.expected_records,
            actual,
            shards,
            bytes,
        });
    }

    Ok(report)
}
