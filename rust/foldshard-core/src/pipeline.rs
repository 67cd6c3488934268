// rust/foldshard-core/src/pipeline.rs

//! Dataset build orchestration.
//!
//! [`Pipeline`] ties the phases together: load the index, split the
//! clusters, write each split through the shard writer pool, write the
//! manifest and, optionally, verify the result.
//!
//! # Example
//!
//! ```no_run
//! use foldshard_core::Pipeline;
//!
//! let pipeline = Pipeline::from_config_file("foldshard.toml").unwrap();
//! let build = pipeline.run(true).unwrap();
//! println!("{}", build.report);
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::PipelineConfig;
use crate::encoding::{RecordEncoder, TableEncoder};
use crate::error::{FoldshardError, Result};
use crate::index::RecordIndex;
use crate::manifest::{Manifest, ManifestBuilder};
use crate::shard::{ShardOptions, ShardWriterPool, WorkerContext};
use crate::source::{parse_format, RecordFormat};
use crate::split::{
    load_groups, read_assignment, split, validate_coverage, write_assignment, SplitAssignment,
    SplitKind, SplitReport,
};
use crate::storage::{LocalStorage, StorageBackend};
use crate::verify::{verify_dataset, VerificationReport};

/// Result of the split phase.
#[derive(Debug)]
pub struct SplitOutcome {
    pub index: Arc<RecordIndex>,
    pub assignment: SplitAssignment,
    pub report: SplitReport,
}

/// Result of a full build.
#[derive(Debug)]
pub struct BuildOutcome {
    pub report: SplitReport,
    pub manifest: Manifest,
    pub verification: Option<VerificationReport>,
}

/// Drives a dataset build from a [`PipelineConfig`].
pub struct Pipeline {
    config: PipelineConfig,
    storage: Arc<dyn StorageBackend>,
    format: Arc<dyn RecordFormat>,
    encoder: Arc<dyn RecordEncoder>,
}

impl Pipeline {
    /// Creates a pipeline from a configuration file.
    ///
    /// Environment variable overrides are applied after loading the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or is invalid.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = PipelineConfig::from_file(path)?.with_env_overrides();
        Self::from_config(config)
    }

    /// Creates a pipeline from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the storage
    /// backend cannot be initialized.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage)?);
        let format = parse_format(&config.source.record_format)?;
        let encoder: Arc<dyn RecordEncoder> = Arc::new(TableEncoder::from_config(&config.encoding)?);

        Ok(Self {
            config,
            storage,
            format,
            encoder,
        })
    }

    /// Replaces the table encoder with a custom one.
    #[must_use]
    pub fn with_encoder(mut self, encoder: Arc<dyn RecordEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Loads the record index and checks it against the data files.
    pub fn load_index(&self) -> Result<RecordIndex> {
        let source = &self.config.source;
        let index = RecordIndex::load_files(self.storage.as_ref(), &source.index_files)?;

        if let Some(max_file) = index.max_file() {
            if max_file >= source.data_files.len() {
                return Err(FoldshardError::config(format!(
                    "index references data file {max_file}, but only {} data file(s) are configured",
                    source.data_files.len()
                )));
            }
        }
        for path in &source.data_files {
            if !self.storage.exists(path)? {
                return Err(FoldshardError::storage(path, "data file does not exist"));
            }
        }

        Ok(index)
    }

    /// Loads index and clusters, splits them and writes the assignment file.
    pub fn split(&self) -> Result<SplitOutcome> {
        let index = self.load_index()?;
        let groups = load_groups(self.storage.as_ref(), &self.config.source.cluster_file, &index)?;
        validate_coverage(&groups, &index)?;

        let ratios = self.config.split_ratios()?;
        let assignment = split(&groups, self.config.split.seed, &ratios)?;
        let report = assignment.report(&ratios);
        report.log();

        write_assignment(
            self.storage.as_ref(),
            &self.config.split.assignment_file,
            &assignment,
            &index,
        )?;

        Ok(SplitOutcome {
            index: Arc::new(index),
            assignment,
            report,
        })
    }

    /// Writes all three splits and the manifest.
    ///
    /// Stops at the first split with a failed worker; no manifest is
    /// written in that case.
    pub fn write(&self, index: Arc<RecordIndex>, assignment: &SplitAssignment) -> Result<Manifest> {
        let writer = &self.config.writer;
        let options = ShardOptions::from_config(writer)?;
        let ratios = self.config.split_ratios()?;
        let worker_count = self.config.worker_count();

        let pool = ShardWriterPool::new(WorkerContext {
            storage: self.storage.clone(),
            index,
            data_files: self.config.source.data_files.clone(),
            format: self.format.clone(),
            encoder: self.encoder.clone(),
            options: options.clone(),
        });

        let mut builder = ManifestBuilder::new(
            self.config.split.seed,
            &ratios,
            self.encoder.as_ref(),
            options.compression,
        );
        for kind in SplitKind::ALL {
            let ids = assignment.get(kind);
            let summary = pool.write_split(
                kind,
                ids,
                worker_count,
                writer.shard_record_limit,
                &writer.output_dir,
            )?;
            builder.add_split(ids.len(), &summary);
        }

        let manifest = builder.build();
        manifest.write(self.storage.as_ref(), &writer.output_dir)?;
        Ok(manifest)
    }

    /// Writes shards from a previously written assignment file.
    pub fn write_from_assignment(&self) -> Result<Manifest> {
        let index = self.load_index()?;
        let assignment = read_assignment(
            self.storage.as_ref(),
            &self.config.split.assignment_file,
            &index,
        )?;
        self.write(Arc::new(index), &assignment)
    }

    /// Re-reads the output directory and checks it against the manifest.
    pub fn verify(&self) -> Result<VerificationReport> {
        verify_dataset(self.storage.as_ref(), &self.config.writer.output_dir)
    }

    /// Split, write and optionally verify.
    pub fn run(&self, verify: bool) -> Result<BuildOutcome> {
        let SplitOutcome {
            index,
            assignment,
            report,
        } = self.split()?;

        let manifest = self.write(index, &assignment)?;
        let verification = if verify { Some(self.verify()?) } else { None };

        info!(
            records = manifest.total_records,
            output_dir = %self.config.writer.output_dir.display(),
            verified = verification.is_some(),
            "Dataset build complete"
        );

        Ok(BuildOutcome {
            report,
            manifest,
            verification,
        })
    }
}
