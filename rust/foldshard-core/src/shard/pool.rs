// rust/foldshard-core/src/shard/pool.rs

//! Parallel shard writing for one split.
//!
//! The split's id sequence is cut into `worker_count` contiguous slices and
//! each slice is handed to its own scoped thread. Workers share only
//! read-only state (the index, the id slice, the encoder) and write into
//! disjoint `part<worker>_<shard>.shard` namespaces, so there is no locking
//! on the write path.

use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use super::format::{ShardHeader, ShardRecord};
use super::writer::{SealedShard, ShardOptions, ShardWriter};
use super::SHARD_EXTENSION;
use crate::encoding::RecordEncoder;
use crate::error::{FoldshardError, Result, WorkerFailure};
use crate::index::{RecordId, RecordIndex};
use crate::source::{read_raw_record, RecordFormat};
use crate::split::SplitKind;
use crate::storage::{StorageBackend, StorageReader};

/// Immutable state every worker reads from.
#[derive(Clone)]
pub struct WorkerContext {
    pub storage: Arc<dyn StorageBackend>,
    pub index: Arc<RecordIndex>,
    /// Backing data files, indexed by `RecordLocation::file`.
    pub data_files: Vec<PathBuf>,
    pub format: Arc<dyn RecordFormat>,
    pub encoder: Arc<dyn RecordEncoder>,
    pub options: ShardOptions,
}

/// What one worker produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub worker_id: usize,
    pub records: u64,
    pub shards: Vec<SealedShard>,
}

/// What a whole split produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitWriteSummary {
    pub split: SplitKind,
    pub directory: PathBuf,
    pub records: u64,
    pub workers: Vec<WorkerSummary>,
}

impl SplitWriteSummary {
    pub fn shard_count(&self) -> usize {
        self.workers.iter().map(|w| w.shards.len()).sum()
    }
}

/// Contiguous slices of `len` ids over `worker_count` workers.
///
/// Every slice holds `len / worker_count` ids; the last one also takes the
/// remainder.
pub fn slice_bounds(len: usize, worker_count: usize) -> Vec<Range<usize>> {
    let workers = worker_count.max(1);
    let base = len / workers;
    (0..workers)
        .map(|w| {
            let start = w * base;
            let end = if w + 1 == workers { len } else { start + base };
            start..end
        })
        .collect()
}

/// Supervisor that fans a split out over scoped worker threads.
pub struct ShardWriterPool {
    context: WorkerContext,
}

impl ShardWriterPool {
    pub fn new(context: WorkerContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &WorkerContext {
        &self.context
    }

    /// Writes `ids` as shards under `output_dir/<split>`.
    ///
    /// All workers run to completion. If any of them failed, the result is
    /// [`FoldshardError::WorkerFailed`] listing each failure; their unsealed
    /// temporary files are left in place.
    pub fn write_split(
        &self,
        split: SplitKind,
        ids: &[RecordId],
        worker_count: usize,
        shard_record_limit: usize,
        output_dir: &Path,
    ) -> Result<SplitWriteSummary> {
        if worker_count == 0 {
            return Err(FoldshardError::config("worker_count must be greater than 0"));
        }
        if shard_record_limit == 0 {
            return Err(FoldshardError::config("shard_record_limit must be greater than 0"));
        }

        let directory = output_dir.join(split.name());
        self.context.storage.create_dir_all(&directory)?;
        clear_shards(self.context.storage.as_ref(), &directory)?;

        let slices = slice_bounds(ids.len(), worker_count);
        info!(
            split = %split,
            records = ids.len(),
            workers = slices.len(),
            shard_record_limit,
            "Writing split"
        );

        let outcomes: Vec<std::result::Result<WorkerSummary, WorkerFailure>> =
            crossbeam::thread::scope(|scope| {
                let mut handles = Vec::with_capacity(slices.len());
                for (worker_id, range) in slices.iter().enumerate() {
                    let slice = &ids[range.clone()];
                    let context = &self.context;
                    let directory = directory.as_path();
                    handles.push((
                        worker_id,
                        scope.spawn(move |_| {
                            run_worker(context, split, worker_id, slice, shard_record_limit, directory)
                        }),
                    ));
                }

                handles
                    .into_iter()
                    .map(|(worker_id, handle)| match handle.join() {
                        Ok(outcome) => outcome,
                        Err(_) => Err(WorkerFailure {
                            worker_id,
                            records_written: 0,
                            error: Box::new(FoldshardError::WorkerPanicked { split, worker_id }),
                        }),
                    })
                    .collect()
            })
            // Every handle is joined inside the scope.
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));

        let mut workers = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(summary) => workers.push(summary),
                Err(failure) => {
                    error!(
                        split = %split,
                        worker_id = failure.worker_id,
                        records_written = failure.records_written,
                        error = %failure.error,
                        "Worker failed"
                    );
                    failures.push(failure);
                }
            }
        }

        if !failures.is_empty() {
            return Err(FoldshardError::WorkerFailed { split, failures });
        }

        let summary = SplitWriteSummary {
            split,
            directory,
            records: workers.iter().map(|w| w.records).sum(),
            workers,
        };
        info!(
            split = %split,
            records = summary.records,
            shards = summary.shard_count(),
            "Split written"
        );
        Ok(summary)
    }
}

/// Removes sealed and unsealed shard files left in `dir` by an earlier run.
///
/// Other files and subdirectories are left alone.
fn clear_shards(storage: &dyn StorageBackend, dir: &Path) -> Result<usize> {
    let sealed_suffix = format!(".{SHARD_EXTENSION}");
    let unsealed_suffix = format!(".{SHARD_EXTENSION}.tmp");

    let mut removed = 0;
    for name in storage.list(dir)? {
        if !(name.ends_with(&sealed_suffix) || name.ends_with(&unsealed_suffix)) {
            continue;
        }
        let path = dir.join(&name);
        if storage.metadata(&path)?.is_dir {
            continue;
        }
        storage.delete(&path)?;
        removed += 1;
    }

    if removed > 0 {
        info!(dir = %dir.display(), removed, "Removed shards from a previous run");
    }
    Ok(removed)
}

/// Writes one worker's slice into `part<worker_id>_*.shard` files in `dir`.
///
/// Shards are opened lazily and sealed at `shard_record_limit` records and
/// at the end of the slice, so an empty slice writes nothing.
pub fn run_worker(
    context: &WorkerContext,
    split: SplitKind,
    worker_id: usize,
    ids: &[RecordId],
    shard_record_limit: usize,
    dir: &Path,
) -> std::result::Result<WorkerSummary, WorkerFailure> {
    let mut state = WorkerState {
        context,
        split,
        worker_id,
        dir,
        readers: HashMap::new(),
        current: None,
        sealed: Vec::new(),
    };

    for &id in ids {
        if let Err(error) = state.write_one(id, shard_record_limit) {
            // The unsealed shard keeps its temp file on drop.
            return Err(WorkerFailure {
                worker_id,
                records_written: state.sealed_records(),
                error: Box::new(error),
            });
        }
    }

    if let Err(error) = state.seal_current() {
        return Err(WorkerFailure {
            worker_id,
            records_written: state.sealed_records(),
            error: Box::new(error),
        });
    }

    let records = state.sealed_records();
    debug!(
        split = %split,
        worker_id,
        records,
        shards = state.sealed.len(),
        "Worker finished"
    );
    Ok(WorkerSummary {
        worker_id,
        records,
        shards: state.sealed,
    })
}

struct WorkerState<'a> {
    context: &'a WorkerContext,
    split: SplitKind,
    worker_id: usize,
    dir: &'a Path,
    readers: HashMap<usize, Box<dyn StorageReader>>,
    current: Option<ShardWriter>,
    sealed: Vec<SealedShard>,
}

impl WorkerState<'_> {
    fn sealed_records(&self) -> u64 {
        self.sealed.iter().map(|s| s.records).sum()
    }

    fn write_one(&mut self, id: RecordId, shard_record_limit: usize) -> Result<()> {
        let record = self.encode(id)?;

        let mut writer = match self.current.take() {
            Some(writer) => writer,
            None => self.open_shard()?,
        };
        writer.append(&record)?;

        if writer.records() >= shard_record_limit as u64 {
            self.sealed.push(writer.seal()?);
        } else {
            self.current = Some(writer);
        }
        Ok(())
    }

    fn encode(&mut self, id: RecordId) -> Result<ShardRecord> {
        let context = self.context;
        let (key, location) = match (context.index.key(id), context.index.location(id)) {
            (Some(key), Some(location)) => (key, location),
            _ => {
                return Err(FoldshardError::IndexMismatch {
                    missing_from_index: vec![id.to_string()],
                    missing_from_groups: Vec::new(),
                })
            }
        };

        let reader = match self.readers.entry(location.file) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let path = context.data_files.get(location.file).ok_or_else(|| {
                    FoldshardError::decode(
                        key,
                        format!(
                            "data file {} is not configured ({} data file(s))",
                            location.file,
                            context.data_files.len()
                        ),
                    )
                })?;
                entry.insert(context.storage.open_read(path)?)
            }
        };

        let raw = read_raw_record(reader.as_mut(), key, location, context.format.as_ref())?;
        let record = ShardRecord::from(context.encoder.encode(&raw)?);
        record.check_schema(
            context.encoder.feature_channels(),
            context.encoder.label_channels(),
        )?;
        Ok(record)
    }

    fn open_shard(&self) -> Result<ShardWriter> {
        let encoder = &self.context.encoder;
        let header = ShardHeader::new(
            self.split,
            self.worker_id as u32,
            self.sealed.len() as u32,
            self.context.options.compression,
            encoder.feature_channels() as u32,
            encoder.label_channels() as u32,
        );
        ShardWriter::create(
            self.context.storage.clone(),
            self.dir,
            &header,
            &self.context.options,
        )
    }

    fn seal_current(&mut self) -> Result<()> {
        if let Some(writer) = self.current.take() {
            self.sealed.push(writer.seal()?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::encoding::{EncodedRecord, ResidueTable, TableEncoder};
    use crate::index::RecordLocation;
    use crate::shard::ShardReader;
    use crate::source::{NewlineDelimitedFormat, RawRecord};
    use crate::storage::LocalStorage;
    use std::io::Write;
    use tempfile::TempDir;

    const SEQUENCES: [&str; 4] = ["ACDEFG", "KLM", "WYVPQ", "RNDC"];

    // Writes `count` newline rows and an index over them.
    fn context(count: usize) -> (WorkerContext, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage: Arc<dyn StorageBackend> = Arc::new(
            LocalStorage::new(&StorageConfig {
                base_path: temp.path().to_path_buf(),
                ..Default::default()
            })
            .unwrap(),
        );

        let mut data = Vec::new();
        let mut entries = Vec::new();
        for i in 0..count {
            entries.push((
                format!("{i}"),
                RecordLocation {
                    file: 0,
                    offset: data.len() as u64,
                    length: None,
                },
            ));
            data.extend_from_slice(format!("{i}\t{}\n", SEQUENCES[i % SEQUENCES.len()]).as_bytes());
        }
        let mut writer = storage.open_write(Path::new("rows.tsv")).unwrap();
        writer.write_all(&data).unwrap();
        writer.finish().unwrap();

        let context = WorkerContext {
            storage,
            index: Arc::new(RecordIndex::from_entries(entries).unwrap()),
            data_files: vec![PathBuf::from("rows.tsv")],
            format: Arc::new(NewlineDelimitedFormat::new()),
            encoder: Arc::new(TableEncoder::new(ResidueTable::AandxReduced, ResidueTable::OneHot)),
            options: ShardOptions::default(),
        };
        (context, temp)
    }

    fn read_keys(context: &WorkerContext, path: &Path) -> Vec<String> {
        ShardReader::open(context.storage.as_ref(), path)
            .unwrap()
            .map(|r| r.unwrap().key)
            .collect()
    }

    // Widens every feature vector by one value.
    struct OverwideEncoder {
        inner: TableEncoder,
        bad_key: &'static str,
    }

    impl RecordEncoder for OverwideEncoder {
        fn feature_channels(&self) -> usize {
            self.inner.feature_channels()
        }

        fn label_channels(&self) -> usize {
            self.inner.label_channels()
        }

        fn encode(&self, record: &RawRecord) -> Result<EncodedRecord> {
            let mut encoded = self.inner.encode(record)?;
            if record.key == self.bad_key {
                encoded.features.push(0.0);
            }
            Ok(encoded)
        }
    }

    #[test]
    fn test_slice_bounds() {
        assert_eq!(slice_bounds(10, 3), vec![0..3, 3..6, 6..10]);
        assert_eq!(slice_bounds(2, 4), vec![0..0, 0..0, 0..0, 0..2]);
        assert_eq!(slice_bounds(0, 2), vec![0..0, 0..0]);
        assert_eq!(slice_bounds(5, 1), vec![0..5]);
    }

    #[test]
    fn test_shard_count_per_worker() {
        let (context, _temp) = context(23);
        let pool = ShardWriterPool::new(context);
        let ids: Vec<RecordId> = (0..23).rev().collect();

        let summary = pool
            .write_split(SplitKind::Train, &ids, 3, 4, Path::new("out"))
            .unwrap();

        assert_eq!(summary.records, 23);
        assert_eq!(summary.directory, PathBuf::from("out/train"));
        // Slices of 7, 7 and 9 ids with limit 4.
        let shards: Vec<usize> = summary.workers.iter().map(|w| w.shards.len()).collect();
        assert_eq!(shards, vec![2, 2, 3]);
        assert_eq!(summary.shard_count(), 7);

        let last = &summary.workers[2].shards;
        assert_eq!(last[0].records, 4);
        assert_eq!(last[2].records, 1);
        assert_eq!(last[2].path, PathBuf::from("out/train/part2_2.shard"));
    }

    #[test]
    fn test_workers_keep_slice_order() {
        let (context, _temp) = context(6);
        let pool = ShardWriterPool::new(context);
        let ids: Vec<RecordId> = vec![5, 1, 3, 0, 4, 2];

        let summary = pool
            .write_split(SplitKind::Validate, &ids, 2, 10, Path::new("out"))
            .unwrap();

        let first = read_keys(pool.context(), &summary.workers[0].shards[0].path);
        let second = read_keys(pool.context(), &summary.workers[1].shards[0].path);
        assert_eq!(first, vec!["5", "1", "3"]);
        assert_eq!(second, vec!["0", "4", "2"]);
    }

    #[test]
    fn test_records_are_encoded() {
        let (context, _temp) = context(1);
        let pool = ShardWriterPool::new(context);

        let summary = pool
            .write_split(SplitKind::Test, &[0], 1, 10, Path::new("out"))
            .unwrap();
        let record = ShardReader::open(pool.context().storage.as_ref(), &summary.workers[0].shards[0].path)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        assert_eq!(record.positions, 6);
        assert_eq!(record.features.len(), 6 * 11);
        assert_eq!(record.labels.len(), 6 * 20);
        // 'A' is the first one-hot channel.
        assert_eq!(record.labels[0], 1.0);
    }

    #[test]
    fn test_empty_slice_writes_nothing() {
        let (context, _temp) = context(2);
        let pool = ShardWriterPool::new(context);

        let summary = pool
            .write_split(SplitKind::Test, &[0, 1], 4, 10, Path::new("out"))
            .unwrap();

        assert!(summary.workers[..3].iter().all(|w| w.shards.is_empty()));
        assert_eq!(
            pool.context().storage.list(Path::new("out/test")).unwrap(),
            vec!["part3_0.shard"]
        );
    }

    #[test]
    fn test_rewrite_replaces_previous_shards() {
        let (context, _temp) = context(8);
        let storage = context.storage.clone();
        let pool = ShardWriterPool::new(context);
        let ids: Vec<RecordId> = (0..8).collect();
        let dir = Path::new("out/train");

        pool.write_split(SplitKind::Train, &ids, 4, 1, Path::new("out"))
            .unwrap();
        assert_eq!(storage.list(dir).unwrap().len(), 8);

        let mut writer = storage.open_write(&dir.join(".part3_9.shard.tmp")).unwrap();
        writer.write_all(b"partial").unwrap();
        writer.finish().unwrap();
        let mut writer = storage.open_write(&dir.join("notes.txt")).unwrap();
        writer.write_all(b"keep").unwrap();
        writer.finish().unwrap();

        let summary = pool
            .write_split(SplitKind::Train, &ids, 1, 10, Path::new("out"))
            .unwrap();

        assert_eq!(summary.shard_count(), 1);
        assert_eq!(
            storage.list(dir).unwrap(),
            vec!["notes.txt", "part0_0.shard"]
        );
        assert_eq!(read_keys(pool.context(), &dir.join("part0_0.shard")).len(), 8);
    }

    #[test]
    fn test_schema_violation_fails_only_its_worker() {
        let (mut context, _temp) = context(8);
        context.encoder = Arc::new(OverwideEncoder {
            inner: TableEncoder::new(ResidueTable::AandxReduced, ResidueTable::OneHot),
            bad_key: "6",
        });
        let pool = ShardWriterPool::new(context);
        let ids: Vec<RecordId> = (0..8).collect();

        let err = pool
            .write_split(SplitKind::Train, &ids, 2, 2, Path::new("out"))
            .unwrap_err();

        match err {
            FoldshardError::WorkerFailed { split, failures } => {
                assert_eq!(split, SplitKind::Train);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].worker_id, 1);
                assert_eq!(failures[0].records_written, 2);
                assert!(matches!(
                    *failures[0].error,
                    FoldshardError::SchemaViolation { ref key, tensor: "feature", .. } if key == "6"
                ));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Worker 0 finished; worker 1 sealed one shard and left nothing partial,
        // since the bad record is the first of its second shard.
        let entries = pool.context().storage.list(Path::new("out/train")).unwrap();
        assert_eq!(entries, vec!["part0_0.shard", "part0_1.shard", "part1_0.shard"]);
    }

    #[test]
    fn test_failure_mid_shard_leaves_temp_file() {
        let (mut context, _temp) = context(4);
        context.encoder = Arc::new(OverwideEncoder {
            inner: TableEncoder::new(ResidueTable::AandxReduced, ResidueTable::OneHot),
            bad_key: "2",
        });
        let pool = ShardWriterPool::new(context);

        let err = pool
            .write_split(SplitKind::Train, &[0, 1, 2, 3], 1, 10, Path::new("out"))
            .unwrap_err();
        assert!(matches!(err, FoldshardError::WorkerFailed { .. }));

        let entries = pool.context().storage.list(Path::new("out/train")).unwrap();
        assert_eq!(entries, vec![".part0_0.shard.tmp"]);
    }

    #[test]
    fn test_unconfigured_data_file() {
        let (mut context, _temp) = context(2);
        context.data_files.clear();
        let pool = ShardWriterPool::new(context);

        let err = pool
            .write_split(SplitKind::Train, &[0, 1], 1, 10, Path::new("out"))
            .unwrap_err();
        assert!(err.to_string().contains("data file 0 is not configured"));
    }

    #[test]
    fn test_rejects_zero_workers_and_limit() {
        let (context, _temp) = context(1);
        let pool = ShardWriterPool::new(context);
        assert!(pool.write_split(SplitKind::Train, &[0], 0, 1, Path::new("o")).is_err());
        assert!(pool.write_split(SplitKind::Train, &[0], 1, 0, Path::new("o")).is_err());
    }
}
