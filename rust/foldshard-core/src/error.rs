// rust/foldshard-core/src/error.rs

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::split::SplitKind;

#[derive(Error, Debug)]
pub enum FoldshardError {

    #[error("Storage error at '{path}': {message}")]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Malformed index '{path}' line {line}: {message}")]
    MalformedIndex {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Duplicate record id '{key}': {first} vs {second}")]
    DuplicateId {
        key: String,
        first: String,
        second: String,
    },

    #[error(
        "Index/group mismatch: {} key(s) missing from index {:?}, {} index key(s) in no group {:?}",
        .missing_from_index.len(),
        preview(.missing_from_index),
        .missing_from_groups.len(),
        preview(.missing_from_groups)
    )]
    IndexMismatch {
        missing_from_index: Vec<String>,
        missing_from_groups: Vec<String>,
    },

    #[error("Need at least 3 groups to form train/validate/test splits, found {found}")]
    InsufficientGroups { found: usize },

    #[error("Malformed split assignment '{path}' line {line}: {message}")]
    MalformedAssignment {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Record '{key}' could not be decoded: {message}")]
    Decode { key: String, message: String },

    #[error("Record '{key}' {tensor} width {actual} does not match expected {expected}")]
    SchemaViolation {
        key: String,
        tensor: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{} worker(s) failed writing split '{split}': {}", .failures.len(), join_failures(.failures))]
    WorkerFailed {
        split: SplitKind,
        failures: Vec<WorkerFailure>,
    },

    #[error("Worker {worker_id} panicked while writing split '{split}'")]
    WorkerPanicked { split: SplitKind, worker_id: usize },

    #[error("Corrupt shard '{path}': {message}")]
    CorruptShard { path: PathBuf, message: String },

    #[error("Verification failed for split '{split}': expected {expected} records, found {actual}")]
    VerificationMismatch {
        split: SplitKind,
        expected: u64,
        actual: u64,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, FoldshardError>;

/// One worker's failure inside a shard writer pool run.
#[derive(Debug)]
pub struct WorkerFailure {
    pub worker_id: usize,
    /// Records this worker sealed into shards before it stopped.
    pub records_written: u64,
    pub error: Box<FoldshardError>,
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "worker {} after {} record(s): {}",
            self.worker_id, self.records_written, self.error
        )
    }
}

fn join_failures(failures: &[WorkerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// Keeps messages readable when tens of thousands of keys mismatch.
fn preview(keys: &[String]) -> &[String] {
    &keys[..keys.len().min(8)]
}

// Convenience constructors
impl FoldshardError {

    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn malformed_index(
        path: impl Into<PathBuf>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedIndex {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub fn duplicate_id(
        key: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self::DuplicateId {
            key: key.into(),
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn malformed_assignment(
        path: impl Into<PathBuf>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedAssignment {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub fn decode(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn corrupt_shard(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptShard {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message_reports_counts() {
        let err = FoldshardError::VerificationMismatch {
            split: SplitKind::Validate,
            expected: 120,
            actual: 119,
        };
        let msg = err.to_string();
        assert!(msg.contains("validate"));
        assert!(msg.contains("120"));
        assert!(msg.contains("119"));
    }

    #[test]
    fn test_index_mismatch_truncates_key_list() {
        let keys: Vec<String> = (0..20).map(|i| format!("k{i}")).collect();
        let err = FoldshardError::IndexMismatch {
            missing_from_index: keys,
            missing_from_groups: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("20 key(s) missing from index"));
        assert!(msg.contains("k7"));
        assert!(!msg.contains("k8"));
    }

    #[test]
    fn test_worker_failed_lists_each_worker() {
        let err = FoldshardError::WorkerFailed {
            split: SplitKind::Train,
            failures: vec![
                WorkerFailure {
                    worker_id: 1,
                    records_written: 10,
                    error: Box::new(FoldshardError::decode("1abc_A", "bad residue 'q'")),
                },
                WorkerFailure {
                    worker_id: 3,
                    records_written: 0,
                    error: Box::new(FoldshardError::SchemaViolation {
                        key: "2xyz_B".into(),
                        tensor: "feature",
                        expected: 110,
                        actual: 100,
                    }),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 worker(s) failed"));
        assert!(msg.contains("worker 1 after 10 record(s)"));
        assert!(msg.contains("2xyz_B"));
    }
}
