// rust/foldshard-core/src/storage/mod.rs

//! Storage abstraction for dataset builds.
//!
//! Every file the pipeline touches (index files, cluster files, backing data
//! files, shards, assignment files, the manifest) goes through a
//! [`StorageBackend`]. Relative paths resolve against the backend's base path.
//!
//! Readers are positioned: each worker opens its own handle per backing file
//! and seeks to record offsets, so concurrent readers never share a cursor.
//!
//! # Example
//!
//! ```no_run
//! use foldshard_core::config::StorageConfig;
//! use foldshard_core::storage::{LocalStorage, StorageBackend};
//! use std::io::{Read, Write};
//! use std::path::Path;
//!
//! let config = StorageConfig::default();
//! let storage = LocalStorage::new(&config).unwrap();
//!
//! let mut writer = storage.open_write(Path::new("example.txt")).unwrap();
//! writer.write_all(b"0 0 12\n").unwrap();
//! writer.finish().unwrap();
//!
//! let mut reader = storage.open_read(Path::new("example.txt")).unwrap();
//! let mut content = String::new();
//! reader.read_to_string(&mut content).unwrap();
//! ```

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{ObjectMeta, StorageBackend, StorageReader, StorageWriter};

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{FoldshardError, Result};

/// Reads a whole UTF-8 text file (index, cluster, assignment, manifest).
pub fn read_text(storage: &dyn StorageBackend, path: &Path) -> Result<String> {
    let mut reader = storage.open_read(path)?;
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|e| FoldshardError::storage_with_source(path, "failed to read text file", e))?;
    Ok(content)
}

/// Writes `content` to `path` through a dot-prefixed sibling temp file and
/// a rename, so readers never observe a partial file.
pub fn write_atomic(storage: &dyn StorageBackend, path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = temp_sibling(path);

    let mut writer = storage.open_write(&temp_path)?;
    writer
        .write_all(content)
        .map_err(|e| FoldshardError::storage_with_source(&temp_path, "failed to write", e))?;
    writer.finish()?;

    storage.rename(&temp_path, path)
}

/// `dir/name` -> `dir/.name.tmp`.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use tempfile::TempDir;

    #[test]
    fn test_temp_sibling() {
        assert_eq!(
            temp_sibling(Path::new("shards/train/part0_0.shard")),
            PathBuf::from("shards/train/.part0_0.shard.tmp")
        );
        assert_eq!(temp_sibling(Path::new("manifest.toml")), PathBuf::from(".manifest.toml.tmp"));
    }

    #[test]
    fn test_write_atomic_then_read_text() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(&StorageConfig {
            base_path: temp.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();

        write_atomic(&storage, Path::new("out/manifest.toml"), b"total_records = 12\n").unwrap();

        assert_eq!(
            read_text(&storage, Path::new("out/manifest.toml")).unwrap(),
            "total_records = 12\n"
        );
        assert_eq!(storage.list(Path::new("out")).unwrap(), vec!["manifest.toml"]);
    }
}
