// rust/foldshard-core/src/storage/local.rs

//! Local filesystem backend.
//!
//! Backing data files above the configured threshold are memory-mapped so
//! that record reads at arbitrary offsets are slice copies; everything else
//! goes through a buffered file handle.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::traits::{ObjectMeta, StorageBackend, StorageReader, StorageWriter};
use crate::config::StorageConfig;
use crate::error::{FoldshardError, Result};

/// Filesystem-backed [`StorageBackend`] rooted at a base directory.
pub struct LocalStorage {
    base_path: PathBuf,
    buffer_size: usize,
    use_mmap: bool,
    mmap_threshold: u64,
}

impl LocalStorage {
    /// Creates the backend, creating `base_path` if it doesn't exist.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let base_path = config.base_path.clone();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                FoldshardError::storage_with_source(&base_path, "failed to create base directory", e)
            })?;
        }

        Ok(Self {
            base_path,
            buffer_size: config.buffer_size.max(1),
            use_mmap: config.use_mmap,
            mmap_threshold: config.mmap_threshold,
        })
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    fn ensure_parent(&self, full_path: &Path) -> Result<()> {
        match full_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                fs::create_dir_all(parent).map_err(|e| {
                    FoldshardError::storage_with_source(
                        parent,
                        "failed to create parent directories",
                        e,
                    )
                })
            }
            _ => Ok(()),
        }
    }
}

impl StorageBackend for LocalStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve_path(path).exists())
    }

    fn metadata(&self, path: &Path) -> Result<ObjectMeta> {
        let full_path = self.resolve_path(path);
        let meta = fs::metadata(&full_path).map_err(|e| {
            FoldshardError::storage_with_source(&full_path, "failed to read metadata", e)
        })?;

        Ok(ObjectMeta {
            size: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
        let full_path = self.resolve_path(path);
        let file = File::open(&full_path).map_err(|e| {
            FoldshardError::storage_with_source(&full_path, "failed to open file", e)
        })?;

        let size = file
            .metadata()
            .map_err(|e| {
                FoldshardError::storage_with_source(&full_path, "failed to read file metadata", e)
            })?
            .len();

        // Zero-length files cannot be mapped on every platform.
        if self.use_mmap && size > 0 && size >= self.mmap_threshold {
            // SAFETY: the file is opened read-only and the map lives as long
            // as the reader. Backing files are not modified during a build.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
                FoldshardError::storage_with_source(&full_path, "failed to memory-map file", e)
            })?;
            Ok(Box::new(MmapReader::new(mmap, full_path)))
        } else {
            Ok(Box::new(LocalReader::new(
                file,
                size,
                self.buffer_size,
                full_path,
            )))
        }
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>> {
        let full_path = self.resolve_path(path);
        self.ensure_parent(&full_path)?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&full_path)
            .map_err(|e| {
                FoldshardError::storage_with_source(&full_path, "failed to create file", e)
            })?;

        Ok(Box::new(LocalWriter::new(file, self.buffer_size, full_path)))
    }

    fn list(&self, prefix: &Path) -> Result<Vec<String>> {
        let full_path = self.resolve_path(prefix);

        if !full_path.exists() {
            return Ok(Vec::new());
        }
        if !full_path.is_dir() {
            return Err(FoldshardError::storage(&full_path, "path is not a directory"));
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&full_path).map_err(|e| {
            FoldshardError::storage_with_source(&full_path, "failed to read directory", e)
        })? {
            let entry = entry.map_err(|e| {
                FoldshardError::storage_with_source(&full_path, "failed to read directory entry", e)
            })?;
            if let Some(name) = entry.file_name().to_str() {
                entries.push(name.to_string());
            }
        }

        entries.sort();
        Ok(entries)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_path = self.resolve_path(from);
        let to_path = self.resolve_path(to);
        self.ensure_parent(&to_path)?;

        fs::rename(&from_path, &to_path).map_err(|e| {
            FoldshardError::storage_with_source(
                &from_path,
                format!("failed to rename to {}", to_path.display()),
                e,
            )
        })
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve_path(path);
        fs::remove_file(&full_path)
            .map_err(|e| FoldshardError::storage_with_source(&full_path, "failed to delete file", e))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve_path(path);
        fs::create_dir_all(&full_path).map_err(|e| {
            FoldshardError::storage_with_source(&full_path, "failed to create directories", e)
        })
    }
}

struct LocalReader {
    reader: BufReader<File>,
    size: u64,
    path: PathBuf,
}

impl LocalReader {
    fn new(file: File, size: u64, buffer_size: usize, path: PathBuf) -> Self {
        Self {
            reader: BufReader::with_capacity(buffer_size, file),
            size,
            path,
        }
    }
}

impl Read for LocalReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for LocalReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl StorageReader for LocalReader {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        if start.saturating_add(length as u64) > self.size {
            return Err(FoldshardError::storage(
                &self.path,
                format!(
                    "read range {}..{} exceeds file size {}",
                    start,
                    start.saturating_add(length as u64),
                    self.size
                ),
            ));
        }

        self.reader.seek(SeekFrom::Start(start)).map_err(|e| {
            FoldshardError::storage_with_source(
                &self.path,
                format!("failed to seek to position {start}"),
                e,
            )
        })?;

        let mut buf = vec![0u8; length];
        self.reader.read_exact(&mut buf).map_err(|e| {
            FoldshardError::storage_with_source(
                &self.path,
                format!("failed to read {length} bytes at position {start}"),
                e,
            )
        })?;

        Ok(buf)
    }
}

struct MmapReader {
    mmap: Mmap,
    position: u64,
    path: PathBuf,
}

impl MmapReader {
    fn new(mmap: Mmap, path: PathBuf) -> Self {
        Self {
            mmap,
            position: 0,
            path,
        }
    }
}

impl Read for MmapReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.mmap.len() as u64;
        if self.position >= len {
            return Ok(0);
        }

        let pos = self.position as usize;
        let remaining = &self.mmap[pos..];
        let to_read = buf.len().min(remaining.len());
        buf[..to_read].copy_from_slice(&remaining[..to_read]);
        self.position += to_read as u64;
        Ok(to_read)
    }
}

impl Seek for MmapReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::End(offset) => self.mmap.len() as i128 + i128::from(offset),
            SeekFrom::Current(offset) => i128::from(self.position) + i128::from(offset),
        };

        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to negative position",
            ));
        }

        self.position = new_pos as u64;
        Ok(self.position)
    }
}

impl StorageReader for MmapReader {
    fn size(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        let end = start.saturating_add(length as u64);
        if end > self.mmap.len() as u64 {
            return Err(FoldshardError::storage(
                &self.path,
                format!(
                    "read range {}..{} exceeds file size {}",
                    start,
                    end,
                    self.mmap.len()
                ),
            ));
        }

        Ok(self.mmap[start as usize..end as usize].to_vec())
    }
}

struct LocalWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl LocalWriter {
    fn new(file: File, buffer_size: usize, path: PathBuf) -> Self {
        Self {
            writer: BufWriter::with_capacity(buffer_size, file),
            path,
        }
    }
}

impl Write for LocalWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl StorageWriter for LocalWriter {
    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer.flush().map_err(|e| {
            FoldshardError::storage_with_source(&self.path, "failed to flush writer", e)
        })?;

        self.writer.get_ref().sync_all().map_err(|e| {
            FoldshardError::storage_with_source(&self.path, "failed to sync file to disk", e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (LocalStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            base_path: temp_dir.path().to_path_buf(),
            buffer_size: 4096,
            use_mmap: true,
            mmap_threshold: 1024,
        };
        let storage = LocalStorage::new(&config).unwrap();
        (storage, temp_dir)
    }

    fn put(storage: &LocalStorage, path: &str, data: &[u8]) {
        let mut writer = storage.open_write(Path::new(path)).unwrap();
        writer.write_all(data).unwrap();
        writer.finish().unwrap();
    }

    fn rows(count: usize) -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..count {
            data.extend_from_slice(format!("rec{i:05}\tACDEFGHIKLMNPQRSTVWY\n").as_bytes());
        }
        data
    }

    #[test]
    fn test_new_creates_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let new_base = temp_dir.path().join("build");

        let config = StorageConfig {
            base_path: new_base.clone(),
            ..Default::default()
        };

        let storage = LocalStorage::new(&config).unwrap();
        assert!(new_base.exists());
        storage.create_dir_all(Path::new("shards")).unwrap();
        assert!(new_base.join("shards").is_dir());
    }

    #[test]
    fn test_metadata_reports_size_and_kind() {
        let (storage, _temp) = create_test_storage();
        put(&storage, "index.txt", b"0 0 12\n");
        storage.create_dir_all(Path::new("shards/train")).unwrap();

        let meta = storage.metadata(Path::new("index.txt")).unwrap();
        assert_eq!(meta.size, 7);
        assert!(!meta.is_dir);
        assert!(storage.metadata(Path::new("shards/train")).unwrap().is_dir);
        assert!(storage.metadata(Path::new("missing.txt")).is_err());
    }

    #[test]
    fn test_small_file_uses_buffered_reader() {
        let (storage, _temp) = create_test_storage();
        put(&storage, "clusters.txt", b"0 1\n2\n");

        let mut reader = storage.open_read(Path::new("clusters.txt")).unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "0 1\n2\n");
        assert_eq!(reader.read_range(4, 1).unwrap(), b"2");
    }

    #[test]
    fn test_large_file_read_range_matches_content() {
        let (storage, _temp) = create_test_storage();
        let data = rows(200);
        put(&storage, "data.tsv", &data);

        let mut reader = storage.open_read(Path::new("data.tsv")).unwrap();
        assert_eq!(reader.size(), data.len() as u64);
        // Each row is 30 bytes.
        let range = reader.read_range(30, 30).unwrap();
        assert_eq!(range, &data[30..60]);
        assert!(String::from_utf8(range).unwrap().starts_with("rec00001"));
    }

    #[test]
    fn test_read_range_out_of_bounds() {
        let (storage, _temp) = create_test_storage();
        let data = rows(200);
        put(&storage, "data.tsv", &data);
        put(&storage, "small.tsv", b"k\tAC\n");

        let mut mapped = storage.open_read(Path::new("data.tsv")).unwrap();
        assert!(mapped.read_range(data.len() as u64 - 4, 100).is_err());

        let mut buffered = storage.open_read(Path::new("small.tsv")).unwrap();
        let err = buffered.read_range(2, 10).unwrap_err();
        assert!(err.to_string().contains("small.tsv"));
    }

    #[test]
    fn test_read_up_to_clamps_at_end() {
        let (storage, _temp) = create_test_storage();
        let data = rows(200);
        put(&storage, "data.tsv", &data);

        let mut reader = storage.open_read(Path::new("data.tsv")).unwrap();
        let tail = reader.read_up_to(data.len() as u64 - 10, 4096).unwrap();
        assert_eq!(tail, &data[data.len() - 10..]);
        assert!(reader.read_up_to(data.len() as u64, 16).unwrap().is_empty());
    }

    #[test]
    fn test_mmap_seek() {
        let (storage, _temp) = create_test_storage();
        let data: Vec<u8> = (0..2048).map(|i| (i % 10) as u8 + b'0').collect();
        put(&storage, "digits.bin", &data);

        let mut reader = storage.open_read(Path::new("digits.bin")).unwrap();
        let mut buf = [0u8; 1];

        assert_eq!(reader.seek(SeekFrom::Start(5)).unwrap(), 5);
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf[0], b'5');

        assert_eq!(reader.seek(SeekFrom::Current(2)).unwrap(), 8);
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf[0], b'8');

        assert_eq!(reader.seek(SeekFrom::End(-3)).unwrap(), 2045);
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf[0], b'5');

        assert!(reader.seek(SeekFrom::Current(-5000)).is_err());
    }

    #[test]
    fn test_mmap_disabled_reads_same_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            base_path: temp_dir.path().to_path_buf(),
            buffer_size: 4096,
            use_mmap: false,
            mmap_threshold: 1024,
        };
        let storage = LocalStorage::new(&config).unwrap();
        let data = rows(200);
        put(&storage, "data.tsv", &data);

        let mut reader = storage.open_read(Path::new("data.tsv")).unwrap();
        assert_eq!(reader.read_range(58, 29).unwrap(), &data[58..87]);
    }

    #[test]
    fn test_empty_file_is_readable() {
        let (storage, _temp) = create_test_storage();
        put(&storage, "empty.shard", b"");

        let mut reader = storage.open_read(Path::new("empty.shard")).unwrap();
        assert_eq!(reader.size(), 0);
        assert!(reader.read_up_to(0, 8).unwrap().is_empty());
    }

    #[test]
    fn test_list_sorted_and_missing() {
        let (storage, _temp) = create_test_storage();
        for name in ["part0_1.shard", "part1_0.shard", "part0_0.shard"] {
            put(&storage, &format!("train/{name}"), b"x");
        }

        let entries = storage.list(Path::new("train")).unwrap();
        assert_eq!(entries, vec!["part0_0.shard", "part0_1.shard", "part1_0.shard"]);
        assert!(storage.list(Path::new("validate")).unwrap().is_empty());
        assert!(storage.list(Path::new("train/part0_0.shard")).is_err());
    }

    #[test]
    fn test_rename_creates_parent_dirs() {
        let (storage, _temp) = create_test_storage();
        put(&storage, ".part0_0.shard.tmp", b"hello");

        storage
            .rename(Path::new(".part0_0.shard.tmp"), Path::new("train/part0_0.shard"))
            .unwrap();

        assert!(!storage.exists(Path::new(".part0_0.shard.tmp")).unwrap());
        let mut reader = storage.open_read(Path::new("train/part0_0.shard")).unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello");

        assert!(storage
            .rename(Path::new("nonexistent"), Path::new("other"))
            .is_err());
    }

    #[test]
    fn test_delete_file_only() {
        let (storage, _temp) = create_test_storage();
        put(&storage, "train/part0_0.shard", b"x");

        storage.delete(Path::new("train/part0_0.shard")).unwrap();
        assert!(!storage.exists(Path::new("train/part0_0.shard")).unwrap());
        assert!(storage.delete(Path::new("train/part0_0.shard")).is_err());
        assert!(storage.delete(Path::new("train")).is_err());
    }

    #[test]
    fn test_open_write_truncates() {
        let (storage, _temp) = create_test_storage();
        put(&storage, "nested/manifest.toml", b"initial content");
        put(&storage, "nested/manifest.toml", b"new");

        let mut reader = storage.open_read(Path::new("nested/manifest.toml")).unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"new");
    }

    #[test]
    fn test_object_safety() {
        let (storage, _temp) = create_test_storage();
        let backend: std::sync::Arc<dyn StorageBackend> = std::sync::Arc::new(storage);

        let mut writer = backend.open_write(Path::new("split_assignment.txt")).unwrap();
        writer.write_all(b"0 train\n").unwrap();
        writer.finish().unwrap();

        assert!(backend.exists(Path::new("split_assignment.txt")).unwrap());
    }
}
