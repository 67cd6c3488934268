// rust/foldshard-core/src/storage/traits.rs

//! Storage abstraction traits.
//!
//! These traits keep the pipeline independent of where its files live, and
//! let tests swap in in-memory backends.

use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::error::Result;

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Size of the object in bytes.
    pub size: u64,
    /// Whether this object is a directory.
    pub is_dir: bool,
}

/// A positioned handle for reading from storage.
pub trait StorageReader: Read + Seek + Send {
    /// Returns the total size of the object in bytes.
    fn size(&self) -> u64;

    /// Reads exactly `length` bytes starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the range is out of bounds.
    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>>;

    /// Reads up to `length` bytes starting at `start`, stopping early at the
    /// end of the object.
    fn read_up_to(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        let available = self.size().saturating_sub(start).min(length as u64) as usize;
        self.read_range(start, available)
    }
}

/// A handle for writing to storage.
pub trait StorageWriter: Write + Send {
    /// Finishes the write operation, ensuring all data is persisted.
    ///
    /// After calling `finish`, the writer must not be used again.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or sync fails.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// The core storage backend trait.
///
/// This trait is object-safe and is shared across worker threads as
/// `Arc<dyn StorageBackend>`.
pub trait StorageBackend: Send + Sync {
    /// Checks if an object exists at the given path.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Retrieves metadata for an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or metadata cannot be read.
    fn metadata(&self, path: &Path) -> Result<ObjectMeta>;

    /// Opens an object for positioned reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or cannot be opened.
    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>>;

    /// Opens an object for writing, truncating any existing content.
    ///
    /// Parent directories will be created if they don't exist.
    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>>;

    /// Lists the entry names directly under `prefix`, sorted.
    ///
    /// Returns an empty list if `prefix` doesn't exist.
    fn list(&self, prefix: &Path) -> Result<Vec<String>>;

    /// Renames an object from one path to another.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Deletes a single object. Directories are not deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or cannot be deleted.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Creates a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
}
