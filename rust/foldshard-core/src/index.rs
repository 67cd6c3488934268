// rust/foldshard-core/src/index.rs

//! Record index: dense record id -> location in a backing data file.
//!
//! Index files hold one line per record, `key offset [length]`, with fields
//! separated by whitespace or commas. Index file `k` describes data file `k`.
//! Blank lines and lines starting with `#` are skipped.
//!
//! Dense ids are a pure function of the index content: keys are sorted
//! (numerically when every key is an unsigned integer, lexicographically
//! otherwise) and numbered from zero. Keys that are already exactly `0..N`
//! therefore keep their value as id.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{FoldshardError, Result};
use crate::storage::{read_text, StorageBackend};

/// Dense record id assigned by the index.
pub type RecordId = u32;

/// Where one record's raw row lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    /// Backing data file number (position in the configured file list).
    pub file: usize,
    /// Byte offset of the row in that file.
    pub offset: u64,
    /// Row length in bytes, when the index records it.
    pub length: Option<u64>,
}

impl fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file {} offset {}", self.file, self.offset)?;
        if let Some(length) = self.length {
            write!(f, " length {length}")?;
        }
        Ok(())
    }
}

/// Read-only mapping from dense id to key and location.
///
/// Built once, then shared across worker threads behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    keys: Vec<String>,
    locations: Vec<RecordLocation>,
    ids: HashMap<String, RecordId>,
}

impl RecordIndex {
    /// Builds an index from `(key, location)` entries in any order.
    ///
    /// An exact repeat of a key at the same location is collapsed; the same
    /// key at a different location is a [`FoldshardError::DuplicateId`].
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, RecordLocation)>,
    {
        let mut seen: HashMap<String, RecordLocation> = HashMap::new();
        let mut collapsed = 0usize;

        for (key, location) in entries {
            match seen.get(&key) {
                Some(first) if *first == location => collapsed += 1,
                Some(first) => {
                    return Err(FoldshardError::duplicate_id(
                        key,
                        first.to_string(),
                        location.to_string(),
                    ));
                }
                None => {
                    seen.insert(key, location);
                }
            }
        }

        if collapsed > 0 {
            debug!(collapsed, "Collapsed exact duplicate index entries");
        }

        let mut entries: Vec<(String, RecordLocation)> = seen.into_iter().collect();
        if RecordId::try_from(entries.len()).is_err() {
            return Err(FoldshardError::config(format!(
                "index holds {} records, more than the {} a dense id can address",
                entries.len(),
                RecordId::MAX
            )));
        }

        let all_numeric = entries.iter().all(|(key, _)| key.parse::<u64>().is_ok());
        if all_numeric {
            // Ties only happen for zero-padded spellings of the same number.
            entries.sort_by(|(a, _), (b, _)| {
                let (na, nb) = (a.parse::<u64>().unwrap_or(0), b.parse::<u64>().unwrap_or(0));
                na.cmp(&nb).then_with(|| a.cmp(b))
            });
        } else {
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        }

        let mut index = Self {
            keys: Vec::with_capacity(entries.len()),
            locations: Vec::with_capacity(entries.len()),
            ids: HashMap::with_capacity(entries.len()),
        };
        for (id, (key, location)) in entries.into_iter().enumerate() {
            index.ids.insert(key.clone(), id as RecordId);
            index.keys.push(key);
            index.locations.push(location);
        }

        Ok(index)
    }

    /// Loads and merges index files; `paths[k]` describes data file `k`.
    pub fn load_files(storage: &dyn StorageBackend, paths: &[PathBuf]) -> Result<Self> {
        let mut entries = Vec::new();

        for (file, path) in paths.iter().enumerate() {
            let content = read_text(storage, path)?;
            let before = entries.len();
            parse_index(path, file, &content, &mut entries)?;
            debug!(
                path = %path.display(),
                file,
                entries = entries.len() - before,
                "Parsed index file"
            );
        }

        let index = Self::from_entries(entries)?;
        info!(
            files = paths.len(),
            records = index.len(),
            "Loaded record index"
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn location(&self, id: RecordId) -> Option<&RecordLocation> {
        self.locations.get(id as usize)
    }

    pub fn key(&self, id: RecordId) -> Option<&str> {
        self.keys.get(id as usize).map(String::as_str)
    }

    pub fn id_of(&self, key: &str) -> Option<RecordId> {
        self.ids.get(key).copied()
    }

    /// Highest backing file number referenced by any entry.
    pub fn max_file(&self) -> Option<usize> {
        self.locations.iter().map(|l| l.file).max()
    }
}

fn parse_index(
    path: &Path,
    file: usize,
    content: &str,
    entries: &mut Vec<(String, RecordLocation)>,
) -> Result<()> {
    for (line_no, line) in content.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();

        let (key, offset, length) = match fields.as_slice() {
            [key, offset] => (*key, *offset, None),
            [key, offset, length] => (*key, *offset, Some(*length)),
            _ => {
                return Err(FoldshardError::malformed_index(
                    path,
                    line_no,
                    format!("expected 'key offset [length]', found {} field(s)", fields.len()),
                ));
            }
        };

        let offset = parse_position(path, line_no, "offset", offset)?;
        let length = length
            .map(|l| parse_position(path, line_no, "length", l))
            .transpose()?;

        entries.push((
            key.to_string(),
            RecordLocation {
                file,
                offset,
                length,
            },
        ));
    }

    Ok(())
}

fn parse_position(path: &Path, line: usize, what: &str, value: &str) -> Result<u64> {
    if value.starts_with('-') {
        return Err(FoldshardError::malformed_index(
            path,
            line,
            format!("negative {what} '{value}'"),
        ));
    }
    value.parse::<u64>().map_err(|_| {
        FoldshardError::malformed_index(path, line, format!("non-numeric {what} '{value}'"))
    })
}
