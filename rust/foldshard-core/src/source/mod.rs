// rust/foldshard-core/src/source/mod.rs

//! Backing data files: record framing and row decoding.
//!
//! The index says where a record starts and, optionally, how long it is.
//! When the length is absent the configured [`RecordFormat`] finds the end
//! of the record from the bytes at that offset.

mod format;
mod record;

pub use format::{
    parse_format, FixedSizeFormat, LengthPrefixedFormat, NewlineDelimitedFormat, RecordFormat,
};
pub use record::RawRecord;

use crate::error::{FoldshardError, Result};
use crate::index::RecordLocation;
use crate::storage::StorageReader;

/// Initial read window when searching for a record boundary.
const INITIAL_WINDOW: usize = 8 * 1024;

/// Reads the body of the record at `location` from an open backing file.
///
/// With an explicit length the bytes are returned as-is. Otherwise the read
/// window grows until `format` finds a complete record.
pub fn read_record_bytes(
    reader: &mut dyn StorageReader,
    key: &str,
    location: &RecordLocation,
    format: &dyn RecordFormat,
) -> Result<Vec<u8>> {
    let size = reader.size();
    if location.offset >= size {
        return Err(FoldshardError::decode(
            key,
            format!(
                "offset {} is past the end of data file {} ({} bytes)",
                location.offset, location.file, size
            ),
        ));
    }

    if let Some(length) = location.length {
        let length = usize::try_from(length)
            .map_err(|_| FoldshardError::decode(key, format!("record length {length} too large")))?;
        return reader.read_range(location.offset, length).map_err(|e| {
            FoldshardError::decode(key, format!("failed to read {length} bytes: {e}"))
        });
    }

    let mut window = INITIAL_WINDOW.max(format.min_record_size());
    loop {
        let buf = reader.read_up_to(location.offset, window)?;
        if let Some(end) = format.find_record_end(&buf, 0) {
            return Ok(format.record_body(&buf[..end]).to_vec());
        }

        let at_eof = location.offset + buf.len() as u64 >= size;
        if at_eof {
            if format.accepts_unterminated_tail() && !buf.is_empty() {
                return Ok(format.record_body(&buf).to_vec());
            }
            return Err(FoldshardError::decode(
                key,
                format!(
                    "truncated {} record at offset {} of data file {}",
                    format.name(),
                    location.offset,
                    location.file
                ),
            ));
        }

        window = window.saturating_mul(2);
    }
}

/// Reads and parses the row for `key` at `location`.
pub fn read_raw_record(
    reader: &mut dyn StorageReader,
    key: &str,
    location: &RecordLocation,
    format: &dyn RecordFormat,
) -> Result<RawRecord> {
    let body = read_record_bytes(reader, key, location, format)?;
    RawRecord::parse(key, &body)
}
