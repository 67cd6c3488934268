// rust/foldshard-core/src/source/format.rs

use std::sync::Arc;

use crate::error::{FoldshardError, Result};

/// Describes how to find record boundaries in a backing data file.
///
/// Used when an index entry gives only an offset: the reader pulls a window
/// of bytes starting at the offset and asks the format where the record ends.
pub trait RecordFormat: Send + Sync {
    /// Minimum size of a record in bytes, framing included.
    fn min_record_size(&self) -> usize;

    /// Find the end of the record that starts at `offset` in `data`.
    /// Returns the byte position after the record ends (exclusive end), or
    /// `None` if `data` does not hold a complete record.
    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize>;

    /// Strips framing bytes from a complete record, leaving the row body.
    fn record_body<'a>(&self, record: &'a [u8]) -> &'a [u8] {
        record
    }

    /// Whether a record cut short by end-of-file is still complete.
    fn accepts_unterminated_tail(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;
}

/// Fixed-size records; the size includes any padding.
#[derive(Debug, Clone)]
pub struct FixedSizeFormat {
    pub record_size: usize,
}

impl FixedSizeFormat {
    pub fn new(record_size: usize) -> Self {
        Self { record_size }
    }
}

impl RecordFormat for FixedSizeFormat {
    fn min_record_size(&self) -> usize {
        self.record_size
    }

    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize> {
        let end = offset.checked_add(self.record_size)?;
        (end <= data.len()).then_some(end)
    }

    fn record_body<'a>(&self, record: &'a [u8]) -> &'a [u8] {
        // Rows shorter than the record size are NUL or space padded.
        let trimmed = record
            .iter()
            .rposition(|&b| b != 0 && !b.is_ascii_whitespace())
            .map_or(0, |last| last + 1);
        &record[..trimmed]
    }

    fn name(&self) -> &'static str {
        "fixed-size"
    }
}

/// Newline-delimited rows (TSV and friends).
#[derive(Debug, Clone, Default)]
pub struct NewlineDelimitedFormat;

impl NewlineDelimitedFormat {
    pub fn new() -> Self {
        Self
    }
}

impl RecordFormat for NewlineDelimitedFormat {
    fn min_record_size(&self) -> usize {
        1
    }

    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize> {
        if offset >= data.len() {
            return None;
        }

        data[offset..]
            .iter()
            .position(|&byte| byte == b'\n')
            .map(|i| offset + i + 1)
    }

    fn record_body<'a>(&self, record: &'a [u8]) -> &'a [u8] {
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        record.strip_suffix(b"\r").unwrap_or(record)
    }

    // The last row of a file may be missing its newline.
    fn accepts_unterminated_tail(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "newline-delimited"
    }
}

/// Length-prefixed records (4-byte big-endian length + data).
#[derive(Debug, Clone, Default)]
pub struct LengthPrefixedFormat;

impl LengthPrefixedFormat {
    pub fn new() -> Self {
        Self
    }
}

impl RecordFormat for LengthPrefixedFormat {
    fn min_record_size(&self) -> usize {
        4
    }

    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize> {
        let prefix_end = offset.checked_add(4)?;
        if prefix_end > data.len() {
            return None;
        }

        let length_bytes: [u8; 4] = data[offset..prefix_end].try_into().ok()?;
        let length = u32::from_be_bytes(length_bytes) as usize;

        let end = prefix_end.checked_add(length)?;
        (end <= data.len()).then_some(end)
    }

    fn record_body<'a>(&self, record: &'a [u8]) -> &'a [u8] {
        record.get(4..).unwrap_or(&[])
    }

    fn name(&self) -> &'static str {
        "length-prefixed"
    }
}

/// Parses a record format name from configuration:
/// `"newline"`, `"length-prefixed"` or `"fixed:N"`.
pub fn parse_format(format: &str) -> Result<Arc<dyn RecordFormat>> {
    if let Some(size_str) = format.strip_prefix("fixed:") {
        let size: usize = size_str.parse().map_err(|_| {
            FoldshardError::config(format!("invalid fixed record size: '{size_str}'"))
        })?;
        if size == 0 {
            return Err(FoldshardError::config("fixed record size must be > 0"));
        }
        Ok(Arc::new(FixedSizeFormat::new(size)))
    } else {
        match format {
            "newline" => Ok(Arc::new(NewlineDelimitedFormat::new())),
            "length-prefixed" => Ok(Arc::new(LengthPrefixedFormat::new())),
            _ => Err(FoldshardError::config(format!(
                "unknown record format: '{format}'. Expected 'fixed:N', 'newline', or 'length-prefixed'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_size_boundary_and_padding() {
        let format = FixedSizeFormat::new(12);
        let data = b"k1\tACDE\0\0\0\0\0k2\tWY       ";

        assert_eq!(format.find_record_end(data, 0), Some(12));
        assert_eq!(format.find_record_end(data, 12), Some(24));
        assert_eq!(format.find_record_end(data, 13), None);
        assert_eq!(format.record_body(&data[0..12]), b"k1\tACDE");
        assert_eq!(format.record_body(&data[12..24]), b"k2\tWY");
    }

    #[test]
    fn test_newline_boundary() {
        let format = NewlineDelimitedFormat::new();
        let data = b"a\tAC\r\nb\tWY\nc\tKK";

        assert_eq!(format.find_record_end(data, 0), Some(6));
        assert_eq!(format.find_record_end(data, 6), Some(11));
        assert_eq!(format.find_record_end(data, 11), None);
        assert_eq!(format.find_record_end(data, 40), None);
        assert_eq!(format.record_body(&data[0..6]), b"a\tAC");
        assert_eq!(format.record_body(&data[6..11]), b"b\tWY");
        assert!(format.accepts_unterminated_tail());
    }

    #[test]
    fn test_length_prefixed_boundary() {
        let format = LengthPrefixedFormat::new();

        let mut data = vec![];
        data.extend_from_slice(&7u32.to_be_bytes());
        data.extend_from_slice(b"k\tACDEF");
        data.extend_from_slice(&100u32.to_be_bytes());
        data.extend_from_slice(b"short");

        assert_eq!(format.find_record_end(&data, 0), Some(11));
        assert_eq!(format.record_body(&data[0..11]), b"k\tACDEF");
        // Prefix claims more data than is available.
        assert_eq!(format.find_record_end(&data, 11), None);
        assert_eq!(format.find_record_end(&[0u8; 2], 0), None);
        assert!(!format.accepts_unterminated_tail());
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("newline").unwrap().name(), "newline-delimited");
        assert_eq!(parse_format("length-prefixed").unwrap().name(), "length-prefixed");
        assert_eq!(parse_format("fixed:64").unwrap().min_record_size(), 64);
        assert!(parse_format("fixed:0").is_err());
        assert!(parse_format("fixed:abc").is_err());
        assert!(parse_format("csv").is_err());
    }
}
