// rust/foldshard-core/src/source/record.rs

use crate::error::{FoldshardError, Result};

/// Raw fields of one backing data row: `key sequence [structure]`.
///
/// Fields are separated by tabs or spaces. When the structure column is
/// present it carries one secondary-structure code per residue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub key: String,
    pub sequence: Vec<u8>,
    pub structure: Option<Vec<u8>>,
}

impl RawRecord {
    /// Parses one row body. `expected_key` is the key the index used to
    /// locate the row; errors are reported against it.
    pub fn parse(expected_key: &str, body: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|e| FoldshardError::decode(expected_key, format!("row is not UTF-8: {e}")))?;

        let fields: Vec<&str> = text
            .split([' ', '\t', '\r', '\n'])
            .filter(|f| !f.is_empty())
            .collect();

        match fields.as_slice() {
            [key, sequence] => Self::build(expected_key, key, sequence, None),
            [key, sequence, structure] => Self::build(expected_key, key, sequence, Some(*structure)),
            _ => Err(FoldshardError::decode(
                expected_key,
                format!(
                    "expected 'key sequence [structure]', found {} field(s)",
                    fields.len()
                ),
            )),
        }
    }

    fn build(
        expected_key: &str,
        key: &str,
        sequence: &str,
        structure: Option<&str>,
    ) -> Result<Self> {
        if key != expected_key {
            return Err(FoldshardError::decode(
                expected_key,
                format!("index points at row for '{key}'"),
            ));
        }

        if let Some(structure) = structure {
            if structure.len() != sequence.len() {
                return Err(FoldshardError::decode(
                    expected_key,
                    format!(
                        "structure length {} does not match sequence length {}",
                        structure.len(),
                        sequence.len()
                    ),
                ));
            }
        }

        Ok(Self {
            key: key.to_string(),
            sequence: sequence.as_bytes().to_vec(),
            structure: structure.map(|s| s.as_bytes().to_vec()),
        })
    }

    /// Number of residue positions in the record.
    pub fn positions(&self) -> usize {
        self.sequence.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sequence_only() {
        let record = RawRecord::parse("1abc_A", b"1abc_A\tMKV.LA").unwrap();
        assert_eq!(record.key, "1abc_A");
        assert_eq!(record.sequence, b"MKV.LA");
        assert_eq!(record.structure, None);
        assert_eq!(record.positions(), 6);
    }

    #[test]
    fn test_parse_with_structure_and_spaces() {
        let record = RawRecord::parse("7", b"7  ACDE \tHHE-\r").unwrap();
        assert_eq!(record.sequence, b"ACDE");
        assert_eq!(record.structure.as_deref(), Some(&b"HHE-"[..]));
    }

    #[test]
    fn test_structure_length_mismatch() {
        let err = RawRecord::parse("7", b"7\tACDE\tHH").unwrap_err();
        assert!(matches!(err, FoldshardError::Decode { ref key, .. } if key == "7"));
        assert!(err.to_string().contains("structure length 2"));
    }

    #[test]
    fn test_wrong_field_count_and_key() {
        assert!(RawRecord::parse("7", b"7").is_err());
        assert!(RawRecord::parse("7", b"7 AC HH extra").is_err());

        let err = RawRecord::parse("7", b"8\tAC").unwrap_err();
        assert!(err.to_string().contains("'8'"));
    }
}
