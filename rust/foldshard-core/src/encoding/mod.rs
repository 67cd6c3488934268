// rust/foldshard-core/src/encoding/mod.rs

//! Per-position residue encodings.
//!
//! A record with `P` positions encodes to a feature vector of
//! `P * feature_channels` values and a label vector of `P * label_channels`
//! values, both flattened position-major.

mod tables;

pub use tables::{AANDX_RED, CANONICAL_RESIDUES, JTT_P01, Q8_CODES};

use crate::config::EncodingConfig;
use crate::error::{FoldshardError, Result};
use crate::source::RawRecord;

/// Marker for a missing residue; encodes to all zeros.
pub const MISSING_RESIDUE: u8 = b'.';

/// Built-in per-position tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidueTable {
    /// 11 PCA components of AAindex properties.
    AandxReduced,
    /// JTT P(0.01) exchange distribution, rows renormalized to sum 1.
    JttP01,
    /// 20 canonical residues.
    OneHot,
    /// Q8 DSSP code, read from the structure column.
    SecondaryStructure,
}

/// Which column of a [`RawRecord`] a table reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Sequence,
    Structure,
}

impl ResidueTable {
    pub const ALL: [ResidueTable; 4] = [
        ResidueTable::AandxReduced,
        ResidueTable::JttP01,
        ResidueTable::OneHot,
        ResidueTable::SecondaryStructure,
    ];

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|table| table.name() == name)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|t| t.name()).collect();
                FoldshardError::config(format!(
                    "unknown residue table '{name}'. Expected one of: {}",
                    known.join(", ")
                ))
            })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResidueTable::AandxReduced => "aandx-red",
            ResidueTable::JttP01 => "jtt-p01",
            ResidueTable::OneHot => "one-hot",
            ResidueTable::SecondaryStructure => "q8",
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            ResidueTable::AandxReduced => 11,
            ResidueTable::JttP01 | ResidueTable::OneHot => 20,
            ResidueTable::SecondaryStructure => Q8_CODES.len(),
        }
    }

    pub fn column(&self) -> Column {
        match self {
            ResidueTable::SecondaryStructure => Column::Structure,
            _ => Column::Sequence,
        }
    }

    // Averaging tables treat X as a uniform distribution.
    fn averaging(&self) -> bool {
        matches!(self, ResidueTable::JttP01 | ResidueTable::OneHot)
    }

    fn normalized(&self) -> bool {
        matches!(self, ResidueTable::JttP01)
    }

    /// Builds the byte -> row lookup used during encoding.
    pub fn lookup(&self) -> ResidueLookup {
        let channels = self.channels();
        let mut lookup = ResidueLookup {
            table: *self,
            channels,
            rows: vec![None; 256],
        };

        match self {
            ResidueTable::SecondaryStructure => {
                for (i, &code) in Q8_CODES.iter().enumerate() {
                    let mut row = vec![0.0; channels];
                    row[i] = 1.0;
                    lookup.set(code, row);
                }
            }
            _ => {
                for (i, &residue) in CANONICAL_RESIDUES.iter().enumerate() {
                    let row = match self {
                        ResidueTable::AandxReduced => AANDX_RED[i].to_vec(),
                        ResidueTable::JttP01 => JTT_P01[i].to_vec(),
                        _ => {
                            let mut row = vec![0.0; channels];
                            row[i] = 1.0;
                            row
                        }
                    };
                    lookup.set(residue, row);
                }

                // Selenocysteine and pyrrolysine.
                lookup.alias(b'U', b'C');
                lookup.alias(b'O', b'K');

                let unknown = if self.averaging() {
                    1.0 / channels as f32
                } else {
                    0.0
                };
                lookup.set(b'X', vec![unknown; channels]);
                lookup.mean(b'B', b'D', b'N');
                lookup.mean(b'J', b'I', b'L');
                lookup.mean(b'Z', b'E', b'Q');

                if self.normalized() {
                    lookup.normalize_rows();
                }
            }
        }

        lookup.set(MISSING_RESIDUE, vec![0.0; channels]);
        lookup
    }
}

/// Precomputed rows for one [`ResidueTable`], indexed by code byte.
#[derive(Debug, Clone)]
pub struct ResidueLookup {
    table: ResidueTable,
    channels: usize,
    rows: Vec<Option<Box<[f32]>>>,
}

impl ResidueLookup {
    pub fn table(&self) -> ResidueTable {
        self.table
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Row for a code. Residue letters are case-insensitive.
    pub fn row(&self, code: u8) -> Option<&[f32]> {
        self.rows[code.to_ascii_uppercase() as usize].as_deref()
    }

    /// Appends the rows for every code in `codes` to `out`.
    pub fn encode_into(&self, key: &str, codes: &[u8], out: &mut Vec<f32>) -> Result<()> {
        out.reserve(codes.len() * self.channels);
        for (position, &code) in codes.iter().enumerate() {
            let row = self.row(code).ok_or_else(|| {
                FoldshardError::decode(
                    key,
                    format!(
                        "unknown code '{}' at position {} for table '{}'",
                        code.escape_ascii(),
                        position,
                        self.table.name()
                    ),
                )
            })?;
            out.extend_from_slice(row);
        }
        Ok(())
    }

    fn set(&mut self, code: u8, row: Vec<f32>) {
        self.rows[code as usize] = Some(row.into_boxed_slice());
    }

    fn alias(&mut self, code: u8, from: u8) {
        self.rows[code as usize] = self.rows[from as usize].clone();
    }

    fn mean(&mut self, code: u8, a: u8, b: u8) {
        if let (Some(ra), Some(rb)) = (self.row(a), self.row(b)) {
            let row = ra.iter().zip(rb.iter()).map(|(x, y)| (x + y) / 2.0).collect();
            self.set(code, row);
        }
    }

    fn normalize_rows(&mut self) {
        for row in self.rows.iter_mut().flatten() {
            let sum: f32 = row.iter().sum();
            if sum > 0.0 {
                row.iter_mut().for_each(|v| *v /= sum);
            }
        }
    }
}

/// One record encoded into flattened feature and label tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRecord {
    pub key: String,
    pub positions: usize,
    pub features: Vec<f32>,
    pub labels: Vec<f32>,
}

/// Pure `record -> tensors` function applied by shard workers.
pub trait RecordEncoder: Send + Sync {
    fn feature_channels(&self) -> usize;

    fn label_channels(&self) -> usize;

    fn encode(&self, record: &RawRecord) -> Result<EncodedRecord>;

    /// Name recorded in the manifest for the feature tensor.
    fn feature_encoding(&self) -> &str {
        "custom"
    }

    /// Name recorded in the manifest for the label tensor.
    fn label_encoding(&self) -> &str {
        "custom"
    }
}

/// Encoder built from two residue tables.
#[derive(Debug, Clone)]
pub struct TableEncoder {
    features: ResidueLookup,
    labels: ResidueLookup,
}

impl TableEncoder {
    pub fn new(features: ResidueTable, labels: ResidueTable) -> Self {
        Self {
            features: features.lookup(),
            labels: labels.lookup(),
        }
    }

    pub fn from_config(config: &EncodingConfig) -> Result<Self> {
        Ok(Self::new(
            ResidueTable::from_name(&config.features)?,
            ResidueTable::from_name(&config.labels)?,
        ))
    }
}

fn column<'a>(record: &'a RawRecord, table: ResidueTable) -> Result<&'a [u8]> {
    match table.column() {
        Column::Sequence => Ok(&record.sequence),
        Column::Structure => record.structure.as_deref().ok_or_else(|| {
            FoldshardError::decode(
                &record.key,
                format!("table '{}' needs a structure column", table.name()),
            )
        }),
    }
}

impl RecordEncoder for TableEncoder {
    fn feature_channels(&self) -> usize {
        self.features.channels()
    }

    fn label_channels(&self) -> usize {
        self.labels.channels()
    }

    fn encode(&self, record: &RawRecord) -> Result<EncodedRecord> {
        let mut features = Vec::new();
        let mut labels = Vec::new();

        self.features.encode_into(
            &record.key,
            column(record, self.features.table())?,
            &mut features,
        )?;
        self.labels.encode_into(
            &record.key,
            column(record, self.labels.table())?,
            &mut labels,
        )?;

        Ok(EncodedRecord {
            key: record.key.clone(),
            positions: record.positions(),
            features,
            labels,
        })
    }

    fn feature_encoding(&self) -> &str {
        self.features.table().name()
    }

    fn label_encoding(&self) -> &str {
        self.labels.table().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }

    fn record(sequence: &str, structure: Option<&str>) -> RawRecord {
        RawRecord {
            key: "1abc_A".to_string(),
            sequence: sequence.as_bytes().to_vec(),
            structure: structure.map(|s| s.as_bytes().to_vec()),
        }
    }

    #[test]
    fn test_names_round_trip() {
        for table in ResidueTable::ALL {
            assert_eq!(ResidueTable::from_name(table.name()).unwrap(), table);
        }
        let err = ResidueTable::from_name("blosum62").unwrap_err();
        assert!(err.to_string().contains("aandx-red, jtt-p01, one-hot, q8"));
    }

    #[test]
    fn test_aandx_ambiguity_rules() {
        let lookup = ResidueTable::AandxReduced.lookup();

        assert_eq!(lookup.row(b'U'), lookup.row(b'C'));
        assert_eq!(lookup.row(b'O'), lookup.row(b'K'));
        assert!(lookup.row(b'X').unwrap().iter().all(|&v| v == 0.0));
        assert!(lookup.row(b'.').unwrap().iter().all(|&v| v == 0.0));

        // B = mean(D, N), first component.
        assert_close(lookup.row(b'B').unwrap()[0], (0.3026 + 0.2467) / 2.0);
        assert_eq!(lookup.row(b'a'), lookup.row(b'A'));
        assert!(lookup.row(b'*').is_none());
    }

    #[test]
    fn test_jtt_rows_sum_to_one() {
        let lookup = ResidueTable::JttP01.lookup();

        for &code in b"ARNDCQEGHILKMFPSTWYVUOXBJZ" {
            let sum: f32 = lookup.row(code).unwrap().iter().sum();
            assert_close(sum, 1.0);
        }
        assert_close(lookup.row(b'X').unwrap()[7], 0.05);
        assert!(lookup.row(b'.').unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_one_hot_and_q8() {
        let one_hot = ResidueTable::OneHot.lookup();
        let w = one_hot.row(b'W').unwrap();
        assert_eq!(w[17], 1.0);
        assert_eq!(w.iter().sum::<f32>(), 1.0);
        assert_close(one_hot.row(b'J').unwrap()[9], 0.5);

        let q8 = ResidueTable::SecondaryStructure.lookup();
        assert_eq!(q8.channels(), 8);
        assert_eq!(q8.row(b'-').unwrap()[7], 1.0);
        assert!(q8.row(b'X').is_none());
    }

    #[test]
    fn test_table_encoder_widths() {
        let encoder = TableEncoder::new(ResidueTable::AandxReduced, ResidueTable::SecondaryStructure);
        let encoded = encoder.encode(&record("MK.V", Some("HH-E"))).unwrap();

        assert_eq!(encoded.positions, 4);
        assert_eq!(encoded.features.len(), 4 * 11);
        assert_eq!(encoded.labels.len(), 4 * 8);
        assert!(encoded.features[22..33].iter().all(|&v| v == 0.0));
        assert_eq!(encoder.feature_encoding(), "aandx-red");
        assert_eq!(encoder.label_encoding(), "q8");
    }

    #[test]
    fn test_table_encoder_errors() {
        let encoder = TableEncoder::new(ResidueTable::JttP01, ResidueTable::SecondaryStructure);

        let err = encoder.encode(&record("MKV", None)).unwrap_err();
        assert!(err.to_string().contains("needs a structure column"));

        let err = encoder.encode(&record("MK*", Some("HHH"))).unwrap_err();
        assert!(matches!(err, FoldshardError::Decode { .. }));
        assert!(err.to_string().contains("position 2"));
    }
}
