// rust/foldshard-core/src/split/mod.rs

//! Group-aware train/validate/test splitting.
//!
//! Groups (clusters of similar records) are the unit of assignment: the
//! group list is canonicalized, shuffled once with a seeded ChaCha stream and
//! cut at `floor(N * train)` and `floor(N * (train + validate))`. Each split
//! is then flattened to record ids and shuffled again on its own stream.
//!
//! Ratios are targets on group count. Realized proportions are reported in
//! record counts and may drift when group sizes are skewed.

mod assignment;
mod groups;

pub use assignment::{read_assignment, write_assignment};
pub use groups::{load_groups, parse_groups, validate_coverage, Group};

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FoldshardError, Result};
use crate::index::RecordId;

/// Ratios must sum to 1.0 within this tolerance.
pub const RATIO_TOLERANCE: f64 = 1e-10;

/// One of the three disjoint output subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    Train,
    Validate,
    Test,
}

impl SplitKind {
    pub const ALL: [SplitKind; 3] = [SplitKind::Train, SplitKind::Validate, SplitKind::Test];

    pub fn name(&self) -> &'static str {
        match self {
            SplitKind::Train => "train",
            SplitKind::Validate => "validate",
            SplitKind::Test => "test",
        }
    }

    fn position(&self) -> usize {
        match self {
            SplitKind::Train => 0,
            SplitKind::Validate => 1,
            SplitKind::Test => 2,
        }
    }
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SplitKind {
    type Err = FoldshardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                FoldshardError::config(format!(
                    "unknown split '{s}'. Expected 'train', 'validate', or 'test'"
                ))
            })
    }
}

/// Target proportions of groups per split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    pub train: f64,
    pub validate: f64,
    pub test: f64,
}

impl SplitRatios {
    pub fn new(train: f64, validate: f64, test: f64) -> Self {
        Self {
            train,
            validate,
            test,
        }
    }

    pub fn get(&self, kind: SplitKind) -> f64 {
        match kind {
            SplitKind::Train => self.train,
            SplitKind::Validate => self.validate,
            SplitKind::Test => self.test,
        }
    }

    pub fn sum(&self) -> f64 {
        self.train + self.validate + self.test
    }

    /// Rescales non-negative weights so they sum to 1.0.
    pub fn normalized(&self) -> Result<Self> {
        self.check_components()?;
        let sum = self.sum();
        if sum <= 0.0 {
            return Err(FoldshardError::config(
                "split ratios must not all be zero",
            ));
        }
        Ok(Self::new(self.train / sum, self.validate / sum, self.test / sum))
    }

    /// Checks the ratios are usable as-is by [`split`].
    pub fn check(&self) -> Result<()> {
        self.check_components()?;
        let sum = self.sum();
        if (sum - 1.0).abs() > RATIO_TOLERANCE {
            return Err(FoldshardError::config(format!(
                "split ratios must sum to 1.0, got {sum} ({}/{}/{})",
                self.train, self.validate, self.test
            )));
        }
        Ok(())
    }

    fn check_components(&self) -> Result<()> {
        for kind in SplitKind::ALL {
            let ratio = self.get(kind);
            if !ratio.is_finite() || ratio < 0.0 {
                return Err(FoldshardError::config(format!(
                    "{kind} ratio must be a non-negative number, got {ratio}"
                )));
            }
        }
        Ok(())
    }
}

/// Record ids per split, in their final (shuffled) order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitAssignment {
    pub train: Vec<RecordId>,
    pub validate: Vec<RecordId>,
    pub test: Vec<RecordId>,
}

impl SplitAssignment {
    pub fn get(&self, kind: SplitKind) -> &[RecordId] {
        match kind {
            SplitKind::Train => &self.train,
            SplitKind::Validate => &self.validate,
            SplitKind::Test => &self.test,
        }
    }

    fn get_mut(&mut self, kind: SplitKind) -> &mut Vec<RecordId> {
        match kind {
            SplitKind::Train => &mut self.train,
            SplitKind::Validate => &mut self.validate,
            SplitKind::Test => &mut self.test,
        }
    }

    /// Total records across all three splits.
    pub fn len(&self) -> usize {
        self.train.len() + self.validate.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Realized record-count proportions against the target ratios.
    pub fn report(&self, ratios: &SplitRatios) -> SplitReport {
        let total = self.len();
        let entries = SplitKind::ALL.map(|kind| {
            let records = self.get(kind).len();
            SplitReportEntry {
                kind,
                records,
                fraction: if total == 0 {
                    0.0
                } else {
                    records as f64 / total as f64
                },
                target: ratios.get(kind),
            }
        });
        SplitReport { total, entries }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitReportEntry {
    pub kind: SplitKind,
    pub records: usize,
    /// Share of all records that landed in this split.
    pub fraction: f64,
    /// Target share of groups.
    pub target: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitReport {
    pub total: usize,
    pub entries: [SplitReportEntry; 3],
}

impl SplitReport {
    pub fn log(&self) {
        for entry in &self.entries {
            info!(
                split = %entry.kind,
                records = entry.records,
                fraction = entry.fraction,
                target = entry.target,
                "Realized split proportion"
            );
        }
    }
}

impl fmt::Display for SplitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} records", self.total)?;
        for entry in &self.entries {
            writeln!(
                f,
                "  {:<8} {:>10}  {:>7.3}% (target {:.3}%)",
                entry.kind.name(),
                entry.records,
                entry.fraction * 100.0,
                entry.target * 100.0
            )?;
        }
        Ok(())
    }
}

/// Splits groups into train/validate/test record id sequences.
///
/// The result depends only on the group contents, `seed` and `ratios`,
/// never on the order the groups are given in.
pub fn split(groups: &[Group], seed: u64, ratios: &SplitRatios) -> Result<SplitAssignment> {
    ratios.check()?;

    let n = groups.len();
    if n < 3 {
        return Err(FoldshardError::InsufficientGroups { found: n });
    }

    // Sorted members; groups ordered by their smallest id.
    let mut canonical: Vec<Group> = groups
        .iter()
        .map(|group| {
            let mut members = group.clone();
            members.sort_unstable();
            members
        })
        .collect();
    canonical.sort_unstable();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    canonical.shuffle(&mut rng);

    let idx1 = ((n as f64 * ratios.train).floor() as usize).min(n);
    let idx2 = ((n as f64 * (ratios.train + ratios.validate)).floor() as usize).clamp(idx1, n);
    let slices = [&canonical[..idx1], &canonical[idx1..idx2], &canonical[idx2..]];

    let mut assignment = SplitAssignment::default();
    for kind in SplitKind::ALL {
        let slice = slices[kind.position()];
        let ids = assignment.get_mut(kind);
        ids.extend(slice.iter().flatten().copied());

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(kind.position() as u64 + 1);
        ids.shuffle(&mut rng);

        if ids.is_empty() {
            warn!(split = %kind, groups = n, "Split received no records");
        }
        info!(
            split = %kind,
            groups = slice.len(),
            records = ids.len(),
            "Assigned groups to split"
        );
    }

    Ok(assignment)
}
