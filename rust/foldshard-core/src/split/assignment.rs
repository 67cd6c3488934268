// rust/foldshard-core/src/split/assignment.rs

//! Split assignment file.
//!
//! ```text
//! #train
//! 1abc_A
//! 2xyz_B
//! #validate
//! 3def_C
//! #test
//! 4ghi_D
//! ```
//!
//! Keys keep their shuffled order, so writing shards from a reloaded
//! assignment produces the same output as writing right after the split.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use tracing::info;

use super::{SplitAssignment, SplitKind};
use crate::error::{FoldshardError, Result};
use crate::index::{RecordId, RecordIndex};
use crate::storage::{read_text, write_atomic, StorageBackend};

/// Writes `assignment` as keys, atomically.
pub fn write_assignment(
    storage: &dyn StorageBackend,
    path: &Path,
    assignment: &SplitAssignment,
    index: &RecordIndex,
) -> Result<()> {
    let mut out = String::new();
    for kind in SplitKind::ALL {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "#{kind}");
        for &id in assignment.get(kind) {
            let key = index.key(id).ok_or_else(|| FoldshardError::IndexMismatch {
                missing_from_index: vec![id.to_string()],
                missing_from_groups: Vec::new(),
            })?;
            out.push_str(key);
            out.push('\n');
        }
    }

    write_atomic(storage, path, out.as_bytes())?;
    info!(
        path = %path.display(),
        records = assignment.len(),
        "Wrote split assignment"
    );
    Ok(())
}

/// Reads an assignment file back, resolving keys through `index`.
///
/// Every index key must appear in exactly one section.
pub fn read_assignment(
    storage: &dyn StorageBackend,
    path: &Path,
    index: &RecordIndex,
) -> Result<SplitAssignment> {
    let content = read_text(storage, path)?;

    let mut assignment = SplitAssignment::default();
    let mut current: Option<SplitKind> = None;
    let mut seen_sections: Vec<SplitKind> = Vec::new();
    let mut placed: HashMap<RecordId, (SplitKind, usize)> = HashMap::new();
    let mut unknown = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(marker) = line.strip_prefix('#') {
            let kind: SplitKind = marker.trim().parse().map_err(|_| {
                FoldshardError::malformed_assignment(
                    path,
                    line_no,
                    format!("unknown section marker '{line}'"),
                )
            })?;
            if seen_sections.contains(&kind) {
                return Err(FoldshardError::malformed_assignment(
                    path,
                    line_no,
                    format!("section '#{kind}' appears twice"),
                ));
            }
            seen_sections.push(kind);
            current = Some(kind);
            continue;
        }

        let Some(kind) = current else {
            return Err(FoldshardError::malformed_assignment(
                path,
                line_no,
                format!("record '{line}' appears before any section header"),
            ));
        };

        let Some(id) = index.id_of(line) else {
            unknown.push(line.to_string());
            continue;
        };

        if let Some(&(first_kind, first_line)) = placed.get(&id) {
            return Err(FoldshardError::duplicate_id(
                line,
                format!("#{first_kind} line {first_line}"),
                format!("#{kind} line {line_no}"),
            ));
        }
        placed.insert(id, (kind, line_no));
        assignment.get_mut(kind).push(id);
    }

    let orphans: Vec<String> = (0..index.len() as RecordId)
        .filter(|id| !placed.contains_key(id))
        .filter_map(|id| index.key(id).map(str::to_string))
        .collect();
    if !unknown.is_empty() || !orphans.is_empty() {
        return Err(FoldshardError::IndexMismatch {
            missing_from_index: unknown,
            missing_from_groups: orphans,
        });
    }

    info!(
        path = %path.display(),
        train = assignment.train.len(),
        validate = assignment.validate.len(),
        test = assignment.test.len(),
        "Read split assignment"
    );
    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::index::RecordLocation;
    use crate::storage::LocalStorage;
    use std::io::Write;
    use tempfile::TempDir;

    fn setup() -> (LocalStorage, RecordIndex, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(&StorageConfig {
            base_path: temp.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();
        let index = RecordIndex::from_entries((0..6).map(|i| {
            (
                format!("rec{i}"),
                RecordLocation {
                    file: 0,
                    offset: i * 10,
                    length: None,
                },
            )
        }))
        .unwrap();
        (storage, index, temp)
    }

    fn put(storage: &LocalStorage, content: &str) -> &'static Path {
        let path = Path::new("split_assignment.txt");
        let mut writer = storage.open_write(path).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_write_then_read_preserves_order() {
        let (storage, index, _temp) = setup();
        let assignment = SplitAssignment {
            train: vec![4, 0, 2],
            validate: vec![5],
            test: vec![3, 1],
        };
        let path = Path::new("out/split_assignment.txt");

        write_assignment(&storage, path, &assignment, &index).unwrap();
        let text = read_text(&storage, path).unwrap();
        assert!(text.starts_with("#train\nrec4\nrec0\nrec2\n#validate\nrec5\n"));

        let reloaded = read_assignment(&storage, path, &index).unwrap();
        assert_eq!(reloaded, assignment);
    }

    #[test]
    fn test_empty_section_is_allowed() {
        let (storage, index, _temp) = setup();
        let path = put(&storage, "#train\nrec0\nrec1\nrec2\nrec3\nrec4\nrec5\n#validate\n#test\n");

        let assignment = read_assignment(&storage, path, &index).unwrap();
        assert_eq!(assignment.train.len(), 6);
        assert!(assignment.validate.is_empty());
    }

    #[test]
    fn test_record_before_header() {
        let (storage, index, _temp) = setup();
        let path = put(&storage, "rec0\n#train\n");

        let err = read_assignment(&storage, path, &index).unwrap_err();
        assert!(matches!(err, FoldshardError::MalformedAssignment { line: 1, .. }));
    }

    #[test]
    fn test_unknown_and_repeated_sections() {
        let (storage, index, _temp) = setup();

        let path = put(&storage, "#train\nrec0\n#holdout\nrec1\n");
        let err = read_assignment(&storage, path, &index).unwrap_err();
        assert!(err.to_string().contains("#holdout"));

        let path = put(&storage, "#train\nrec0\n#test\nrec1\n#train\n");
        let err = read_assignment(&storage, path, &index).unwrap_err();
        assert!(matches!(err, FoldshardError::MalformedAssignment { line: 5, .. }));
    }

    #[test]
    fn test_key_in_two_sections() {
        let (storage, index, _temp) = setup();
        let path = put(&storage, "#train\nrec0\nrec1\n#test\nrec1\n");

        let err = read_assignment(&storage, path, &index).unwrap_err();
        match err {
            FoldshardError::DuplicateId { key, first, second } => {
                assert_eq!(key, "rec1");
                assert_eq!(first, "#train line 3");
                assert_eq!(second, "#test line 5");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_and_unknown_keys() {
        let (storage, index, _temp) = setup();
        let path = put(&storage, "#train\nrec0\nrec1\nrec9\n#validate\nrec2\n#test\nrec3\n");

        let err = read_assignment(&storage, path, &index).unwrap_err();
        match err {
            FoldshardError::IndexMismatch {
                missing_from_index,
                missing_from_groups,
            } => {
                assert_eq!(missing_from_index, vec!["rec9"]);
                assert_eq!(missing_from_groups, vec!["rec4", "rec5"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
