// rust/foldshard-core/src/split/groups.rs

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::{FoldshardError, Result};
use crate::index::{RecordId, RecordIndex};
use crate::storage::{read_text, StorageBackend};

/// Record ids of one cluster.
pub type Group = Vec<RecordId>;

/// Loads the cluster membership file: one group per line, member keys
/// separated by commas and/or whitespace, `#` comments.
pub fn load_groups(
    storage: &dyn StorageBackend,
    path: &Path,
    index: &RecordIndex,
) -> Result<Vec<Group>> {
    let content = read_text(storage, path)?;
    let groups = parse_groups(path, &content, index)?;

    let largest = groups.iter().map(Vec::len).max().unwrap_or(0);
    info!(
        path = %path.display(),
        groups = groups.len(),
        largest,
        "Loaded cluster groups"
    );
    Ok(groups)
}

/// Parses cluster file content, resolving keys through `index`.
pub fn parse_groups(path: &Path, content: &str, index: &RecordIndex) -> Result<Vec<Group>> {
    let mut groups = Vec::new();
    let mut first_line: HashMap<RecordId, usize> = HashMap::new();
    let mut unknown = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut group = Group::new();
        for key in line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|k| !k.is_empty())
        {
            let Some(id) = index.id_of(key) else {
                unknown.push(key.to_string());
                continue;
            };

            if let Some(&first) = first_line.get(&id) {
                return Err(FoldshardError::duplicate_id(
                    key,
                    format!("{} line {first}", path.display()),
                    format!("{} line {line_no}", path.display()),
                ));
            }
            first_line.insert(id, line_no);
            group.push(id);
        }

        if !group.is_empty() {
            groups.push(group);
        }
    }

    if !unknown.is_empty() {
        let covered = |id: RecordId| first_line.contains_key(&id);
        return Err(FoldshardError::IndexMismatch {
            missing_from_index: unknown,
            missing_from_groups: uncovered_keys(index, covered),
        });
    }

    Ok(groups)
}

/// Checks every index id is in exactly one group and every group member
/// is a valid id.
pub fn validate_coverage(groups: &[Group], index: &RecordIndex) -> Result<()> {
    let mut owner: Vec<Option<usize>> = vec![None; index.len()];
    let mut out_of_range = Vec::new();

    for (g, group) in groups.iter().enumerate() {
        for &id in group {
            match owner.get_mut(id as usize) {
                None => out_of_range.push(id.to_string()),
                Some(Some(first)) => {
                    let key = index.key(id).unwrap_or_default();
                    return Err(FoldshardError::duplicate_id(
                        key,
                        format!("group {}", *first),
                        format!("group {g}"),
                    ));
                }
                Some(slot) => *slot = Some(g),
            }
        }
    }

    let orphans = uncovered_keys(index, |id| owner[id as usize].is_some());
    if !out_of_range.is_empty() || !orphans.is_empty() {
        return Err(FoldshardError::IndexMismatch {
            missing_from_index: out_of_range,
            missing_from_groups: orphans,
        });
    }

    Ok(())
}

fn uncovered_keys(index: &RecordIndex, covered: impl Fn(RecordId) -> bool) -> Vec<String> {
    (0..index.len() as RecordId)
        .filter(|&id| !covered(id))
        .filter_map(|id| index.key(id).map(str::to_string))
        .collect()
}
