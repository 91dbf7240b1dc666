//! Rename detection
//!
//! Deleted and added paths are paired in two passes: identical object ids first, then the
//! best remaining content similarity at or above the threshold.

use crate::artifacts::diff::hunk::split_lines;
use crate::artifacts::objects::object_id::ObjectId;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

/// Minimum similarity (percent) for a pair to count as a rename
pub const DEFAULT_RENAME_THRESHOLD: u8 = 50;

/// Similarity of two contents in `0.0..=1.0`, over their multisets of lines.
///
/// Twice the number of shared lines divided by the total line count; two empty contents are
/// identical.
pub fn similarity(a: &[u8], b: &[u8]) -> f64 {
    let a_lines = split_lines(a);
    let b_lines = split_lines(b);
    let total = a_lines.len() + b_lines.len();
    if total == 0 {
        return 1.0;
    }

    let mut counts = HashMap::<&[u8], usize>::new();
    for line in a_lines {
        *counts.entry(line).or_default() += 1;
    }

    let shared = b_lines
        .into_iter()
        .filter(|line| match counts.get_mut(line) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        })
        .count();

    (2 * shared) as f64 / total as f64
}

/// Similarity as a whole percentage, rounded down like git's score
pub fn similarity_percent(a: &[u8], b: &[u8]) -> u8 {
    (similarity(a, b) * 100.0).floor().clamp(0.0, 100.0) as u8
}

/// One side of a rename candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameCandidate {
    pub path: PathBuf,
    pub oid: ObjectId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePair {
    pub from: PathBuf,
    pub to: PathBuf,
    /// Percent
    pub score: u8,
}

/// Pair deletions with additions.
///
/// `load` fetches the content of a candidate for the similarity pass; it is only called for
/// candidates left over after exact matching.
pub fn detect_renames(
    deleted: &[RenameCandidate],
    added: &[RenameCandidate],
    threshold: u8,
    mut load: impl FnMut(&RenameCandidate) -> anyhow::Result<Vec<u8>>,
) -> anyhow::Result<Vec<RenamePair>> {
    let mut pairs = Vec::new();
    let mut used_deleted = BTreeSet::new();
    let mut used_added = BTreeSet::new();

    for (j, addition) in added.iter().enumerate() {
        if let Some((i, deletion)) = deleted
            .iter()
            .enumerate()
            .find(|(i, deletion)| !used_deleted.contains(i) && deletion.oid == addition.oid)
        {
            used_deleted.insert(i);
            used_added.insert(j);
            pairs.push(RenamePair {
                from: deletion.path.clone(),
                to: addition.path.clone(),
                score: 100,
            });
        }
    }

    let remaining_deleted = deleted
        .iter()
        .enumerate()
        .filter(|(i, _)| !used_deleted.contains(i))
        .map(|(i, candidate)| Ok((i, load(candidate)?)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let remaining_added = added
        .iter()
        .enumerate()
        .filter(|(j, _)| !used_added.contains(j))
        .map(|(j, candidate)| Ok((j, load(candidate)?)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut scored = Vec::new();
    for (i, old) in &remaining_deleted {
        for (j, new) in &remaining_added {
            let score = similarity_percent(old, new);
            if score >= threshold {
                scored.push((score, *i, *j));
            }
        }
    }
    // best score first, then path order for determinism
    scored.sort_by(|(sa, ia, ja), (sb, ib, jb)| {
        sb.cmp(sa)
            .then_with(|| deleted[*ia].path.cmp(&deleted[*ib].path))
            .then_with(|| added[*ja].path.cmp(&added[*jb].path))
    });

    for (score, i, j) in scored {
        if used_deleted.contains(&i) || used_added.contains(&j) {
            continue;
        }
        used_deleted.insert(i);
        used_added.insert(j);
        pairs.push(RenamePair {
            from: deleted[i].path.clone(),
            to: added[j].path.clone(),
            score,
        });
    }

    pairs.sort_by(|a, b| a.to.cmp(&b.to));
    Ok(pairs)
}
