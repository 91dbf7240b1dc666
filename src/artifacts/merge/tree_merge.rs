//! Path-wise three-way merge of trees
//!
//! Shared by `merge`, the replay steps of `rebase` and `stash apply`. Every path present in
//! any of base, ours and theirs is resolved on its own:
//!
//! - a side that left the path untouched takes the other side
//! - identical changes on both sides take either
//! - text files changed on both sides go through the line merge
//! - everything else (modify/delete, binary content, differing modes of non-files) is a
//!   conflict that keeps our version in the working tree when there is one

use crate::areas::database::Database;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::Snapshot;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::merge::content::merge_content;
use crate::artifacts::objects::blob::{Blob, is_binary};
use crate::artifacts::objects::object_id::ObjectId;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Names written into conflict markers and messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeLabels {
    pub ours: String,
    pub theirs: String,
}

impl MergeLabels {
    pub fn new(ours: impl Into<String>, theirs: impl Into<String>) -> Self {
        MergeLabels {
            ours: ours.into(),
            theirs: theirs.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    Content,
    AddAdd,
    DeletedByUs,
    DeletedByThem,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConflict {
    pub base: Option<DatabaseEntry>,
    pub ours: Option<DatabaseEntry>,
    pub theirs: Option<DatabaseEntry>,
    pub reason: ConflictReason,
    /// What the working tree holds for the path while the conflict is open
    pub worktree: Option<(Bytes, EntryMode)>,
}

impl PathConflict {
    /// `CONFLICT (...)` lines for this path, the way merge reports them
    pub fn messages(&self, path: &Path, labels: &MergeLabels) -> Vec<String> {
        let path = path.display();
        match self.reason {
            ConflictReason::Content => {
                vec![format!("CONFLICT (content): Merge conflict in {path}")]
            }
            ConflictReason::AddAdd => {
                vec![format!("CONFLICT (add/add): Merge conflict in {path}")]
            }
            ConflictReason::Binary => vec![
                format!(
                    "warning: Cannot merge binary files: {path} ({} vs. {})",
                    labels.ours, labels.theirs
                ),
                format!("CONFLICT (content): Merge conflict in {path}"),
            ],
            ConflictReason::DeletedByThem => vec![format!(
                "CONFLICT (modify/delete): {path} deleted in {} and modified in {}. \
                 Version {} of {path} left in tree.",
                labels.theirs, labels.ours, labels.ours
            )],
            ConflictReason::DeletedByUs => vec![format!(
                "CONFLICT (modify/delete): {path} deleted in {} and modified in {}. \
                 Version {} of {path} left in tree.",
                labels.ours, labels.theirs, labels.theirs
            )],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeMergeOutcome {
    /// Cleanly merged paths
    pub merged: Snapshot,
    pub conflicts: BTreeMap<PathBuf, PathConflict>,
}

impl TreeMergeOutcome {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn messages(&self, labels: &MergeLabels) -> Vec<String> {
        self.conflicts
            .iter()
            .flat_map(|(path, conflict)| conflict.messages(path, labels))
            .collect()
    }
}

pub struct TreeMerge<'r> {
    database: &'r Database,
    labels: MergeLabels,
}

impl<'r> TreeMerge<'r> {
    pub fn new(database: &'r Database, labels: MergeLabels) -> Self {
        TreeMerge { database, labels }
    }

    pub fn labels(&self) -> &MergeLabels {
        &self.labels
    }

    /// Merge tree-ish `theirs` into `ours` over `base` (`None` for unrelated histories)
    pub fn merge(
        &self,
        base: Option<&ObjectId>,
        ours: &ObjectId,
        theirs: &ObjectId,
    ) -> anyhow::Result<TreeMergeOutcome> {
        let base = self.snapshot(base)?;
        let ours = self.snapshot(Some(ours))?;
        let theirs = self.snapshot(Some(theirs))?;

        self.merge_snapshots(&base, &ours, &theirs)
    }

    fn snapshot(&self, oid: Option<&ObjectId>) -> anyhow::Result<Snapshot> {
        match oid {
            Some(oid) => {
                let tree_oid = self.database.peel_to_tree(oid)?;
                self.database.flatten_tree(Some(&tree_oid))
            }
            None => Ok(Snapshot::new()),
        }
    }

    pub fn merge_snapshots(
        &self,
        base: &Snapshot,
        ours: &Snapshot,
        theirs: &Snapshot,
    ) -> anyhow::Result<TreeMergeOutcome> {
        let paths = base
            .keys()
            .chain(ours.keys())
            .chain(theirs.keys())
            .cloned()
            .collect::<BTreeSet<_>>();
        let mut outcome = TreeMergeOutcome::default();

        for path in paths {
            let (b, o, t) = (base.get(&path), ours.get(&path), theirs.get(&path));

            let resolved = if o == t || b == t {
                Some(o.cloned())
            } else if b == o {
                Some(t.cloned())
            } else {
                None
            };

            match resolved {
                Some(Some(entry)) => {
                    outcome.merged.insert(path, entry);
                }
                Some(None) => {}
                None => self.merge_path(&path, b, o, t, &mut outcome)?,
            }
        }
        debug!(
            merged = outcome.merged.len(),
            conflicts = outcome.conflicts.len(),
            "tree merge"
        );

        Ok(outcome)
    }

    /// Both sides changed `path` differently
    fn merge_path(
        &self,
        path: &Path,
        base: Option<&DatabaseEntry>,
        ours: Option<&DatabaseEntry>,
        theirs: Option<&DatabaseEntry>,
        outcome: &mut TreeMergeOutcome,
    ) -> anyhow::Result<()> {
        let conflict = |reason, worktree| PathConflict {
            base: base.cloned(),
            ours: ours.cloned(),
            theirs: theirs.cloned(),
            reason,
            worktree,
        };

        let (ours_entry, theirs_entry) = match (ours, theirs) {
            (Some(ours_entry), Some(theirs_entry)) => (ours_entry, theirs_entry),
            (Some(survivor), None) => {
                let worktree = self.worktree_copy(survivor)?;
                outcome.conflicts.insert(
                    path.to_path_buf(),
                    conflict(ConflictReason::DeletedByThem, worktree),
                );
                return Ok(());
            }
            (None, Some(survivor)) => {
                let worktree = self.worktree_copy(survivor)?;
                outcome.conflicts.insert(
                    path.to_path_buf(),
                    conflict(ConflictReason::DeletedByUs, worktree),
                );
                return Ok(());
            }
            (None, None) => return Ok(()),
        };

        let mode = Self::merge_mode(base, ours_entry, theirs_entry);

        if !(ours_entry.mode.is_file() && theirs_entry.mode.is_file()) {
            let worktree = self.worktree_copy(ours_entry)?;
            outcome.conflicts.insert(
                path.to_path_buf(),
                conflict(ConflictReason::Binary, worktree),
            );
            return Ok(());
        }

        let ours_content = self.database.load_blob_bytes(&ours_entry.oid)?;
        let theirs_content = self.database.load_blob_bytes(&theirs_entry.oid)?;
        let base_content = match base.filter(|base| base.mode.is_file()) {
            Some(base) => self.database.load_blob_bytes(&base.oid)?,
            None => Bytes::new(),
        };

        if is_binary(&ours_content) || is_binary(&theirs_content) || is_binary(&base_content) {
            outcome.conflicts.insert(
                path.to_path_buf(),
                conflict(ConflictReason::Binary, Some((ours_content, ours_entry.mode))),
            );
            return Ok(());
        }

        let merged = merge_content(
            &base_content,
            &ours_content,
            &theirs_content,
            &self.labels.ours,
            &self.labels.theirs,
        );
        if merged.conflicted {
            let reason = match base {
                Some(_) => ConflictReason::Content,
                None => ConflictReason::AddAdd,
            };
            outcome.conflicts.insert(
                path.to_path_buf(),
                conflict(reason, Some((Bytes::from(merged.content), mode))),
            );
        } else {
            let oid = self.database.store(&Blob::from_bytes(merged.content))?;
            outcome
                .merged
                .insert(path.to_path_buf(), DatabaseEntry::new(oid, mode));
        }

        Ok(())
    }

    /// Content left in the working tree for a conflicted entry; submodules have none
    fn worktree_copy(&self, entry: &DatabaseEntry) -> anyhow::Result<Option<(Bytes, EntryMode)>> {
        match entry.mode.is_blob() {
            true => Ok(Some((self.database.load_blob_bytes(&entry.oid)?, entry.mode))),
            false => Ok(None),
        }
    }

    fn merge_mode(
        base: Option<&DatabaseEntry>,
        ours: &DatabaseEntry,
        theirs: &DatabaseEntry,
    ) -> EntryMode {
        match base {
            Some(base) if base.mode == ours.mode => theirs.mode,
            _ => ours.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::FileMode;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    struct Store {
        _dir: TempDir,
        database: Database,
    }

    impl Store {
        fn entry(&self, content: &str) -> DatabaseEntry {
            let oid = self
                .database
                .store(&Blob::from_bytes(Bytes::from(content.to_string())))
                .unwrap();
            DatabaseEntry::new(oid, EntryMode::File(FileMode::Regular))
        }

        fn snapshot(&self, files: &[(&str, &str)]) -> Snapshot {
            files
                .iter()
                .map(|(path, content)| (PathBuf::from(path), self.entry(content)))
                .collect()
        }

        fn merge(
            &self,
            base: &[(&str, &str)],
            ours: &[(&str, &str)],
            theirs: &[(&str, &str)],
        ) -> TreeMergeOutcome {
            TreeMerge::new(&self.database, MergeLabels::new("HEAD", "topic"))
                .merge_snapshots(&self.snapshot(base), &self.snapshot(ours), &self.snapshot(theirs))
                .unwrap()
        }
    }

    #[fixture]
    fn store() -> Store {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().join("objects").into_boxed_path());
        Store {
            _dir: dir,
            database,
        }
    }

    #[rstest]
    fn one_sided_changes_merge_cleanly(store: Store) {
        let outcome = store.merge(
            &[("a.txt", "a\n"), ("b.txt", "b\n"), ("gone.txt", "x\n")],
            &[("a.txt", "A\n"), ("b.txt", "b\n"), ("gone.txt", "x\n")],
            &[("a.txt", "a\n"), ("b.txt", "b\n"), ("new.txt", "n\n")],
        );

        assert!(outcome.is_clean());
        assert_eq!(
            outcome.merged,
            store.snapshot(&[("a.txt", "A\n"), ("b.txt", "b\n"), ("new.txt", "n\n")])
        );
    }

    #[rstest]
    fn overlapping_edits_conflict_with_markers(store: Store) {
        let outcome = store.merge(
            &[("f.txt", "one\n")],
            &[("f.txt", "ours\n")],
            &[("f.txt", "theirs\n")],
        );

        let conflict = &outcome.conflicts[Path::new("f.txt")];
        assert_eq!(conflict.reason, ConflictReason::Content);
        assert_eq!(
            conflict.worktree.as_ref().map(|(content, _)| content.clone()),
            Some(Bytes::from_static(
                b"<<<<<<< HEAD\nours\n=======\ntheirs\n>>>>>>> topic\n"
            ))
        );
        assert_eq!(
            outcome.messages(&MergeLabels::new("HEAD", "topic")),
            vec!["CONFLICT (content): Merge conflict in f.txt".to_string()]
        );
    }

    #[rstest]
    fn modify_delete_keeps_the_survivor(store: Store) {
        let outcome = store.merge(
            &[("f.txt", "one\n")],
            &[("f.txt", "changed\n")],
            &[],
        );

        let conflict = &outcome.conflicts[Path::new("f.txt")];
        assert_eq!(conflict.reason, ConflictReason::DeletedByThem);
        assert_eq!(conflict.theirs, None);
        assert_eq!(
            conflict.worktree.as_ref().map(|(content, _)| content.clone()),
            Some(Bytes::from_static(b"changed\n"))
        );
    }

    #[rstest]
    fn binary_conflicts_keep_ours(store: Store) {
        let outcome = store.merge(
            &[("bin", "a\0")],
            &[("bin", "b\0")],
            &[("bin", "c\0")],
        );

        let conflict = &outcome.conflicts[Path::new("bin")];
        assert_eq!(conflict.reason, ConflictReason::Binary);
        assert_eq!(
            conflict.worktree.as_ref().map(|(content, _)| content.clone()),
            Some(Bytes::from_static(b"b\0"))
        );
    }
}
