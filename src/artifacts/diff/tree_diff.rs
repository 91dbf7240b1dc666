//! Path-level comparison of trees and flattened snapshots

use crate::areas::database::Database;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::log::path_filter::PathFilter;
use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct DiffFilter: u32 {
        const ADDED = 0b00001;
        const DELETED = 0b00010;
        const MODIFIED = 0b00100;
        const RENAMED = 0b01000;
        const TYPE_CHANGED = 0b10000;
    }
}

impl DiffFilter {
    /// Parse `--diff-filter` letters; lowercase letters exclude instead of include
    pub fn try_parse(s: &str) -> Option<Self> {
        let mut include = Self::empty();
        let mut exclude = Self::empty();

        for c in s.chars() {
            let flag = match c.to_ascii_uppercase() {
                'A' => Self::ADDED,
                'D' => Self::DELETED,
                'M' => Self::MODIFIED,
                'R' => Self::RENAMED,
                'T' => Self::TYPE_CHANGED,
                _ => return None,
            };
            match c.is_ascii_uppercase() {
                true => include |= flag,
                false => exclude |= flag,
            }
        }

        if include.is_empty() {
            include = Self::all();
        }
        Some(include - exclude)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeChangeType {
    Added(DatabaseEntry),
    Deleted(DatabaseEntry),
    Modified {
        old: DatabaseEntry,
        new: DatabaseEntry,
    },
}

impl TreeChangeType {
    pub fn from_entries(old: Option<DatabaseEntry>, new: Option<DatabaseEntry>) -> Option<Self> {
        match (old, new) {
            (None, Some(new)) => Some(TreeChangeType::Added(new)),
            (Some(old), None) => Some(TreeChangeType::Deleted(old)),
            (Some(old), Some(new)) if old != new => Some(TreeChangeType::Modified { old, new }),
            _ => None,
        }
    }

    pub fn old_entry(&self) -> Option<&DatabaseEntry> {
        match self {
            TreeChangeType::Deleted(entry) => Some(entry),
            TreeChangeType::Modified { old, .. } => Some(old),
            TreeChangeType::Added(_) => None,
        }
    }

    pub fn new_entry(&self) -> Option<&DatabaseEntry> {
        match self {
            TreeChangeType::Added(entry) => Some(entry),
            TreeChangeType::Modified { new, .. } => Some(new),
            TreeChangeType::Deleted(_) => None,
        }
    }

    pub fn is_type_change(&self) -> bool {
        matches!(self, TreeChangeType::Modified { old, new } if old.mode.is_type_change(&new.mode))
    }
}

pub type ChangeSet = BTreeMap<PathBuf, TreeChangeType>;
pub type TreeEntryMap = BTreeMap<String, DatabaseEntry>;
/// Flattened view of a tree-like source: every file path and its blob
pub type Snapshot = BTreeMap<PathBuf, DatabaseEntry>;

/// Compare two flattened snapshots, restricted by `filter`
pub fn diff_snapshots(old: &Snapshot, new: &Snapshot, filter: &PathFilter) -> ChangeSet {
    old.keys()
        .chain(new.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|path| filter.matches(path))
        .filter_map(|path| {
            TreeChangeType::from_entries(old.get(path).cloned(), new.get(path).cloned())
                .map(|change| (path.clone(), change))
        })
        .collect()
}

/// Recursive tree comparison that skips identical subtrees without loading them
#[derive(Debug)]
pub struct TreeDiff<'r> {
    database: &'r Database,
    change_set: ChangeSet,
}

impl<'r> TreeDiff<'r> {
    pub fn new(database: &'r Database) -> Self {
        TreeDiff {
            database,
            change_set: BTreeMap::new(),
        }
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.change_set
    }

    pub fn into_changes(self) -> ChangeSet {
        self.change_set
    }

    pub fn get_entries(&self, path: &Path) -> (Option<&DatabaseEntry>, Option<&DatabaseEntry>) {
        if let Some(change) = self.change_set.get(path) {
            (change.old_entry(), change.new_entry())
        } else {
            (None, None)
        }
    }

    /// Compare two trees (or commits, which are peeled to their tree)
    pub fn compare_oids(
        &mut self,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
        filter: &PathFilter,
    ) -> anyhow::Result<()> {
        if old == new {
            return Ok(());
        }

        let old_tree_entries = self.inflate_oid_to_tree_entries(old)?;
        let new_tree_entries = self.inflate_oid_to_tree_entries(new)?;

        self.detect_deletions(&old_tree_entries, &new_tree_entries, filter)?;
        self.detect_additions(&old_tree_entries, &new_tree_entries, filter)?;

        Ok(())
    }

    fn inflate_oid_to_tree_entries(&self, oid: Option<&ObjectId>) -> anyhow::Result<TreeEntryMap> {
        match oid {
            None => Ok(BTreeMap::new()),
            Some(oid) => {
                let tree_oid = self.database.peel_to_tree(oid)?;
                let tree = self
                    .database
                    .parse_object_as_tree(&tree_oid)?
                    .ok_or_else(|| anyhow::anyhow!("Invalid tree object {tree_oid}"))?;

                Ok(tree.into_entries().collect::<BTreeMap<_, _>>())
            }
        }
    }

    fn detect_deletions(
        &mut self,
        old: &TreeEntryMap,
        new: &TreeEntryMap,
        filter: &PathFilter,
    ) -> anyhow::Result<()> {
        for (name, entry) in filter.filter_matching_entries(old.iter()) {
            let sub_filter = filter.clone().into_subpath_filter(name);
            let path = sub_filter.path().to_path_buf();
            let other = new.get(name);

            if other == Some(entry) {
                continue;
            }

            let tree_a_oid = entry.is_tree().then_some(&entry.oid);
            let tree_b_oid = other.filter(|other| other.is_tree()).map(|other| &other.oid);

            if tree_a_oid.is_some() || tree_b_oid.is_some() {
                self.compare_oids(tree_a_oid, tree_b_oid, &sub_filter)?;
            }

            let blob_a = (!entry.is_tree()).then(|| entry.clone());
            let blob_b = other.filter(|other| !other.is_tree()).cloned();

            if let Some(change_type) = TreeChangeType::from_entries(blob_a, blob_b) {
                self.change_set.insert(path, change_type);
            }
        }

        Ok(())
    }

    fn detect_additions(
        &mut self,
        old: &TreeEntryMap,
        new: &TreeEntryMap,
        filter: &PathFilter,
    ) -> anyhow::Result<()> {
        for (name, entry) in filter.filter_matching_entries(new.iter()) {
            if old.contains_key(name) {
                continue;
            }

            let sub_filter = filter.clone().into_subpath_filter(name);
            if entry.is_tree() {
                self.compare_oids(None, Some(&entry.oid), &sub_filter)?;
            } else {
                self.change_set.insert(
                    sub_filter.path().to_path_buf(),
                    TreeChangeType::Added(entry.clone()),
                );
            }
        }

        Ok(())
    }
}
