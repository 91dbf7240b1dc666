//! Working tree migration between two trees
//!
//! A migration takes the path-level changes from the current tree to a target tree and
//! carries them into the working tree and the index:
//!
//! 1. Every change is checked against local state (index and working tree)
//! 2. File system actions and directory creations/removals are planned
//! 3. The workspace applies the plan, then the index is updated
//!
//! ## Conflict Detection
//!
//! - Stale files: the index or working tree copy differs from both trees
//! - Stale directories: a directory holding untracked files is in the way of a file
//! - Untracked overwrites: an untracked file would be replaced
//! - Untracked removals: an untracked file would be deleted
//!
//! Ignored files are expendable and never block a migration. All conflicts are collected
//! before anything is touched, and a forced migration skips the checks.

use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::checkout::conflict::{ConflictMessage, ConflictType};
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::{ChangeSet, TreeChangeType};
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::ignore::IgnoreRules;
use crate::artifacts::status::inspector::{Inspector, WorkspaceCheck};
use crate::errors::RepositoryError;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Type of file system action required for checkout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// Create new file
    Add,
    /// Delete file
    Delete,
    /// Modify existing file
    Modify,
}

/// Set of planned actions grouped by type
pub type ActionsSet = HashMap<ActionType, Vec<(PathBuf, Option<DatabaseEntry>)>>;

/// Set of detected conflicts grouped by type
pub type ConflictsSet = BTreeMap<ConflictType, BTreeSet<PathBuf>>;

pub struct Migration<'r> {
    repository: &'r Repository,
    index: &'r mut Index,
    changes: ChangeSet,
    /// Paths checked for local changes without being part of the tree update
    guards: ChangeSet,
    inspector: Inspector<'r>,
    /// Command named in conflict messages
    operation: &'static str,
    force: bool,
    actions: ActionsSet,
    conflicts: ConflictsSet,
    mkdirs: BTreeSet<PathBuf>,
    rmdirs: BTreeSet<PathBuf>,
}

impl<'r> Migration<'r> {
    pub fn new(
        repository: &'r Repository,
        index: &'r mut Index,
        ignore: &'r IgnoreRules,
        changes: ChangeSet,
    ) -> Self {
        let actions = HashMap::from([
            (ActionType::Add, Vec::new()),
            (ActionType::Delete, Vec::new()),
            (ActionType::Modify, Vec::new()),
        ]);

        Self {
            repository,
            index,
            changes,
            guards: ChangeSet::new(),
            inspector: Inspector::new(repository.workspace(), ignore),
            operation: "checkout",
            force: false,
            actions,
            conflicts: ConflictsSet::new(),
            mkdirs: BTreeSet::new(),
            rmdirs: BTreeSet::new(),
        }
    }

    pub fn for_operation(mut self, operation: &'static str) -> Self {
        self.operation = operation;
        self
    }

    /// Skip local-change checks and overwrite whatever is in the way
    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Also refuse to run when local changes sit on `guards`, paths a caller will rewrite
    /// itself after the migration
    pub fn protect(mut self, guards: ChangeSet) -> Self {
        self.guards = guards;
        self
    }

    pub fn actions(&self) -> &ActionsSet {
        &self.actions
    }

    pub fn mkdirs(&self) -> &BTreeSet<PathBuf> {
        &self.mkdirs
    }

    pub fn rmdirs(&self) -> &BTreeSet<PathBuf> {
        &self.rmdirs
    }

    pub fn apply_changes(&mut self) -> anyhow::Result<()> {
        self.plan_changes()?;
        self.update_workspace()?;
        self.update_index()?;
        debug!(
            operation = self.operation,
            changes = self.changes.len(),
            "migration applied"
        );

        Ok(())
    }

    /// Only run the conflict checks, for callers that update the tree themselves
    pub fn check_only(&mut self) -> anyhow::Result<()> {
        self.plan_changes()
    }

    fn plan_changes(&mut self) -> anyhow::Result<()> {
        let changes = std::mem::take(&mut self.changes);

        for (path, change) in &changes {
            if !self.force {
                self.check_for_conflict(path, change)?;
            }
            self.record_change(path, change);
        }
        self.changes = changes;

        if !self.force {
            let guards = std::mem::take(&mut self.guards);
            for (path, change) in &guards {
                self.check_for_conflict(path, change)?;
            }
            self.guards = guards;
        }

        if !self.conflicts.is_empty() {
            Err(RepositoryError::WorkingTreeConflict(self.conflict_report()))?;
        }

        Ok(())
    }

    fn conflict_report(&self) -> String {
        let sections = self
            .conflicts
            .iter()
            .map(|(conflict_type, paths)| {
                let paths = paths
                    .iter()
                    .map(|path| format!("\t{}", path.display()))
                    .collect::<Vec<String>>()
                    .join("\n");
                let ConflictMessage { header, footer } =
                    ConflictMessage::new(conflict_type, self.operation);

                match footer.is_empty() {
                    true => format!("{header}\n{paths}"),
                    false => format!("{header}\n{paths}\n{footer}"),
                }
            })
            .collect::<Vec<_>>()
            .join("\nerror: ");

        format!("{sections}\nAborting")
    }

    fn add_conflict(&mut self, conflict_type: ConflictType, path: PathBuf) {
        self.conflicts.entry(conflict_type).or_default().insert(path);
    }

    fn check_for_conflict(&mut self, path: &Path, change: &TreeChangeType) -> anyhow::Result<()> {
        let entry = self.index.entry_by_path(path).cloned();
        let entry = entry.as_ref();
        let (old_entry, new_entry) = (change.old_entry(), change.new_entry());

        if self.index_differs_from_trees(entry, old_entry, new_entry) {
            self.add_conflict(ConflictType::StaleFile, path.to_path_buf());
            return Ok(());
        }

        let stat = self.repository.workspace().try_stat_file(path)?;
        let conflict_type = ConflictType::get_conflict_type(stat.as_ref(), entry, new_entry);

        match stat {
            Some(stat) if stat.mode.is_tree() => {
                if self.inspector.untracked_path(path, &*self.index)?.is_some() {
                    self.add_conflict(conflict_type, path.to_path_buf());
                }
            }
            Some(stat) => match entry {
                Some(entry) => {
                    let check = self.inspector.check_index_against_workspace(entry, Some(&stat))?;
                    // a working copy that already matches the target is not in the way
                    if matches!(check, WorkspaceCheck::Changed(_))
                        && !self.matches_target(path, new_entry)?
                    {
                        self.add_conflict(conflict_type, path.to_path_buf());
                    }
                }
                None => {
                    if self.inspector.untracked_path(path, &*self.index)?.is_some()
                        && !self.matches_target(path, new_entry)?
                    {
                        self.add_conflict(conflict_type, path.to_path_buf());
                    }
                }
            },
            None => {
                if let Some(parent) = self.untracked_parent(path)? {
                    let blocked = match entry {
                        Some(_) => path.to_path_buf(),
                        None => parent,
                    };
                    self.add_conflict(conflict_type, blocked);
                }
            }
        }

        Ok(())
    }

    fn matches_target(
        &self,
        path: &Path,
        new_entry: Option<&DatabaseEntry>,
    ) -> anyhow::Result<bool> {
        let Some(new_entry) = new_entry else {
            return Ok(false);
        };
        let blob = self.repository.workspace().parse_blob(path)?;

        Ok(blob.object_id()? == new_entry.oid)
    }

    /// An untracked, non-ignored file standing where a parent directory of `path` must go
    fn untracked_parent(&self, path: &Path) -> anyhow::Result<Option<PathBuf>> {
        let workspace = self.repository.workspace();

        for parent in path.ancestors().skip(1) {
            if parent.as_os_str().is_empty() {
                break;
            }
            match workspace.try_stat_file(parent)? {
                Some(stat) if stat.mode.is_tree() => continue,
                Some(_) => {
                    if self.inspector.untracked_path(parent, &*self.index)?.is_some() {
                        return Ok(Some(parent.to_path_buf()));
                    }
                }
                None => continue,
            }
        }

        Ok(None)
    }

    fn index_differs_from_trees(
        &self,
        index_entry: Option<&IndexEntry>,
        old_entry: Option<&DatabaseEntry>,
        new_entry: Option<&DatabaseEntry>,
    ) -> bool {
        self.inspector
            .check_index_against_head_tree(index_entry, old_entry)
            .is_some()
            && self
                .inspector
                .check_index_against_head_tree(index_entry, new_entry)
                .is_some()
    }

    fn record_change(&mut self, path: &Path, change: &TreeChangeType) {
        let ancestors = path
            .ancestors()
            .skip(1)
            .filter(|ancestor| !ancestor.as_os_str().is_empty())
            .map(Path::to_path_buf);

        match change {
            TreeChangeType::Added(new_entry) => {
                self.mkdirs.extend(ancestors);
                self.actions
                    .entry(ActionType::Add)
                    .or_default()
                    .push((path.into(), Some(new_entry.clone())));
            }
            TreeChangeType::Deleted(_) => {
                self.rmdirs.extend(ancestors);
                self.actions
                    .entry(ActionType::Delete)
                    .or_default()
                    .push((path.into(), None));
            }
            TreeChangeType::Modified { new, .. } => {
                self.mkdirs.extend(ancestors);
                self.actions
                    .entry(ActionType::Modify)
                    .or_default()
                    .push((path.into(), Some(new.clone())));
            }
        }
    }

    fn update_workspace(&self) -> anyhow::Result<()> {
        self.repository.workspace().apply_migration(self)
    }

    fn update_index(&mut self) -> anyhow::Result<()> {
        for action_type in [ActionType::Delete, ActionType::Add, ActionType::Modify] {
            let Some(actions) = self.actions.get(&action_type) else {
                continue;
            };

            for (file_path, entry) in actions {
                match (&action_type, entry) {
                    (ActionType::Delete, _) => self.index.remove(file_path)?,
                    (_, Some(entry)) => {
                        let stat = self
                            .repository
                            .workspace()
                            .try_stat_file(file_path)?
                            .unwrap_or_else(|| EntryMetadata::unstated(entry.mode));
                        self.index.add(IndexEntry::new(
                            file_path.to_path_buf(),
                            entry.oid.clone(),
                            stat,
                        ))?;
                    }
                    (_, None) => anyhow::bail!("entry must be provided for add and modify actions"),
                }
            }
        }

        Ok(())
    }

    pub fn load_blob_data(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        self.repository.database().load_blob_bytes(object_id)
    }
}
