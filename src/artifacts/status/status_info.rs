use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::rename::{DEFAULT_RENAME_THRESHOLD, RenameCandidate, detect_renames};
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::status::file_change::{
    ConflictKind, IndexChangeType, PathStatus, WorkspaceChangeType,
};
use crate::artifacts::status::ignore::IgnoreRules;
use crate::artifacts::status::inspector::{Inspector, WorkspaceCheck};
use derive_new::new;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

pub type FileStatSet = BTreeMap<PathBuf, EntryMetadata>;
pub type HeadTree = BTreeMap<PathBuf, DatabaseEntry>;

/// Classification of every interesting path, each category ordered by path
#[derive(Debug, Clone, Default)]
pub struct StatusInfo {
    pub staged: BTreeMap<PathBuf, IndexChangeType>,
    pub unstaged: BTreeMap<PathBuf, WorkspaceChangeType>,
    pub untracked: BTreeSet<PathBuf>,
    pub conflicts: BTreeMap<PathBuf, ConflictKind>,
    pub head_tree: HeadTree,
}

impl StatusInfo {
    /// One `PathStatus` per tracked path by path, then one per untracked path
    pub fn classify(&self) -> Vec<PathStatus> {
        let mut statuses = BTreeMap::<PathBuf, PathStatus>::new();
        fn status_of<'m>(
            statuses: &'m mut BTreeMap<PathBuf, PathStatus>,
            path: &Path,
        ) -> &'m mut PathStatus {
            statuses
                .entry(path.to_path_buf())
                .or_insert_with(|| PathStatus::new(path.to_path_buf()))
        }

        for (path, change) in &self.staged {
            status_of(&mut statuses, path).staged = Some(change.clone());
        }
        for (path, change) in &self.unstaged {
            status_of(&mut statuses, path).unstaged = Some(*change);
        }
        for (path, kind) in &self.conflicts {
            status_of(&mut statuses, path).conflict = Some(*kind);
        }
        // an untracked path can also be staged for deletion, so it gets its own line
        let untracked = self.untracked.iter().map(|path| PathStatus {
            untracked: true,
            ..PathStatus::new(path.clone())
        });

        statuses.into_values().chain(untracked).collect()
    }

    /// Nothing staged, modified or conflicted; untracked files do not count
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty() && self.conflicts.is_empty()
    }

    pub fn has_staged_changes(&self) -> bool {
        !self.staged.is_empty()
    }
}

#[derive(new)]
pub struct Status<'r> {
    repository: &'r Repository,
}

impl<'r> Status<'r> {
    /// Compare HEAD, the index and the working tree.
    ///
    /// Entries whose content is unchanged but whose cached stat drifted are refreshed in
    /// `index`; the caller decides whether to write it back.
    pub async fn initialize(&self, index: &mut Index) -> anyhow::Result<StatusInfo> {
        let repository = self.repository;
        let ignore = IgnoreRules::load(repository.workspace(), repository.git_dir())?;
        let inspector = Inspector::new(repository.workspace(), &ignore);

        let mut file_stats = FileStatSet::new();
        let mut untracked = BTreeSet::new();
        self.scan_workspace(None, &mut untracked, &mut file_stats, index, &inspector)
            .await?;

        let head_tree = self.load_head_tree()?;
        let mut info = StatusInfo {
            untracked,
            head_tree,
            ..StatusInfo::default()
        };

        self.check_index_entries(&file_stats, index, &inspector, &mut info)?;
        self.collect_conflicts(index, &mut info);
        self.collect_deleted_head_files(index, &mut info);

        if repository.config_flag("status.renames", true)? {
            self.pair_renames(index, &mut info)?;
        }
        debug!(
            staged = info.staged.len(),
            unstaged = info.unstaged.len(),
            untracked = info.untracked.len(),
            conflicts = info.conflicts.len(),
            "status computed"
        );

        Ok(info)
    }

    async fn scan_workspace(
        &self,
        prefix_path: Option<&Path>,
        untracked: &mut BTreeSet<PathBuf>,
        file_stats: &mut FileStatSet,
        index: &Index,
        inspector: &Inspector<'_>,
    ) -> anyhow::Result<()> {
        let workspace = self.repository.workspace();

        for path in workspace.list_dir(prefix_path)? {
            if index.is_directly_tracked(&path) {
                if workspace.is_dir(&path) {
                    Box::pin(self.scan_workspace(
                        Some(&path),
                        untracked,
                        file_stats,
                        index,
                        inspector,
                    ))
                    .await?;
                } else if let Some(stat) = workspace.try_stat_file(&path)? {
                    file_stats.insert(path, stat);
                }
            } else if let Some(reported) = inspector.untracked_path(&path, index)? {
                untracked.insert(reported);
            }
        }

        Ok(())
    }

    fn load_head_tree(&self) -> anyhow::Result<HeadTree> {
        let database = self.repository.database();

        match self.repository.refs().read_head()? {
            Some(head_oid) => {
                let tree_oid = database.peel_to_tree(&head_oid)?;
                database.flatten_tree(Some(&tree_oid))
            }
            None => Ok(HeadTree::new()),
        }
    }

    fn check_index_entries(
        &self,
        file_stats: &FileStatSet,
        index: &mut Index,
        inspector: &Inspector<'_>,
        info: &mut StatusInfo,
    ) -> anyhow::Result<()> {
        let entries = index.merged_entries().cloned().collect::<Vec<IndexEntry>>();

        for entry in entries {
            match inspector.check_index_against_workspace(&entry, file_stats.get(&entry.name))? {
                WorkspaceCheck::Changed(change) => {
                    info.unstaged.insert(entry.name.clone(), change);
                }
                WorkspaceCheck::Refresh(stat) => index.update_entry_stat(&entry, stat),
                WorkspaceCheck::Unchanged => {}
            }

            let head_entry = info.head_tree.get(&entry.name);
            if let Some(change) = inspector.check_index_against_head_tree(Some(&entry), head_entry)
            {
                info.staged.insert(entry.name.clone(), change);
            }
        }

        Ok(())
    }

    fn collect_conflicts(&self, index: &Index, info: &mut StatusInfo) {
        for path in index.conflicted_paths() {
            let [base, ours, theirs] = index.conflict_entries(&path);
            if let Some(kind) =
                ConflictKind::from_stages(base.is_some(), ours.is_some(), theirs.is_some())
            {
                info.conflicts.insert(path, kind);
            }
        }
    }

    fn collect_deleted_head_files(&self, index: &Index, info: &mut StatusInfo) {
        for path in info.head_tree.keys() {
            if !index.is_tracked_file(path) {
                info.staged.insert(path.clone(), IndexChangeType::Deleted);
            }
        }
    }

    /// Turn staged deletion/addition pairs into renames
    fn pair_renames(&self, index: &Index, info: &mut StatusInfo) -> anyhow::Result<()> {
        let deleted = info
            .staged
            .iter()
            .filter(|(_, change)| **change == IndexChangeType::Deleted)
            .filter_map(|(path, _)| {
                info.head_tree.get(path).map(|entry| RenameCandidate {
                    path: path.clone(),
                    oid: entry.oid.clone(),
                })
            })
            .collect::<Vec<_>>();
        let added = info
            .staged
            .iter()
            .filter(|(_, change)| **change == IndexChangeType::Added)
            .filter_map(|(path, _)| {
                index.entry_by_path(path).map(|entry| RenameCandidate {
                    path: path.clone(),
                    oid: entry.oid.clone(),
                })
            })
            .collect::<Vec<_>>();

        if deleted.is_empty() || added.is_empty() {
            return Ok(());
        }

        let database = self.repository.database();
        let pairs = detect_renames(&deleted, &added, DEFAULT_RENAME_THRESHOLD, |candidate| {
            Ok(database.load_blob_bytes(&candidate.oid)?.to_vec())
        })?;

        for pair in pairs {
            info.staged.remove(&pair.from);
            info.staged
                .insert(pair.to, IndexChangeType::Renamed { from: pair.from });
        }

        Ok(())
    }
}
