use crate::areas::index::Index;
use crate::areas::workspace::Workspace;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::object::Object;
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use crate::artifacts::status::ignore::IgnoreRules;
use derive_new::new;
use std::path::{Path, PathBuf};

/// Outcome of comparing an index entry with the file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceCheck {
    Changed(WorkspaceChangeType),
    Unchanged,
    /// Same content, but the cached stat is stale and should be refreshed
    Refresh(EntryMetadata),
}

#[derive(new)]
pub struct Inspector<'r> {
    workspace: &'r Workspace,
    ignore: &'r IgnoreRules,
}

impl<'r> Inspector<'r> {
    /// The path to report for an untracked worktree entry: the file itself, `dir/` for a
    /// directory with at least one non-ignored file, nothing for ignored or empty ones.
    pub fn untracked_path(&self, path: &Path, index: &Index) -> anyhow::Result<Option<PathBuf>> {
        let is_dir = self.workspace.is_dir(path);
        if self.ignore.is_ignored(path, is_dir) {
            return Ok(None);
        }

        if !is_dir {
            return Ok(Some(path.to_path_buf()));
        }

        match self.has_untracked_content(path, index)? {
            true => {
                let mut dir = path.to_path_buf();
                // add the file separator so the directory prints as `dir/`
                dir.push("");
                Ok(Some(dir))
            }
            false => Ok(None),
        }
    }

    fn has_untracked_content(&self, dir: &Path, index: &Index) -> anyhow::Result<bool> {
        for child in self.workspace.list_dir(Some(dir))? {
            let is_dir = self.workspace.is_dir(&child);
            if self.ignore.is_ignored(&child, is_dir) || index.is_directly_tracked(&child) {
                continue;
            }

            if !is_dir || self.has_untracked_content(&child, index)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn is_content_changed(&self, index_entry: &IndexEntry) -> anyhow::Result<bool> {
        let blob = self.workspace.parse_blob(&index_entry.name)?;
        let oid = blob.object_id()?;

        Ok(oid != index_entry.oid)
    }

    pub fn check_index_against_workspace(
        &self,
        entry: &IndexEntry,
        stat: Option<&EntryMetadata>,
    ) -> anyhow::Result<WorkspaceCheck> {
        let Some(stat) = stat else {
            return Ok(WorkspaceCheck::Changed(WorkspaceChangeType::Deleted));
        };

        if stat.mode == EntryMode::Directory {
            return Ok(WorkspaceCheck::Changed(WorkspaceChangeType::Deleted));
        }
        if entry.mode().is_type_change(&stat.mode) {
            return Ok(WorkspaceCheck::Changed(WorkspaceChangeType::TypeChanged));
        }
        if !entry.stat_match(stat) {
            return Ok(WorkspaceCheck::Changed(WorkspaceChangeType::Modified));
        }
        if entry.times_match(stat) {
            return Ok(WorkspaceCheck::Unchanged);
        }

        match self.is_content_changed(entry)? {
            true => Ok(WorkspaceCheck::Changed(WorkspaceChangeType::Modified)),
            false => Ok(WorkspaceCheck::Refresh(stat.clone())),
        }
    }

    pub fn check_index_against_head_tree(
        &self,
        index_entry: Option<&IndexEntry>,
        head_entry: Option<&DatabaseEntry>,
    ) -> Option<IndexChangeType> {
        match (index_entry, head_entry) {
            (Some(index_entry), Some(head_entry))
                if head_entry.mode.is_type_change(&index_entry.mode()) =>
            {
                Some(IndexChangeType::TypeChanged)
            }
            (Some(index_entry), Some(head_entry))
                if head_entry.mode != index_entry.mode() || head_entry.oid != index_entry.oid =>
            {
                Some(IndexChangeType::Modified)
            }
            (Some(_), None) => Some(IndexChangeType::Added),
            (None, Some(_)) => Some(IndexChangeType::Deleted),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::FileMode;
    use crate::artifacts::objects::blob::Blob;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn worktree() -> TempDir {
        let dir = TempDir::new().unwrap();
        dir.child("tracked.txt").write_str("tracked\n").unwrap();
        dir.child("loose.txt").write_str("loose\n").unwrap();
        dir.child("empty").create_dir_all().unwrap();
        dir.child("logs/run.log").write_str("log\n").unwrap();
        dir.child("fresh/deep/file.txt").write_str("new\n").unwrap();
        dir
    }

    fn indexed(workspace: &Workspace, path: &str) -> IndexEntry {
        let data = workspace.read_file(Path::new(path)).unwrap();
        IndexEntry::new(
            PathBuf::from(path),
            Blob::from_bytes(data).object_id().unwrap(),
            workspace.stat_file(Path::new(path)).unwrap(),
        )
    }

    #[rstest]
    fn untracked_entries_collapse_and_respect_ignores(worktree: TempDir) {
        let workspace = Workspace::new(worktree.path().to_path_buf().into_boxed_path());
        let mut ignore = IgnoreRules::default();
        ignore.add_source(Path::new(""), "*.log\n").unwrap();
        let index = Index::new(worktree.path().join("index").into_boxed_path());
        let inspector = Inspector::new(&workspace, &ignore);

        let reported = ["empty", "fresh", "logs", "loose.txt"]
            .into_iter()
            .map(|path| inspector.untracked_path(Path::new(path), &index).unwrap())
            .collect::<Vec<_>>();

        assert_eq!(
            reported,
            vec![
                None,
                Some(PathBuf::from("fresh/")),
                None,
                Some(PathBuf::from("loose.txt")),
            ]
        );
    }

    #[rstest]
    fn workspace_checks_hash_only_when_stat_is_inconclusive(worktree: TempDir) {
        let workspace = Workspace::new(worktree.path().to_path_buf().into_boxed_path());
        let ignore = IgnoreRules::default();
        let inspector = Inspector::new(&workspace, &ignore);
        let entry = indexed(&workspace, "tracked.txt");
        let stat = workspace.stat_file(Path::new("tracked.txt")).unwrap();

        assert_eq!(
            inspector.check_index_against_workspace(&entry, Some(&stat)).unwrap(),
            WorkspaceCheck::Unchanged
        );
        assert_eq!(
            inspector.check_index_against_workspace(&entry, None).unwrap(),
            WorkspaceCheck::Changed(WorkspaceChangeType::Deleted)
        );

        let mut stale = entry.clone();
        stale.metadata.mtime -= 10;
        assert_eq!(
            inspector.check_index_against_workspace(&stale, Some(&stat)).unwrap(),
            WorkspaceCheck::Refresh(stat.clone())
        );

        worktree.child("tracked.txt").write_str("changed\n").unwrap();
        let stat = workspace.stat_file(Path::new("tracked.txt")).unwrap();
        assert_eq!(
            inspector.check_index_against_workspace(&stale, Some(&stat)).unwrap(),
            WorkspaceCheck::Changed(WorkspaceChangeType::Modified)
        );
    }

    #[test]
    fn head_comparison_distinguishes_type_changes() {
        let workspace = Workspace::new(PathBuf::from(".").into_boxed_path());
        let ignore = IgnoreRules::default();
        let inspector = Inspector::new(&workspace, &ignore);
        let oid = Blob::from_bytes(b"x".to_vec()).object_id().unwrap();
        let entry = IndexEntry::new(
            PathBuf::from("f"),
            oid.clone(),
            EntryMetadata::unstated(EntryMode::Symlink),
        );

        assert_eq!(
            inspector.check_index_against_head_tree(
                Some(&entry),
                Some(&DatabaseEntry::new(oid.clone(), EntryMode::File(FileMode::Regular)))
            ),
            Some(IndexChangeType::TypeChanged)
        );
        assert_eq!(
            inspector.check_index_against_head_tree(
                Some(&entry),
                Some(&DatabaseEntry::new(oid, EntryMode::Symlink))
            ),
            None
        );
        assert_eq!(
            inspector.check_index_against_head_tree(Some(&entry), None),
            Some(IndexChangeType::Added)
        );
    }
}
