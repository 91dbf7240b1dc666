//! Working tree access
//!
//! Every path handed to or returned from the workspace is relative to the worktree root.
//! Symlinks are never followed: reading one yields its target, stating one describes the link.

use crate::artifacts::checkout::migration::{ActionType, Migration};
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::blob::Blob;
use crate::errors::RepositoryError;
use anyhow::Context;
use bytes::Bytes;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

const IGNORED_PATHS: [&str; 3] = [".git", ".", ".."];

#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn abs_path(&self, path: &Path) -> PathBuf {
        self.path.join(path)
    }

    /// Worktree-relative form of a path given on the command line, relative to `cwd`.
    ///
    /// The worktree root itself maps to the empty path.
    pub fn pathspec(&self, cwd: &Path, spec: &Path) -> anyhow::Result<PathBuf> {
        let mut resolved = PathBuf::new();
        for component in cwd.join(spec).components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                }
                other => resolved.push(other),
            }
        }

        match resolved.strip_prefix(self.path.as_ref()) {
            Ok(relative) => Ok(relative.to_path_buf()),
            Err(_) => Err(RepositoryError::Usage(format!(
                "{}: '{}' is outside repository at '{}'",
                spec.display(),
                spec.display(),
                self.path.display()
            )))?,
        }
    }

    /// Whether anything (file, directory or dangling link) exists at `path`
    pub fn exists(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(self.path.join(path)).is_ok()
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(self.path.join(path))
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false)
    }

    pub fn parse_blob(&self, path: &Path) -> anyhow::Result<Blob> {
        let stat = self.stat_file(path)?;
        let data = self.read_file(path)?;

        let mode = match stat.mode {
            EntryMode::File(mode) => mode,
            _ => Default::default(),
        };
        Ok(Blob::new(data, mode))
    }

    /// Entries directly inside `dir_path` (the root when `None`), sorted by name
    pub fn list_dir(&self, dir_path: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let dir_path = match dir_path {
            Some(p) => self.path.join(p),
            None => self.path.to_path_buf(),
        };

        if !dir_path.is_dir() {
            anyhow::bail!("The specified path is not a directory: {:?}", dir_path);
        }

        let mut entries = std::fs::read_dir(&dir_path)
            .with_context(|| format!("Unable to read directory {}", dir_path.display()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| self.check_if_not_ignored_path(&entry.path()))
            .collect::<Vec<_>>();
        entries.sort();

        Ok(entries)
    }

    /// Every file and symlink under `root_file_path` (the whole worktree when `None`)
    pub fn list_files(&self, root_file_path: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let root_file_path = match root_file_path {
            Some(p) => self.path.join(p),
            None => self.path.to_path_buf(),
        };

        let metadata = std::fs::symlink_metadata(&root_file_path)
            .with_context(|| format!("The specified path does not exist: {root_file_path:?}"))?;

        if metadata.is_dir() {
            let mut files = WalkDir::new(&root_file_path)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| !Self::is_ignored(entry.path()))
                .filter_map(|entry| entry.ok())
                .filter(|entry| !entry.file_type().is_dir())
                .filter_map(|entry| self.check_if_not_ignored_path(entry.path()))
                .collect::<Vec<_>>();
            files.sort();

            Ok(files)
        } else {
            Ok(vec![
                root_file_path
                    .strip_prefix(self.path.as_ref())
                    .map(PathBuf::from)
                    .unwrap_or_default(),
            ])
        }
    }

    fn is_ignored(path: &Path) -> bool {
        path.file_name()
            .map(|name| IGNORED_PATHS.contains(&name.to_string_lossy().as_ref()))
            .unwrap_or(false)
    }

    fn check_if_not_ignored_path(&self, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix(self.path.as_ref()).ok()?;

        let ignored = relative.components().any(|component| {
            IGNORED_PATHS.contains(&component.as_os_str().to_string_lossy().as_ref())
        });
        match ignored {
            true => None,
            false => Some(relative.to_path_buf()),
        }
    }

    /// File content, or the target of a symlink
    pub fn read_file(&self, file_path: &Path) -> anyhow::Result<Bytes> {
        let full_path = self.path.join(file_path);
        let metadata = std::fs::symlink_metadata(&full_path)
            .with_context(|| format!("Unable to stat {}", file_path.display()))?;

        if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&full_path)
                .with_context(|| format!("Unable to read link {}", file_path.display()))?;
            return Ok(Bytes::from(target.as_os_str().as_encoded_bytes().to_vec()));
        }

        let content = std::fs::read(&full_path)
            .with_context(|| format!("Unable to read {}", file_path.display()))?;

        Ok(Bytes::from(content))
    }

    pub fn stat_file(&self, file_path: &Path) -> anyhow::Result<EntryMetadata> {
        let full_path = self.path.join(file_path);
        let metadata = std::fs::symlink_metadata(&full_path)
            .with_context(|| format!("Unable to stat {}", file_path.display()))?;

        (full_path.as_path(), metadata).try_into()
    }

    /// Stat that maps a missing file to `None`
    pub fn try_stat_file(&self, file_path: &Path) -> anyhow::Result<Option<EntryMetadata>> {
        match std::fs::symlink_metadata(self.path.join(file_path)) {
            Ok(metadata) => Ok(Some((self.path.join(file_path).as_path(), metadata).try_into()?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotADirectory => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("Unable to stat {}", file_path.display()))
            }
        }
    }

    /// Write `data` at `file_path` with `mode`, replacing whatever is there.
    ///
    /// Missing parent directories are created; a file standing where a parent directory
    /// must go is removed first.
    pub fn write_file(&self, file_path: &Path, data: &[u8], mode: EntryMode) -> anyhow::Result<()> {
        if let Some(parent) = file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            self.make_parent_dirs(parent)?;
        }

        let path = self.path.join(file_path);
        self.remove_any(&path)
            .with_context(|| format!("Failed to replace {}", file_path.display()))?;

        match mode {
            EntryMode::Symlink => {
                let target = PathBuf::from(String::from_utf8_lossy(data).into_owned());
                #[cfg(unix)]
                std::os::unix::fs::symlink(&target, &path)
                    .with_context(|| format!("Failed to create symlink {}", file_path.display()))?;
                #[cfg(not(unix))]
                std::fs::write(&path, data)
                    .with_context(|| format!("Failed to write {}", file_path.display()))?;
            }
            _ => {
                let mut file = std::fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&path)
                    .with_context(|| format!("Failed to open file: {:?}", file_path))?;

                file.write_all(data)
                    .with_context(|| format!("Failed to write to file: {:?}", file_path))?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    use crate::artifacts::index::entry_mode::FileMode;
                    let permissions = std::fs::Permissions::from_mode(match mode {
                        EntryMode::File(FileMode::Executable) => 0o755,
                        _ => 0o644,
                    });
                    std::fs::set_permissions(&path, permissions).with_context(|| {
                        format!("Failed to set permissions for file: {:?}", file_path)
                    })?;
                }
            }
        }
        trace!(path = %file_path.display(), "wrote worktree file");

        Ok(())
    }

    /// Remove a file and every parent directory it leaves empty
    pub fn remove_file(&self, file_path: &Path) -> anyhow::Result<()> {
        let path = self.path.join(file_path);
        self.remove_any(&path)
            .with_context(|| format!("Failed to remove {}", file_path.display()))?;

        self.prune_empty_dirs(file_path.parent());

        Ok(())
    }

    /// Move a file or directory, creating the destination's parents and pruning the source's
    pub fn rename_path(&self, from: &Path, to: &Path) -> anyhow::Result<()> {
        if let Some(parent) = to.parent() {
            self.make_parent_dirs(parent)?;
        }
        std::fs::rename(self.path.join(from), self.path.join(to)).with_context(|| {
            format!("Failed to move {} to {}", from.display(), to.display())
        })?;
        self.prune_empty_dirs(from.parent());

        Ok(())
    }

    fn remove_any(&self, path: &Path) -> std::io::Result<()> {
        match std::fs::symlink_metadata(path) {
            Ok(metadata) if metadata.is_dir() => std::fs::remove_dir_all(path),
            Ok(_) => std::fs::remove_file(path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn prune_empty_dirs(&self, mut dir: Option<&Path>) {
        while let Some(current) = dir {
            if current.as_os_str().is_empty() {
                break;
            }
            // stops at the first directory that still has children
            if std::fs::remove_dir(self.path.join(current)).is_err() {
                break;
            }
            dir = current.parent();
        }
    }

    fn make_parent_dirs(&self, dir_path: &Path) -> anyhow::Result<()> {
        let mut current = PathBuf::new();
        for component in dir_path.components() {
            current.push(component);
            self.make_directory(&current)?;
        }

        Ok(())
    }

    // The order of applying migrations is important:
    // For deletions, we first delete files and then remove directories in reverse order.
    // For additions, we first create directories and then add/update files.
    pub fn apply_migration(&self, migration: &Migration) -> anyhow::Result<()> {
        self.apply_migration_action_set(migration, ActionType::Delete)?;
        // child directories sort after their parents, so reverse order empties them first
        migration
            .rmdirs()
            .iter()
            .rev()
            .map(|dir_path| self.remove_directory(dir_path))
            .collect::<Result<Vec<()>, _>>()?;

        migration
            .mkdirs()
            .iter()
            .map(|dir_path| self.make_directory(dir_path))
            .collect::<Result<Vec<()>, _>>()?;
        self.apply_migration_action_set(migration, ActionType::Modify)?;
        self.apply_migration_action_set(migration, ActionType::Add)?;

        Ok(())
    }

    fn apply_migration_action_set(
        &self,
        migration: &Migration,
        action: ActionType,
    ) -> anyhow::Result<()> {
        let Some(changes) = migration.actions().get(&action) else {
            return Ok(());
        };

        for (file_path, entry) in changes {
            match (&action, entry) {
                (ActionType::Delete, None) => {
                    let path = self.path.join(file_path);
                    self.remove_any(&path)
                        .with_context(|| format!("Failed to remove file: {:?}", file_path))?;
                }
                (ActionType::Add | ActionType::Modify, Some(entry)) => {
                    let data = migration.load_blob_data(&entry.oid)?;
                    self.write_file(file_path, &data, entry.mode)?;
                }
                _ => anyhow::bail!("Invalid action and entry combination"),
            }
        }

        Ok(())
    }

    fn remove_directory(&self, dir_path: &Path) -> anyhow::Result<()> {
        let dir_path = self.path.join(dir_path);

        // directories that still hold untracked files are left in place
        if dir_path.is_dir() && std::fs::read_dir(&dir_path)?.next().is_none() {
            std::fs::remove_dir(&dir_path)?;
        }

        Ok(())
    }

    fn make_directory(&self, dir_path: &Path) -> anyhow::Result<()> {
        let dir_path = self.path.join(dir_path);

        match std::fs::symlink_metadata(&dir_path) {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => {
                std::fs::remove_file(&dir_path)?;
                std::fs::create_dir(&dir_path)?;
                Ok(())
            }
            Err(_) => {
                std::fs::create_dir(&dir_path)
                    .with_context(|| format!("Failed to create directory {}", dir_path.display()))?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::FileMode;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn workspace() -> (assert_fs::TempDir, Workspace) {
        let dir = assert_fs::TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path().to_path_buf().into_boxed_path());
        (dir, workspace)
    }

    #[rstest]
    fn listing_skips_the_metadata_directory(workspace: (assert_fs::TempDir, Workspace)) {
        let (dir, workspace) = workspace;
        dir.child(".git/HEAD").write_str("ref: refs/heads/master\n").unwrap();
        dir.child("b.txt").write_str("b").unwrap();
        dir.child("a/nested.txt").write_str("n").unwrap();

        assert_eq!(
            workspace.list_dir(None).unwrap(),
            vec![PathBuf::from("a"), PathBuf::from("b.txt")]
        );
        assert_eq!(
            workspace.list_files(None).unwrap(),
            vec![PathBuf::from("a/nested.txt"), PathBuf::from("b.txt")]
        );
    }

    #[rstest]
    fn writing_creates_parents_and_sets_the_mode(workspace: (assert_fs::TempDir, Workspace)) {
        let (_dir, workspace) = workspace;
        let path = Path::new("bin/run.sh");

        workspace
            .write_file(path, b"#!/bin/sh\n", EntryMode::File(FileMode::Executable))
            .unwrap();

        assert_eq!(workspace.read_file(path).unwrap(), Bytes::from_static(b"#!/bin/sh\n"));
        assert_eq!(
            workspace.stat_file(path).unwrap().mode,
            EntryMode::File(FileMode::Executable)
        );
    }

    #[cfg(unix)]
    #[rstest]
    fn symlinks_are_read_as_their_target(workspace: (assert_fs::TempDir, Workspace)) {
        let (_dir, workspace) = workspace;
        let link = Path::new("link");

        workspace.write_file(link, b"target.txt", EntryMode::Symlink).unwrap();

        assert_eq!(workspace.read_file(link).unwrap(), Bytes::from_static(b"target.txt"));
        assert_eq!(workspace.stat_file(link).unwrap().mode, EntryMode::Symlink);
    }

    #[rstest]
    #[case("a/b.txt", "a/b.txt")]
    #[case("./a/../c.txt", "c.txt")]
    #[case(".", "")]
    fn pathspecs_are_made_relative_to_the_root(
        workspace: (assert_fs::TempDir, Workspace),
        #[case] spec: &str,
        #[case] expected: &str,
    ) {
        let (dir, workspace) = workspace;

        assert_eq!(
            workspace.pathspec(dir.path(), Path::new(spec)).unwrap(),
            PathBuf::from(expected)
        );
    }

    #[rstest]
    fn pathspecs_outside_the_worktree_are_rejected(workspace: (assert_fs::TempDir, Workspace)) {
        let (dir, workspace) = workspace;

        assert!(workspace.pathspec(dir.path(), Path::new("../elsewhere")).is_err());
    }

    #[rstest]
    fn removing_prunes_emptied_directories(workspace: (assert_fs::TempDir, Workspace)) {
        let (dir, workspace) = workspace;
        dir.child("a/b/c.txt").write_str("c").unwrap();
        dir.child("a/keep.txt").write_str("k").unwrap();

        workspace.remove_file(Path::new("a/b/c.txt")).unwrap();

        assert!(!workspace.exists(Path::new("a/b")));
        assert!(workspace.exists(Path::new("a/keep.txt")));
        assert_eq!(workspace.try_stat_file(Path::new("a/b/c.txt")).unwrap(), None);
    }
}
