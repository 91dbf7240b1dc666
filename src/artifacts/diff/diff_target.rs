//! The two sides of a diff
//!
//! A diff compares two tree-like sources: a tree (usually a commit's), the index, or the
//! tracked files of the working tree. Each is flattened into a [`Snapshot`] first; content is
//! only loaded for the paths that actually differ.

use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::workspace::Workspace;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::Snapshot;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::Stage;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use bytes::Bytes;
use std::path::{Path, PathBuf};

pub const NULL_PATH: &str = "/dev/null";

/// A source a diff side can be taken from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeLike {
    /// A tree, commit or tag id; `None` is the empty tree
    Tree(Option<ObjectId>),
    Index,
    Worktree,
}

impl TreeLike {
    pub fn is_worktree(&self) -> bool {
        matches!(self, TreeLike::Worktree)
    }
}

/// Flattens tree-like sources and loads their contents
pub struct SnapshotLoader<'a> {
    database: &'a Database,
    workspace: &'a Workspace,
    index: &'a Index,
}

impl<'a> SnapshotLoader<'a> {
    pub fn new(database: &'a Database, workspace: &'a Workspace, index: &'a Index) -> Self {
        Self {
            database,
            workspace,
            index,
        }
    }

    pub fn snapshot(&self, source: &TreeLike) -> anyhow::Result<Snapshot> {
        match source {
            TreeLike::Tree(None) => Ok(Snapshot::new()),
            TreeLike::Tree(Some(oid)) => {
                let tree_oid = self.database.peel_to_tree(oid)?;
                self.database.flatten_tree(Some(&tree_oid))
            }
            TreeLike::Index => Ok(self.index_snapshot()),
            TreeLike::Worktree => self.worktree_snapshot(),
        }
    }

    /// Stage 0 entries, with "ours" standing in for unresolved paths
    fn index_snapshot(&self) -> Snapshot {
        self.index
            .entries()
            .filter(|entry| {
                entry.stage == Stage::Merged
                    || (entry.stage == Stage::Ours)
                    || (entry.stage == Stage::Theirs
                        && self.index.entry_at(&entry.name, Stage::Ours).is_none())
            })
            .map(|entry| {
                (
                    entry.name.clone(),
                    DatabaseEntry::new(entry.oid.clone(), entry.mode()),
                )
            })
            .collect()
    }

    /// Tracked files as they are on disk; stat-clean files reuse the index id
    fn worktree_snapshot(&self) -> anyhow::Result<Snapshot> {
        let mut snapshot = Snapshot::new();

        for (path, indexed) in self.index_snapshot() {
            let Some(stat) = self.workspace.try_stat_file(&path)? else {
                continue;
            };
            if stat.mode == EntryMode::Directory {
                continue;
            }

            let clean = self
                .index
                .entry_by_path(&path)
                .is_some_and(|entry| entry.stat_match(&stat) && entry.times_match(&stat));
            let entry = match clean {
                true => indexed,
                false => {
                    let data = self.workspace.read_file(&path)?;
                    DatabaseEntry::new(Blob::from_bytes(data).object_id()?, stat.mode)
                }
            };
            snapshot.insert(path, entry);
        }

        Ok(snapshot)
    }

    /// Content of `entry` at `path` on the given side
    pub fn load(
        &self,
        source: &TreeLike,
        path: &Path,
        entry: &DatabaseEntry,
    ) -> anyhow::Result<Bytes> {
        match source {
            TreeLike::Worktree if !self.database.exists(&entry.oid) => self
                .workspace
                .read_file(path)
                .with_context(|| format!("Unable to read {}", path.display())),
            _ if entry.mode == EntryMode::Gitlink => {
                Ok(Bytes::from(format!("Subproject commit {}\n", entry.oid)))
            }
            _ => self.database.load_blob_bytes(&entry.oid),
        }
    }
}

/// One side of a file delta
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffTarget {
    pub file: PathBuf,
    pub oid: ObjectId,
    /// `None` when the path does not exist on this side
    pub mode: Option<EntryMode>,
    pub data: Bytes,
}

impl DiffTarget {
    pub fn from_entry(file: &Path, entry: &DatabaseEntry, data: Bytes) -> Self {
        Self {
            file: file.to_path_buf(),
            oid: entry.oid.clone(),
            mode: Some(entry.mode),
            data,
        }
    }

    pub fn from_nothing(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            oid: ObjectId::null(),
            mode: None,
            data: Bytes::new(),
        }
    }

    /// A file outside any repository, or `/dev/null`
    pub fn from_fs_path(path: &Path) -> anyhow::Result<Self> {
        if path == Path::new(NULL_PATH) {
            return Ok(Self::from_nothing(path));
        }

        let metadata = std::fs::symlink_metadata(path)
            .with_context(|| format!("Could not access '{}'", path.display()))?;
        let data = match metadata.file_type().is_symlink() {
            true => Bytes::from(std::fs::read_link(path)?.as_os_str().as_encoded_bytes().to_vec()),
            false => Bytes::from(
                std::fs::read(path)
                    .with_context(|| format!("Could not read '{}'", path.display()))?,
            ),
        };
        let stat: crate::artifacts::index::index_entry::EntryMetadata =
            (path, metadata).try_into()?;

        Ok(Self {
            file: path.to_path_buf(),
            oid: Blob::from_bytes(data.clone()).object_id()?,
            mode: Some(stat.mode),
            data,
        })
    }

    pub fn exists(&self) -> bool {
        self.mode.is_some()
    }

    /// `a/<path>`, `b/<path>` or `/dev/null`
    pub fn diff_path(&self, prefix: &str) -> String {
        match self.mode {
            Some(_) => format!("{prefix}{}", self.file.display()),
            None => NULL_PATH.to_string(),
        }
    }

    pub fn pretty_mode(&self) -> &'static str {
        self.mode.map(|mode| mode.as_str()).unwrap_or("000000")
    }

    /// Six-digit mode as printed by `--raw`
    pub fn raw_mode(&self) -> String {
        self.mode.map(|mode| mode.padded()).unwrap_or_else(|| "000000".to_string())
    }
}
