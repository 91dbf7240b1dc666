use crate::areas::index::Index;
use crate::areas::refs::ORIG_HEAD_REF_NAME;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::SymRefName;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::diff::diff_target::{SnapshotLoader, TreeLike};
use crate::artifacts::diff::tree_diff::diff_snapshots;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::log::path_filter::PathFilter;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::operation::state::OperationState;
use crate::artifacts::status::ignore::IgnoreRules;
use crate::errors::RepositoryError;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetMode {
    /// Move the branch only
    Soft,
    /// Also load the index
    #[default]
    Mixed,
    /// Also overwrite the working tree
    Hard,
}

impl Repository {
    /// `reset [--soft|--mixed|--hard] [<commit>]` and `reset [<commit>] -- <paths>`
    pub async fn reset(
        &mut self,
        args: &[String],
        paths: &[String],
        mode: Option<ResetMode>,
    ) -> anyhow::Result<()> {
        let (revision, mut path_args) = match args.split_first() {
            Some((first, rest)) if Revision::try_parse(first)
                .and_then(|revision| revision.resolve(self))
                .is_ok() =>
            {
                (Some(first.as_str()), rest.to_vec())
            }
            _ => (None, args.to_vec()),
        };
        path_args.extend(paths.iter().cloned());

        let target = match revision {
            Some(revision) => Some(Revision::try_parse(revision)?.resolve(self)?),
            None => self.refs().read_head()?,
        };

        if !path_args.is_empty() {
            if matches!(mode, Some(ResetMode::Soft | ResetMode::Hard)) {
                Err(RepositoryError::Usage(
                    "Cannot do soft or hard reset with paths.".to_string(),
                ))?;
            }
            return self.reset_paths(&path_args, target.as_ref()).await;
        }

        let mode = mode.unwrap_or_default();
        if mode != ResetMode::Soft {
            self.require_worktree()?;
        }
        let Some(target) = target else {
            return Err(RepositoryError::UnknownRevision("HEAD".to_string()).into());
        };

        if let Some(head) = self.refs().read_head()? {
            self.record_orig_head(&head)?;
        }

        match mode {
            ResetMode::Soft => {}
            ResetMode::Mixed => {
                let index = self.index();
                let mut index = index.lock().await;
                index.rehydrate()?;
                let tree_oid = self.database().peel_to_tree(&target)?;
                index.load_from_tree(self.database(), Some(&tree_oid))?;
                self.refresh_index_stats(&mut index)?;
                index.write_updates()?;
            }
            ResetMode::Hard => {
                let index = self.index();
                let mut index = index.lock().await;
                index.rehydrate()?;
                self.reset_hard_to(&mut index, Some(&target))?;
                index.write_updates()?;
            }
        }

        self.refs().force_update(&SymRefName::head(), &target)?;
        if let OperationState::Merge(_) = self.operations().load()? {
            self.operations().save(&OperationState::Idle)?;
        }
        info!(?mode, target = %target, "reset");

        if mode == ResetMode::Hard {
            let line = self.head_position("HEAD is now at", &target)?;
            writeln!(self.writer(), "{line}")?;
        }

        Ok(())
    }

    /// Remember where HEAD was before a history-rewriting command
    pub(crate) fn record_orig_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        self.refs()
            .create(&SymRefName::new(ORIG_HEAD_REF_NAME.to_string()), oid, true)
    }

    /// `<message> <short> <subject>`, as in `HEAD is now at ...`
    pub(crate) fn head_position(&self, message: &str, oid: &ObjectId) -> anyhow::Result<String> {
        let subject = self
            .database()
            .parse_object_as_commit(oid)?
            .map(|commit| commit.short_message())
            .unwrap_or_default();

        Ok(format!("{message} {} {subject}", oid.to_short_oid()))
    }

    async fn reset_paths(
        &mut self,
        args: &[String],
        target: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        self.require_worktree()?;
        let pathspecs = self.pathspecs(args)?;
        let tree_oid = match target {
            Some(target) => Some(self.database().peel_to_tree(target)?),
            None => None,
        };
        let snapshot = self.database().flatten_tree(tree_oid.as_ref())?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        for (arg, spec) in args.iter().zip(&pathspecs) {
            let in_target = snapshot
                .iter()
                .filter(|(path, _)| path.starts_with(spec))
                .collect::<Vec<_>>();
            let in_index = index.entries_under_path(spec);
            if in_target.is_empty() && in_index.is_empty() {
                Err(RepositoryError::PathspecNotFound(arg.clone()))?;
            }

            let previous = in_index
                .iter()
                .filter_map(|path| index.entry_by_path(path).cloned())
                .collect::<Vec<_>>();
            for path in &in_index {
                index.remove(path)?;
            }
            for (path, entry) in in_target {
                let metadata = previous
                    .iter()
                    .find(|prior| prior.name == *path && prior.oid == entry.oid)
                    .map(|prior| prior.metadata.clone())
                    .unwrap_or_else(|| EntryMetadata::unstated(entry.mode));
                index.add(IndexEntry::new(path.clone(), entry.oid.clone(), metadata))?;
            }
        }
        debug!(paths = pathspecs.len(), "index paths reset");

        index.write_updates()?;

        Ok(())
    }

    /// Make the index and the tracked working tree match `target` exactly, discarding local
    /// changes; `None` is the empty tree
    pub(crate) fn reset_hard_to(
        &self,
        index: &mut Index,
        target: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        let database = self.database();
        let tree_oid = match target {
            Some(target) => Some(database.peel_to_tree(target)?),
            None => None,
        };
        let wanted = database.flatten_tree(tree_oid.as_ref())?;
        let current = SnapshotLoader::new(database, self.workspace(), index)
            .snapshot(&TreeLike::Worktree)?;

        // conflicted and missing paths are rewritten along with everything else that differs
        let changes = diff_snapshots(&current, &wanted, &PathFilter::empty());
        let ignore = IgnoreRules::load(self.workspace(), self.git_dir())?;
        Migration::new(self, index, &ignore, changes)
            .for_operation("reset")
            .forced(true)
            .apply_changes()?;

        index.load_from_tree(database, tree_oid.as_ref())?;
        self.refresh_index_stats(index)?;
        debug!(target = ?target.map(ToString::to_string), "hard reset");

        Ok(())
    }

    /// Cache the working tree stat of every entry, so untouched files read as clean
    pub(crate) fn refresh_index_stats(&self, index: &mut Index) -> anyhow::Result<()> {
        let entries = index.merged_entries().cloned().collect::<Vec<_>>();
        for entry in entries {
            let Some(stat) = self.workspace().try_stat_file(&entry.name)? else {
                continue;
            };
            if stat.mode.is_tree() {
                continue;
            }
            let data = self.workspace().read_file(&entry.name)?;
            if Blob::from_bytes(data).object_id()? == entry.oid {
                index.update_entry_stat(&entry, stat);
            }
        }

        Ok(())
    }
}
