use crate::areas::database::CommitCache;
use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName, TagName};
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::checkout::conflict::{ConflictMessage, ConflictType};
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::diff::diff_target::{SnapshotLoader, TreeLike};
use crate::artifacts::diff::tree_diff::diff_snapshots;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::log::path_filter::PathFilter;
use crate::artifacts::merge::apply::apply_merge_outcome;
use crate::artifacts::merge::bca_finder::BCAFinder;
use crate::artifacts::merge::tree_merge::{MergeLabels, TreeMerge};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::operation::state::MergeState;
use crate::artifacts::status::ignore::IgnoreRules;
use crate::errors::RepositoryError;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info};

pub const MERGE_FAILED_NOTICE: &str =
    "Automatic merge failed; fix conflicts and then commit the result.";

impl Repository {
    /// Merge `target` into the current branch.
    ///
    /// Fast-forwards when HEAD is an ancestor of the target, otherwise merges the trees over
    /// their best common ancestor. Conflicts leave a merge in progress.
    pub async fn merge(&mut self, target: &str, message: Option<&str>) -> anyhow::Result<()> {
        self.require_worktree()?;
        let state = self.operations().load()?;
        if !state.is_idle() {
            Err(RepositoryError::OperationInProgress(format!("a {}", state.name())))?;
        }

        let merge_oid = Revision::try_parse(target)
            .and_then(|revision| revision.resolve(self))
            .map_err(|_| anyhow::anyhow!("{target} - not something we can merge"))?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;
        if index.has_conflicts() {
            Err(RepositoryError::UnresolvedConflicts(
                conflict_listing(&index.conflicted_paths()),
            ))?;
        }

        let Some(head_oid) = self.refs().read_head()? else {
            // nothing to merge into: adopt the target
            self.fast_forward(&mut index, None, &merge_oid)?;
            return Ok(());
        };

        let commit_cache = CommitCache::new();
        let database = self.database();
        let base_oid = BCAFinder::new(|oid| commit_cache.get_or_load_slim_commit(database, oid))
            .find_best_common_ancestor(&head_oid, &merge_oid)?;

        if base_oid.as_ref() == Some(&merge_oid) {
            writeln!(self.writer(), "Already up to date.")?;
            return Ok(());
        }

        if base_oid.as_ref() == Some(&head_oid) {
            self.record_orig_head(&head_oid)?;
            writeln!(
                self.writer(),
                "Updating {}..{}",
                head_oid.to_short_oid(),
                merge_oid.to_short_oid()
            )?;
            writeln!(self.writer(), "Fast-forward")?;
            return self.fast_forward(&mut index, Some(&head_oid), &merge_oid);
        }

        self.refuse_staged_changes(&index, &head_oid)?;
        self.record_orig_head(&head_oid)?;

        let message = match message {
            Some(message) => message.to_string(),
            None => self.default_merge_message(target)?,
        };
        let labels = MergeLabels::new("HEAD", target);
        let outcome = TreeMerge::new(self.database(), labels.clone()).merge(
            base_oid.as_ref(),
            &head_oid,
            &merge_oid,
        )?;

        let head_tree = self.database().peel_to_tree(&head_oid)?;
        let current = self.database().flatten_tree(Some(&head_tree))?;
        apply_merge_outcome(self, &mut index, &current, &outcome, "merge")?;

        if outcome.is_clean() {
            self.commit_index(&mut index, vec![head_oid, merge_oid.clone()], &message)?;
            index.write_updates()?;
            info!(target, "merge committed");
            writeln!(self.writer(), "Merge made by the 'ort' strategy.")?;
            return Ok(());
        }

        index.write_updates()?;
        let state = state.start_merge(MergeState {
            head: head_oid,
            merge_head: merge_oid,
            message,
        })?;
        self.operations().save(&state)?;
        info!(target, conflicts = outcome.conflicts.len(), "merge stopped on conflicts");

        for line in outcome.messages(&labels) {
            writeln!(self.writer(), "{line}")?;
        }
        writeln!(self.writer(), "{MERGE_FAILED_NOTICE}")?;

        Ok(())
    }

    /// Move the working tree, index and current branch from `head` to `target`
    fn fast_forward(
        &self,
        index: &mut Index,
        head: Option<&ObjectId>,
        target: &ObjectId,
    ) -> anyhow::Result<()> {
        let database = self.database();
        let snapshot = |oid: Option<&ObjectId>| -> anyhow::Result<_> {
            let tree_oid = match oid {
                Some(oid) => Some(database.peel_to_tree(oid)?),
                None => None,
            };
            database.flatten_tree(tree_oid.as_ref())
        };
        let changes =
            diff_snapshots(&snapshot(head)?, &snapshot(Some(target))?, &PathFilter::empty());

        let ignore = IgnoreRules::load(self.workspace(), self.git_dir())?;
        Migration::new(self, index, &ignore, changes)
            .for_operation("merge")
            .apply_changes()?;
        index.write_updates()?;

        self.refs().update(&SymRefName::head(), head, target)?;
        debug!(target = %target, "fast-forwarded");

        Ok(())
    }

    /// A merge commit records the merge result alone, so the index has to match HEAD first
    fn refuse_staged_changes(&self, index: &Index, head: &ObjectId) -> anyhow::Result<()> {
        let loader = SnapshotLoader::new(self.database(), self.workspace(), index);
        let head_snapshot = loader.snapshot(&TreeLike::Tree(Some(head.clone())))?;
        let staged = loader.snapshot(&TreeLike::Index)?;
        let changes = diff_snapshots(&head_snapshot, &staged, &PathFilter::empty());
        if changes.is_empty() {
            return Ok(());
        }

        let ConflictMessage { header, footer } =
            ConflictMessage::new(&ConflictType::StaleFile, "merge");
        let paths = changes
            .keys()
            .map(|path| format!("\t{}", path.display()))
            .collect::<Vec<_>>()
            .join("\n");
        Err(RepositoryError::WorkingTreeConflict(format!("{header}\n{paths}\n{footer}\nAborting"))
            .into())
    }

    /// `Merge branch 'x'`, `Merge tag 'x'` or `Merge commit 'x'`
    fn default_merge_message(&self, target: &str) -> anyhow::Result<String> {
        if let Ok(branch) = BranchName::try_parse(target.to_string())
            && self.refs().exists(&branch.to_sym_ref_name())?
        {
            return Ok(format!("Merge branch '{target}'"));
        }
        if let Ok(tag) = TagName::try_parse(target.to_string())
            && self.refs().exists(&tag.to_sym_ref_name())?
        {
            return Ok(format!("Merge tag '{target}'"));
        }

        Ok(format!("Merge commit '{target}'"))
    }

    /// `merge --continue`: commit the resolved merge with both parents
    pub async fn merge_continue(&mut self) -> anyhow::Result<()> {
        self.operations().load()?.merge()?;
        self.commit(None).await?;

        Ok(())
    }

    /// `merge --abort`: put back HEAD's version of every path the merge touched.
    ///
    /// Local changes on paths the merge left alone survive the abort.
    pub async fn merge_abort(&mut self) -> anyhow::Result<()> {
        self.require_worktree()?;
        let (merge, state) = self.operations().load()?.finish_merge()?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;
        self.reset_merged_paths(&mut index, &merge.head)?;
        index.write_updates()?;

        self.refs().force_update(&SymRefName::head(), &merge.head)?;
        self.operations().save(&state)?;
        info!(head = %merge.head, "merge aborted");

        Ok(())
    }
}

impl Repository {
    /// Reset the index and working tree to `head` on the paths where the index no longer
    /// matches it, conflicted paths included
    fn reset_merged_paths(&self, index: &mut Index, head: &ObjectId) -> anyhow::Result<()> {
        let database = self.database();
        let loader = SnapshotLoader::new(database, self.workspace(), index);
        let wanted = loader.snapshot(&TreeLike::Tree(Some(head.clone())))?;
        let staged = loader.snapshot(&TreeLike::Index)?;

        let mut touched = diff_snapshots(&wanted, &staged, &PathFilter::empty())
            .into_keys()
            .collect::<BTreeSet<_>>();
        touched.extend(index.conflicted_paths());

        for path in &touched {
            index.remove(path)?;
            match wanted.get(path) {
                Some(entry) => {
                    let data = database.load_blob_bytes(&entry.oid)?;
                    self.workspace().write_file(path, &data, entry.mode)?;
                    let metadata = self
                        .workspace()
                        .try_stat_file(path)?
                        .unwrap_or_else(|| EntryMetadata::unstated(entry.mode));
                    index.add(IndexEntry::new(path.clone(), entry.oid.clone(), metadata))?;
                }
                None => self.workspace().remove_file(path)?,
            }
        }
        debug!(paths = touched.len(), "merged paths reset");

        Ok(())
    }
}

/// `<path>: needs merge` for each unresolved path
pub(crate) fn conflict_listing(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| format!("{}: needs merge", path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}
