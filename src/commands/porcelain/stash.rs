//! `stash`: a stack of saved work-in-progress states
//!
//! Each entry is a commit W whose tree is the tracked working tree, with HEAD as first parent
//! and a commit I of the index as second parent. `refs/stash` names the newest entry and its
//! reflog holds the whole stack, newest last.

use crate::areas::index::Index;
use crate::areas::refs::{ReflogEntry, STASH_REF_NAME};
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::SymRefName;
use crate::artifacts::diff::diff_target::{SnapshotLoader, TreeLike};
use crate::artifacts::diff::file_delta::{DiffOptions, OutputFormat, build_deltas};
use crate::artifacts::diff::format::print_deltas;
use crate::artifacts::diff::tree_diff::diff_snapshots;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::log::path_filter::PathFilter;
use crate::artifacts::merge::apply::apply_merge_outcome;
use crate::artifacts::merge::tree_merge::{MergeLabels, TreeMerge};
use crate::artifacts::objects::commit::IdentityRole;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use tracing::{debug, info};

impl Repository {
    fn stash_ref() -> SymRefName {
        SymRefName::new(STASH_REF_NAME.to_string())
    }

    /// Stash entries, oldest first
    fn stash_entries(&self) -> anyhow::Result<Vec<ReflogEntry>> {
        self.refs().read_reflog(&Self::stash_ref())
    }

    /// Reflog position and commit of `stash@{n}`
    fn stash_entry(&self, n: usize) -> anyhow::Result<(usize, ReflogEntry)> {
        let entries = self.stash_entries()?;
        if entries.is_empty() {
            anyhow::bail!("No stash entries found.");
        }

        let position = entries
            .len()
            .checked_sub(n + 1)
            .ok_or_else(|| anyhow::anyhow!("stash@{{{n}}} is not a valid reference"))?;
        Ok((position, entries[position].clone()))
    }

    /// `stash [push] [-m <message>]`
    pub async fn stash_push(&mut self, message: Option<&str>) -> anyhow::Result<()> {
        self.require_worktree()?;
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let info = self.status().initialize(&mut index).await?;
        if !info.conflicts.is_empty() {
            anyhow::bail!("could not save the current state: you have unmerged paths");
        }
        if info.is_clean() {
            writeln!(self.writer(), "No local changes to save")?;
            return Ok(());
        }

        let Some(head_oid) = self.refs().read_head()? else {
            anyhow::bail!("You do not have the initial commit yet");
        };
        let head = self
            .database()
            .parse_object_as_commit(&head_oid)?
            .ok_or_else(|| RepositoryError::ObjectNotFound(head_oid.to_string()))?;
        let branch = self
            .refs()
            .current_branch()?
            .map_or_else(|| "(no branch)".to_string(), |branch| branch.to_string());
        let position = format!("{}: {} {}", branch, head_oid.to_short_oid(), head.short_message());

        let index_tree = index.to_tree(self.database())?;
        let (index_oid, _) = self.write_commit(
            vec![head_oid.clone()],
            index_tree,
            &format!("index on {position}"),
        )?;

        let worktree_tree = self.worktree_tree(&index)?;
        let message = match message {
            Some(message) => format!("On {branch}: {message}"),
            None => format!("WIP on {position}"),
        };
        let (stash_oid, _) = self.write_commit(
            vec![head_oid.clone(), index_oid],
            worktree_tree,
            &message,
        )?;

        let previous = self.refs().try_resolve(&Self::stash_ref())?;
        self.refs().force_update(&Self::stash_ref(), &stash_oid)?;
        let identity = self.identity(IdentityRole::Committer)?.display();
        self.refs().append_reflog(
            &Self::stash_ref(),
            &ReflogEntry::new(
                previous.unwrap_or_else(ObjectId::null),
                stash_oid.clone(),
                identity,
                message.clone(),
            ),
        )?;
        info!(stash = %stash_oid, "stash saved");

        self.reset_hard_to(&mut index, Some(&head_oid))?;
        index.write_updates()?;

        writeln!(
            self.writer(),
            "Saved working directory and index state {message}"
        )?;

        Ok(())
    }

    /// Store the tracked files as they are on disk and return their tree
    fn worktree_tree(&self, index: &Index) -> anyhow::Result<ObjectId> {
        let mut worktree = index.clone();

        for path in index.tracked_paths() {
            let Some(stat) = self.workspace().try_stat_file(&path)? else {
                worktree.remove(&path)?;
                continue;
            };
            if index
                .entry_by_path(&path)
                .is_some_and(|entry| entry.stat_match(&stat) && entry.times_match(&stat))
            {
                continue;
            }

            let blob = self.workspace().parse_blob(&path)?;
            let blob_id = self.database().store(&blob)?;
            worktree.add(IndexEntry::new(path, blob_id, stat))?;
        }

        worktree.to_tree(self.database())
    }

    /// `stash list`
    pub fn stash_list(&self) -> anyhow::Result<()> {
        for (n, entry) in self.stash_entries()?.iter().rev().enumerate() {
            writeln!(self.writer(), "stash@{{{n}}}: {}", entry.message)?;
        }

        Ok(())
    }

    /// `stash show [<n>] [-p]`: the entry's changes against the commit it was made on
    pub async fn stash_show(&self, n: usize, patch: bool) -> anyhow::Result<()> {
        let (_, entry) = self.stash_entry(n)?;
        let stash = self
            .database()
            .parse_object_as_commit(&entry.new_oid)?
            .ok_or_else(|| RepositoryError::ObjectNotFound(entry.new_oid.to_string()))?;

        let old = TreeLike::Tree(stash.parent().cloned());
        let new = TreeLike::Tree(Some(entry.new_oid.clone()));
        let options = DiffOptions {
            format: if patch { OutputFormat::Patch } else { OutputFormat::Stat },
            ..DiffOptions::default()
        };

        let index = self.index();
        let index = index.lock().await;
        let loader = SnapshotLoader::new(self.database(), self.workspace(), &index);
        let changes = diff_snapshots(
            &loader.snapshot(&old)?,
            &loader.snapshot(&new)?,
            &PathFilter::empty(),
        );
        let deltas = build_deltas(changes, &options, |path, entry, is_new| {
            let side = if is_new { &new } else { &old };
            loader.load(side, path, entry)
        })?;

        let mut writer = self.writer();
        print_deltas(&mut **writer, &deltas, &options)?;

        Ok(())
    }

    /// `stash apply [<n>]`; false when the merge left conflicts
    pub async fn stash_apply(&mut self, n: usize) -> anyhow::Result<bool> {
        self.require_worktree()?;
        let (_, entry) = self.stash_entry(n)?;
        let stash = self
            .database()
            .parse_object_as_commit(&entry.new_oid)?
            .ok_or_else(|| RepositoryError::ObjectNotFound(entry.new_oid.to_string()))?;
        let Some(head_oid) = self.refs().read_head()? else {
            anyhow::bail!("You do not have the initial commit yet");
        };

        let labels = MergeLabels::new("Updated upstream", "Stashed changes");
        let outcome = TreeMerge::new(self.database(), labels.clone()).merge(
            stash.parent(),
            &head_oid,
            &entry.new_oid,
        )?;

        let head_tree = self.database().peel_to_tree(&head_oid)?;
        let current = self.database().flatten_tree(Some(&head_tree))?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;
        apply_merge_outcome(self, &mut index, &current, &outcome, "merge")?;

        if !outcome.is_clean() {
            index.write_updates()?;
            for line in outcome.messages(&labels) {
                writeln!(self.writer(), "{line}")?;
            }
            info!(conflicts = outcome.conflicts.len(), "stash applied with conflicts");
            return Ok(false);
        }

        // modifications come back unstaged, new files stay staged
        for (path, entry) in &current {
            if index
                .entry_by_path(path)
                .is_some_and(|staged| staged.oid != entry.oid)
            {
                index.add(IndexEntry::new(
                    path.clone(),
                    entry.oid.clone(),
                    EntryMetadata::unstated(entry.mode),
                ))?;
            }
        }
        self.refresh_index_stats(&mut index)?;
        index.write_updates()?;
        debug!(stash = %entry.new_oid, "stash applied");

        Ok(true)
    }

    /// `stash pop [<n>]`: apply, then drop unless the merge conflicted
    pub async fn stash_pop(&mut self, n: usize) -> anyhow::Result<bool> {
        if !self.stash_apply(n).await? {
            eprintln!("The stash entry is kept in case you need it again.");
            return Ok(false);
        }
        self.stash_drop(n)?;

        Ok(true)
    }

    /// `stash drop [<n>]`
    pub fn stash_drop(&mut self, n: usize) -> anyhow::Result<()> {
        let (position, entry) = self.stash_entry(n)?;
        let mut entries = self.stash_entries()?;
        entries.remove(position);

        match entries.last() {
            Some(top) => self.refs().force_update(&Self::stash_ref(), &top.new_oid)?,
            None => {
                self.refs().delete(&Self::stash_ref())?;
            }
        }
        self.refs().write_reflog(&Self::stash_ref(), &entries)?;
        info!(stash = %entry.new_oid, remaining = entries.len(), "stash dropped");

        writeln!(self.writer(), "Dropped refs/stash@{{{n}}} ({})", entry.new_oid)?;

        Ok(())
    }

    /// `stash clear`
    pub fn stash_clear(&mut self) -> anyhow::Result<()> {
        if self.refs().exists(&Self::stash_ref())? {
            self.refs().delete(&Self::stash_ref())?;
        }
        self.refs().write_reflog(&Self::stash_ref(), &[])?;

        Ok(())
    }
}

/// `stash@{n}` or a bare `n`
pub fn parse_stash_index(arg: Option<&str>) -> anyhow::Result<usize> {
    let Some(arg) = arg else {
        return Ok(0);
    };
    let digits = arg
        .strip_prefix("stash@{")
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(arg);

    digits
        .parse()
        .map_err(|_| anyhow::anyhow!("{arg} is not a valid reference"))
}
