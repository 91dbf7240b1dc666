//! Carry a tree merge into the index and the working tree
//!
//! Clean paths go through a checkout migration from the current tree; conflicted paths keep our
//! entry during the migration and then receive their working tree content and the base/ours/
//! theirs index stages. Local changes on any touched path abort before anything is written.

use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::diff::tree_diff::{ChangeSet, Snapshot, TreeChangeType, diff_snapshots};
use crate::artifacts::log::path_filter::PathFilter;
use crate::artifacts::merge::tree_merge::TreeMergeOutcome;
use crate::artifacts::status::ignore::IgnoreRules;
use tracing::debug;

pub fn apply_merge_outcome(
    repository: &Repository,
    index: &mut Index,
    current: &Snapshot,
    outcome: &TreeMergeOutcome,
    operation: &'static str,
) -> anyhow::Result<()> {
    let mut target = outcome.merged.clone();
    let mut guards = ChangeSet::new();

    for (path, conflict) in &outcome.conflicts {
        match (&conflict.ours, &conflict.theirs) {
            (Some(ours), _) => {
                target.insert(path.clone(), ours.clone());
                guards.insert(
                    path.clone(),
                    TreeChangeType::Modified {
                        old: ours.clone(),
                        new: ours.clone(),
                    },
                );
            }
            (None, Some(theirs)) => {
                guards.insert(path.clone(), TreeChangeType::Added(theirs.clone()));
            }
            (None, None) => {}
        }
    }

    let changes = diff_snapshots(current, &target, &PathFilter::empty());
    let ignore = IgnoreRules::load(repository.workspace(), repository.git_dir())?;
    Migration::new(repository, index, &ignore, changes)
        .for_operation(operation)
        .protect(guards)
        .apply_changes()?;

    for (path, conflict) in &outcome.conflicts {
        if let Some((content, mode)) = &conflict.worktree {
            repository.workspace().write_file(path, content, *mode)?;
        }
        index.add_conflict(
            path,
            conflict.base.as_ref(),
            conflict.ours.as_ref(),
            conflict.theirs.as_ref(),
        )?;
    }
    debug!(
        operation,
        conflicts = outcome.conflicts.len(),
        "merge result applied"
    );

    Ok(())
}
