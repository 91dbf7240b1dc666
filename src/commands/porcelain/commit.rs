use crate::areas::repository::Repository;
use crate::artifacts::operation::state::OperationState;
use crate::commands::porcelain::merge::conflict_listing;
use crate::errors::RepositoryError;
use tracing::info;

impl Repository {
    /// Record the index as a new commit on HEAD.
    ///
    /// A pending merge is concluded: its head becomes the second parent and its message is the
    /// default. Returns `false` when there was nothing to commit.
    pub async fn commit(&mut self, message: Option<&str>) -> anyhow::Result<bool> {
        self.require_worktree()?;
        let state = self.operations().load()?;
        let merge = match &state {
            OperationState::Merge(merge) => Some(merge.clone()),
            _ => None,
        };

        let message = match (message, &merge) {
            (Some(message), _) => message.to_string(),
            (None, Some(merge)) => merge.message.clone(),
            (None, None) => String::new(),
        };
        if message.trim().is_empty() {
            anyhow::bail!("Aborting commit due to empty commit message.");
        }

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        if index.has_conflicts() {
            Err(RepositoryError::UnresolvedConflicts(conflict_listing(
                &index.conflicted_paths(),
            )))?;
        }

        let head = self.refs().read_head()?;
        if merge.is_none() {
            let tree_oid = index.to_tree(self.database())?;
            let head_tree = match &head {
                Some(head) => Some(self.database().peel_to_tree(head)?),
                None => None,
            };
            let unchanged = match &head_tree {
                Some(head_tree) => *head_tree == tree_oid,
                None => index.merged_entries().next().is_none(),
            };

            if unchanged {
                let info = self.status().initialize(&mut index).await?;
                let summary = match info.unstaged.is_empty() && info.untracked.is_empty() {
                    true => "nothing to commit, working tree clean",
                    false if info.unstaged.is_empty() => {
                        "nothing added to commit but untracked files present \
                         (use \"twig add\" to track)"
                    }
                    false => "no changes added to commit (use \"twig add\")",
                };
                writeln!(self.writer(), "{summary}")?;
                index.write_updates()?;
                return Ok(false);
            }
        }

        let mut parents = head.iter().cloned().collect::<Vec<_>>();
        if let Some(merge) = &merge {
            parents.push(merge.merge_head.clone());
        }
        let root = parents.is_empty();
        let (commit_oid, commit) = self.commit_index(&mut index, parents, &message)?;
        index.write_updates()?;

        if merge.is_some() {
            let (_, state) = state.finish_merge()?;
            self.operations().save(&state)?;
        }
        info!(oid = %commit_oid, merge = merge.is_some(), "committed");

        let location = match self.refs().current_branch()? {
            Some(branch) => branch.to_string(),
            None => "detached HEAD".to_string(),
        };
        let root = if root { " (root-commit)" } else { "" };
        writeln!(
            self.writer(),
            "[{location}{root} {}] {}",
            commit_oid.to_short_oid(),
            commit.short_message()
        )?;

        Ok(true)
    }
}
