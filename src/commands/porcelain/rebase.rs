use crate::areas::database::CommitCache;
use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::diff::tree_diff::diff_snapshots;
use crate::artifacts::log::path_filter::PathFilter;
use crate::artifacts::log::rev_list::{RevWalk, RevWalkOptions};
use crate::artifacts::merge::apply::apply_merge_outcome;
use crate::artifacts::merge::bca_finder::BCAFinder;
use crate::artifacts::merge::tree_merge::{MergeLabels, TreeMerge};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::operation::state::{OperationState, RebaseState};
use crate::artifacts::status::ignore::IgnoreRules;
use crate::commands::porcelain::checkout::CheckoutOptions;
use crate::commands::porcelain::merge::conflict_listing;
use crate::errors::RepositoryError;
use tracing::{debug, info};

const CONFLICT_HINTS: &str = r#"hint: Resolve all conflicts manually, mark them as resolved with
hint: "twig add/rm <conflicted_files>", then run "twig rebase --continue".
hint: You can instead skip this commit: run "twig rebase --skip".
hint: To abort and get back to the state before "twig rebase", run "twig rebase --abort"."#;

/// Result of replaying one commit
enum Pick {
    Applied,
    Conflicted,
}

impl Repository {
    /// `rebase [--onto <newbase>] <upstream> [<branch>]`
    pub async fn rebase(
        &mut self,
        upstream: &str,
        branch: Option<&str>,
        onto: Option<&str>,
    ) -> anyhow::Result<()> {
        self.require_worktree()?;
        let state = self.operations().load()?;
        if !state.is_idle() {
            Err(RepositoryError::OperationInProgress(format!("a {}", state.name())))?;
        }

        if let Some(branch) = branch {
            self.checkout(Some(branch), &[], &CheckoutOptions::default())
                .await?;
        }
        self.require_clean_worktree().await?;

        let Some(head_oid) = self.refs().read_head()? else {
            anyhow::bail!("no commits to rebase on this branch");
        };
        let upstream_oid = Revision::try_parse(upstream)?.resolve(self)?;
        let onto_oid = match onto {
            Some(onto) => Revision::try_parse(onto)?.resolve(self)?,
            None => upstream_oid.clone(),
        };
        let current_branch = self.refs().current_branch()?;

        let commit_cache = CommitCache::new();
        let database = self.database();
        let finder = BCAFinder::new(|oid| commit_cache.get_or_load_slim_commit(database, oid));
        if onto_oid == upstream_oid && finder.is_ancestor(&upstream_oid, &head_oid)? {
            let name = current_branch
                .as_ref()
                .map_or_else(|| "HEAD".to_string(), BranchName::to_string);
            writeln!(self.writer(), "Current branch {name} is up to date.")?;
            return Ok(());
        }

        let todo = self.commits_to_replay(&head_oid, &upstream_oid)?;
        let head_name = current_branch.map(|branch| branch.to_sym_ref_name().to_string());
        self.record_orig_head(&head_oid)?;

        {
            let index = self.index();
            let mut index = index.lock().await;
            index.rehydrate()?;
            self.move_detached_head(&mut index, &head_oid, &onto_oid)?;
            index.write_updates()?;
        }

        info!(onto = %onto_oid, commits = todo.len(), "rebase started");
        let rebase = RebaseState::new(head_name, head_oid, onto_oid, todo);
        self.operations().save(&state.start_rebase(rebase.clone())?)?;

        self.run_rebase(rebase).await
    }

    /// Commits reachable from `head` but not from `upstream`, oldest first; merges are dropped
    fn commits_to_replay(
        &self,
        head: &ObjectId,
        upstream: &ObjectId,
    ) -> anyhow::Result<Vec<ObjectId>> {
        let walk = RevWalk::new(
            self.database(),
            std::slice::from_ref(head),
            std::slice::from_ref(upstream),
            RevWalkOptions::default(),
        )?;

        let mut todo = Vec::new();
        for item in walk {
            let (oid, commit) = item?;
            if !commit.is_merge() {
                todo.push(oid);
            }
        }
        todo.reverse();

        Ok(todo)
    }

    async fn require_clean_worktree(&self) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;
        let info = self.status().initialize(&mut index).await?;

        if !info.is_clean() {
            anyhow::bail!(
                "cannot rebase: You have unstaged changes.\nerror: Please commit or stash them."
            );
        }

        Ok(())
    }

    fn move_detached_head(
        &self,
        index: &mut Index,
        from: &ObjectId,
        to: &ObjectId,
    ) -> anyhow::Result<()> {
        let database = self.database();
        let from_tree = database.peel_to_tree(from)?;
        let to_tree = database.peel_to_tree(to)?;
        let changes = diff_snapshots(
            &database.flatten_tree(Some(&from_tree))?,
            &database.flatten_tree(Some(&to_tree))?,
            &PathFilter::empty(),
        );

        let ignore = IgnoreRules::load(self.workspace(), self.git_dir())?;
        Migration::new(self, index, &ignore, changes)
            .for_operation("rebase")
            .apply_changes()?;
        self.refs().set_head_detached(to)?;

        Ok(())
    }

    /// Replay the remaining commits until done or stopped by a conflict
    async fn run_rebase(&mut self, mut rebase: RebaseState) -> anyhow::Result<()> {
        loop {
            let (next, advanced) = rebase.advance();
            rebase = advanced;

            let Some(oid) = next else {
                return self.finish_rebase(rebase);
            };
            eprintln!("Rebasing ({}/{})", rebase.done_count, rebase.total);
            self.operations().save(&OperationState::Rebase(rebase.clone()))?;

            match self.pick(&oid).await? {
                Pick::Applied => {
                    rebase = rebase.settle();
                    self.operations().save(&OperationState::Rebase(rebase.clone()))?;
                }
                Pick::Conflicted => {
                    let subject = self
                        .database()
                        .parse_object_as_commit(&oid)?
                        .map(|commit| commit.short_message())
                        .unwrap_or_default();
                    eprintln!("error: could not apply {}... {subject}", oid.to_short_oid());
                    eprintln!("{CONFLICT_HINTS}");
                    info!(%oid, "rebase stopped on conflicts");
                    return Ok(());
                }
            }
        }
    }

    /// Apply the change `oid` made to its parent on top of HEAD
    async fn pick(&mut self, oid: &ObjectId) -> anyhow::Result<Pick> {
        let commit = self
            .database()
            .parse_object_as_commit(oid)?
            .ok_or_else(|| RepositoryError::ObjectNotFound(oid.to_string()))?;
        let head_oid = self
            .refs()
            .read_head()?
            .ok_or_else(|| RepositoryError::UnknownRevision("HEAD".to_string()))?;

        let labels = MergeLabels::new(
            "HEAD",
            format!("{} ({})", oid.to_short_oid(), commit.short_message()),
        );
        let outcome = TreeMerge::new(self.database(), labels.clone()).merge(
            commit.parent(),
            &head_oid,
            oid,
        )?;
        let head_tree = self.database().peel_to_tree(&head_oid)?;
        let current = self.database().flatten_tree(Some(&head_tree))?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;
        apply_merge_outcome(self, &mut index, &current, &outcome, "rebase")?;

        if !outcome.is_clean() {
            index.write_updates()?;
            for line in outcome.messages(&labels) {
                writeln!(self.writer(), "{line}")?;
            }
            return Ok(Pick::Conflicted);
        }

        self.commit_replayed(&mut index, oid, &head_oid)?;
        index.write_updates()?;

        Ok(Pick::Applied)
    }

    /// Commit the index on HEAD with the author and message of `original`, unless the
    /// replayed change turned out empty
    fn commit_replayed(
        &self,
        index: &mut Index,
        original: &ObjectId,
        head: &ObjectId,
    ) -> anyhow::Result<()> {
        let commit = self
            .database()
            .parse_object_as_commit(original)?
            .ok_or_else(|| RepositoryError::ObjectNotFound(original.to_string()))?;
        let tree_oid = index.to_tree(self.database())?;
        if tree_oid == self.database().peel_to_tree(head)? {
            debug!(%original, "replayed change is empty, dropping it");
            return Ok(());
        }

        let (new_oid, _) = self.write_commit_as(
            vec![head.clone()],
            tree_oid,
            commit.author().clone(),
            commit.message(),
        )?;
        self.refs().update(&SymRefName::head(), Some(head), &new_oid)?;
        debug!(%original, replayed = %new_oid, "commit replayed");

        Ok(())
    }

    fn finish_rebase(&mut self, rebase: RebaseState) -> anyhow::Result<()> {
        let state = OperationState::Rebase(rebase);
        let (rebase, state) = state.finish_rebase()?;
        let new_head = self
            .refs()
            .read_head()?
            .unwrap_or_else(|| rebase.onto.clone());

        let updated = match &rebase.head_name {
            Some(head_name) => {
                let branch_ref = SymRefName::new(head_name.clone());
                let branch = BranchName::try_parse_sym_ref_name(&branch_ref)?;
                self.refs().force_update(&branch_ref, &new_head)?;
                self.refs().set_head_symbolic(&branch)?;
                head_name.clone()
            }
            None => "detached HEAD".to_string(),
        };
        self.operations().save(&state)?;
        info!(head = %new_head, "rebase finished");

        eprintln!("Successfully rebased and updated {updated}.");

        Ok(())
    }

    /// `rebase --continue`: commit the resolved pick and carry on
    pub async fn rebase_continue(&mut self) -> anyhow::Result<()> {
        self.require_worktree()?;
        let rebase = self.operations().load()?.into_rebase()?;

        if let Some(current) = rebase.current.clone() {
            let index = self.index();
            let mut index = index.lock().await;
            index.rehydrate()?;
            if index.has_conflicts() {
                Err(RepositoryError::UnresolvedConflicts(conflict_listing(
                    &index.conflicted_paths(),
                )))?;
            }

            let head_oid = self
                .refs()
                .read_head()?
                .ok_or_else(|| RepositoryError::UnknownRevision("HEAD".to_string()))?;
            self.commit_replayed(&mut index, &current, &head_oid)?;
            index.write_updates()?;
        }

        let rebase = rebase.settle();
        self.operations().save(&OperationState::Rebase(rebase.clone()))?;
        self.run_rebase(rebase).await
    }

    /// `rebase --skip`: drop the current pick and carry on
    pub async fn rebase_skip(&mut self) -> anyhow::Result<()> {
        self.require_worktree()?;
        let rebase = self.operations().load()?.into_rebase()?;
        let head_oid = self.refs().read_head()?;

        {
            let index = self.index();
            let mut index = index.lock().await;
            index.rehydrate()?;
            self.reset_hard_to(&mut index, head_oid.as_ref())?;
            index.write_updates()?;
        }

        let rebase = rebase.settle();
        self.operations().save(&OperationState::Rebase(rebase.clone()))?;
        self.run_rebase(rebase).await
    }

    /// `rebase --abort`: back to the original branch tip and working tree
    pub async fn rebase_abort(&mut self) -> anyhow::Result<()> {
        self.require_worktree()?;
        let (rebase, state) = self.operations().load()?.finish_rebase()?;

        {
            let index = self.index();
            let mut index = index.lock().await;
            index.rehydrate()?;
            self.reset_hard_to(&mut index, Some(&rebase.orig_head))?;
            index.write_updates()?;
        }

        match &rebase.head_name {
            Some(head_name) => {
                let branch_ref = SymRefName::new(head_name.clone());
                let branch = BranchName::try_parse_sym_ref_name(&branch_ref)?;
                self.refs().force_update(&branch_ref, &rebase.orig_head)?;
                self.refs().set_head_symbolic(&branch)?;
            }
            None => self.refs().set_head_detached(&rebase.orig_head)?,
        }
        self.operations().save(&state)?;
        info!(head = %rebase.orig_head, "rebase aborted");

        Ok(())
    }

    /// `rebase --quit`: forget the rebase, leaving HEAD and the working tree alone
    pub fn rebase_quit(&mut self) -> anyhow::Result<()> {
        let (_, state) = self.operations().load()?.finish_rebase()?;
        self.operations().save(&state)?;
        info!("rebase state dropped");

        Ok(())
    }
}
