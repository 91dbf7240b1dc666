use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::diff::tree_diff::diff_snapshots;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::log::path_filter::PathFilter;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::ignore::IgnoreRules;
use crate::errors::RepositoryError;
use tracing::info;

const DETACHMENT_NOTICE: &str = r#"
You are in 'detached HEAD' state. You can look around, make experimental
changes and commit them, and you can discard any commits you make in this
state without impacting any branches by switching back to a branch.

If you want to create a new branch to retain commits you create, you may
do so (now or later) by using -b with the checkout command. Example:

    twig checkout -b <new-branch-name>
"#;

#[derive(Debug, Clone, Default)]
pub struct CheckoutOptions {
    /// `-b <name>`, or `-B <name>` with `reset_branch`
    pub new_branch: Option<String>,
    pub reset_branch: bool,
    /// `-f`: throw away local changes
    pub force: bool,
}

/// Where HEAD ends up after a checkout
enum CheckoutTarget {
    Branch(BranchName),
    Detached,
}

impl Repository {
    /// `checkout [-f] <branch|commit>`, `checkout -b|-B <new> [<start>]` and
    /// `checkout [<commit>] -- <paths>`
    pub async fn checkout(
        &mut self,
        target: Option<&str>,
        paths: &[String],
        opts: &CheckoutOptions,
    ) -> anyhow::Result<()> {
        self.require_worktree()?;

        if !paths.is_empty() {
            return self.checkout_paths(target, paths).await;
        }
        if opts.new_branch.is_none()
            && let Some(target) = target
            && !self.names_commit(target)
            && self.pathspecs(&[target])?.iter().all(|path| self.workspace().exists(path))
        {
            return self.checkout_paths(None, &[target.to_string()]).await;
        }

        let state = self.operations().load()?;
        if !state.is_idle() {
            Err(RepositoryError::OperationInProgress(format!("a {}", state.name())))?;
        }

        let current_ref = self.refs().current_ref()?;
        let current_oid = self.refs().read_head()?;

        let (destination, target_oid) = match &opts.new_branch {
            Some(name) => {
                let branch = BranchName::try_parse(name.clone())?;
                if !opts.reset_branch && self.refs().exists(&branch.to_sym_ref_name())? {
                    Err(RepositoryError::RefExists(name.clone()))?;
                }
                let start = match target {
                    Some(target) => Some(self.resolve_checkout_target(target)?.1),
                    None => current_oid.clone(),
                };
                (CheckoutTarget::Branch(branch), start)
            }
            None => {
                let Some(target) = target else {
                    return Err(RepositoryError::Usage(
                        "usage: twig checkout [<options>] <branch>".to_string(),
                    )
                    .into());
                };
                let (destination, oid) = self.resolve_checkout_target(target)?;
                (destination, Some(oid))
            }
        };

        self.migrate_to(current_oid.as_ref(), target_oid.as_ref(), opts.force)
            .await?;

        let new_ref = match &destination {
            CheckoutTarget::Branch(branch) => {
                if let Some(oid) = &target_oid
                    && opts.new_branch.is_some()
                {
                    self.refs()
                        .create(&branch.to_sym_ref_name(), oid, opts.reset_branch)?;
                }
                self.refs().set_head_symbolic(branch)?;
                branch.to_sym_ref_name()
            }
            CheckoutTarget::Detached => {
                if let Some(oid) = &target_oid {
                    self.refs().set_head_detached(oid)?;
                }
                SymRefName::head()
            }
        };
        info!(
            target = %new_ref,
            oid = ?target_oid.as_ref().map(ToString::to_string),
            "checked out"
        );

        self.print_previous_head(&current_ref, current_oid.as_ref(), target_oid.as_ref())?;
        match &destination {
            CheckoutTarget::Detached => {
                if !current_ref.is_detached_head() {
                    eprintln!(
                        "Note: switching to '{}'.\n{}",
                        target.unwrap_or("HEAD"),
                        DETACHMENT_NOTICE
                    );
                }
                if let Some(oid) = &target_oid {
                    eprintln!("{}", self.head_position("HEAD is now at", oid)?);
                }
            }
            CheckoutTarget::Branch(branch) => match &opts.new_branch {
                Some(_) if opts.reset_branch && current_ref == new_ref => {
                    eprintln!("Reset branch '{branch}'")
                }
                Some(_) => eprintln!("Switched to a new branch '{branch}'"),
                None if current_ref == new_ref => eprintln!("Already on '{branch}'"),
                None => eprintln!("Switched to branch '{branch}'"),
            },
        }

        Ok(())
    }

    fn names_commit(&self, target: &str) -> bool {
        Revision::try_parse(target)
            .and_then(|revision| revision.resolve(self))
            .is_ok()
    }

    /// A local branch name wins over any other reading of `target`
    fn resolve_checkout_target(&self, target: &str) -> anyhow::Result<(CheckoutTarget, ObjectId)> {
        if let Ok(branch) = BranchName::try_parse(target.to_string())
            && let Some(oid) = self.refs().try_resolve(&branch.to_sym_ref_name())?
        {
            return Ok((CheckoutTarget::Branch(branch), oid));
        }

        let oid = Revision::try_parse(target)
            .and_then(|revision| revision.resolve(self))
            .map_err(|_| RepositoryError::PathspecNotFound(target.to_string()))?;

        Ok((CheckoutTarget::Detached, oid))
    }

    /// Carry the working tree and index from `current` to `target`
    async fn migrate_to(
        &self,
        current: Option<&ObjectId>,
        target: Option<&ObjectId>,
        force: bool,
    ) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        if force {
            self.reset_hard_to(&mut index, target)?;
            index.write_updates()?;
            return Ok(());
        }
        if current == target {
            return Ok(());
        }

        let database = self.database();
        let snapshot = |oid: Option<&ObjectId>| -> anyhow::Result<_> {
            let tree_oid = match oid {
                Some(oid) => Some(database.peel_to_tree(oid)?),
                None => None,
            };
            database.flatten_tree(tree_oid.as_ref())
        };
        let changes = diff_snapshots(&snapshot(current)?, &snapshot(target)?, &PathFilter::empty());

        let ignore = IgnoreRules::load(self.workspace(), self.git_dir())?;
        Migration::new(self, &mut index, &ignore, changes).apply_changes()?;
        index.write_updates()?;

        Ok(())
    }

    fn print_previous_head(
        &self,
        current_ref: &SymRefName,
        current_oid: Option<&ObjectId>,
        target_oid: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        if current_ref.is_detached_head()
            && let Some(current_oid) = current_oid
            && Some(current_oid) != target_oid
        {
            eprintln!(
                "{}",
                self.head_position("Previous HEAD position was", current_oid)?
            );
        }

        Ok(())
    }

    /// Restore paths from the index, or from `source` into both the index and the working tree
    async fn checkout_paths(
        &mut self,
        source: Option<&str>,
        paths: &[String],
    ) -> anyhow::Result<()> {
        let pathspecs = self.pathspecs(paths)?;
        let snapshot = match source {
            Some(source) => {
                let oid = Revision::try_parse(source)?.resolve(self)?;
                let tree_oid = self.database().peel_to_tree(&oid)?;
                Some(self.database().flatten_tree(Some(&tree_oid))?)
            }
            None => None,
        };

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut restored = 0;
        for (arg, spec) in paths.iter().zip(&pathspecs) {
            let entries = match &snapshot {
                Some(snapshot) => snapshot
                    .iter()
                    .filter(|(path, _)| path.starts_with(spec))
                    .map(|(path, entry)| (path.clone(), entry.oid.clone(), entry.mode))
                    .collect::<Vec<_>>(),
                None => {
                    let tracked = index.entries_under_path(spec);
                    if let Some(unmerged) = tracked
                        .iter()
                        .find(|path| index.entry_by_path(path).is_none())
                    {
                        anyhow::bail!("path '{}' is unmerged", unmerged.display());
                    }
                    tracked
                        .iter()
                        .filter_map(|path| index.entry_by_path(path))
                        .map(|entry| (entry.name.clone(), entry.oid.clone(), entry.mode()))
                        .collect()
                }
            };
            if entries.is_empty() {
                Err(RepositoryError::PathspecNotFound(arg.clone()))?;
            }

            for (path, oid, mode) in entries {
                let data = self.database().load_blob_bytes(&oid)?;
                self.workspace().write_file(&path, &data, mode)?;
                let stat = self.workspace().stat_file(&path)?;
                index.add(IndexEntry::new(path, oid, stat))?;
                restored += 1;
            }
        }
        info!(restored, "paths checked out");

        index.write_updates()?;

        Ok(())
    }
}
