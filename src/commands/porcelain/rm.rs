use crate::areas::repository::Repository;
use crate::artifacts::objects::object::Object;
use crate::errors::RepositoryError;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct RmOptions {
    /// Only unstage, leave the working tree alone
    pub cached: bool,
    pub recursive: bool,
    /// Skip the up-to-date checks
    pub force: bool,
    pub quiet: bool,
}

impl Repository {
    /// Remove paths from the index and, unless `cached`, from the working tree
    pub async fn rm(&mut self, paths: &[String], opts: &RmOptions) -> anyhow::Result<()> {
        self.require_worktree()?;
        let pathspecs = self.pathspecs(paths)?;
        let head_tree = match self.refs().read_head()? {
            Some(head) => {
                let tree_oid = self.database().peel_to_tree(&head)?;
                self.database().flatten_tree(Some(&tree_oid))?
            }
            None => Default::default(),
        };

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut targets = Vec::<PathBuf>::new();
        for (arg, spec) in paths.iter().zip(&pathspecs) {
            let tracked = index.entries_under_path(spec);
            if tracked.is_empty() {
                Err(RepositoryError::PathspecNotFound(arg.clone()))?;
            }
            if !opts.recursive && tracked.iter().any(|path| path != spec) {
                Err(RepositoryError::NotRecursive(arg.clone()))?;
            }
            targets.extend(tracked);
        }
        targets.sort();
        targets.dedup();

        if !opts.force {
            let mut staged_and_modified = Vec::new();
            let mut staged = Vec::new();
            let mut modified = Vec::new();

            for path in &targets {
                let Some(entry) = index.entry_by_path(path) else {
                    continue;
                };
                let in_head = head_tree.get(path).map(|head| head.oid == entry.oid);
                let differs_from_head = in_head != Some(true);
                let differs_from_worktree = self.worktree_differs(path, &entry.oid)?;

                if differs_from_head && differs_from_worktree && in_head.is_some() {
                    staged_and_modified.push(path.clone());
                } else if differs_from_head && !opts.cached {
                    staged.push(path.clone());
                } else if differs_from_worktree && !opts.cached {
                    modified.push(path.clone());
                }
            }

            let report = [
                (
                    staged_and_modified,
                    "has staged content different from both the\nfile and the HEAD:",
                    "(use -f to force removal)",
                ),
                (
                    staged,
                    "has changes staged in the index:",
                    "(use --cached to keep the file, or -f to force removal)",
                ),
                (
                    modified,
                    "has local modifications:",
                    "(use --cached to keep the file, or -f to force removal)",
                ),
            ]
            .into_iter()
            .filter(|(paths, _, _)| !paths.is_empty())
            .map(|(paths, reason, hint)| {
                let noun = if paths.len() == 1 { "file" } else { "files" };
                let listing = paths
                    .iter()
                    .map(|path| format!("    {}", path.display()))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("the following {noun} {reason}\n{listing}\n{hint}")
            })
            .collect::<Vec<_>>();

            if !report.is_empty() {
                anyhow::bail!(report.join("\nerror: "));
            }
        }

        for path in &targets {
            index.remove(path)?;
            if !opts.cached && self.workspace().exists(path) {
                self.workspace().remove_file(path)?;
            }
            if !opts.quiet {
                writeln!(self.writer(), "rm '{}'", path.display())?;
            }
        }
        debug!(removed = targets.len(), cached = opts.cached, "paths removed");

        index.write_updates()?;

        Ok(())
    }

    /// Whether the working tree copy of `path` is missing or hashes differently from `oid`
    fn worktree_differs(
        &self,
        path: &Path,
        oid: &crate::artifacts::objects::object_id::ObjectId,
    ) -> anyhow::Result<bool> {
        if self.workspace().try_stat_file(path)?.is_none() {
            return Ok(false);
        }

        Ok(self.workspace().parse_blob(path)?.object_id()? != *oid)
    }
}
