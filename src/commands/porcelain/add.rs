use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object::Object;
use crate::artifacts::status::ignore::IgnoreRules;
use crate::errors::RepositoryError;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

impl Repository {
    /// Stage the given paths.
    ///
    /// Directories are expanded (skipping ignored files unless `force`), tracked files missing
    /// from the working tree are unstaged, and a pathspec matching nothing fails the whole
    /// command before the index is touched.
    pub async fn add(&mut self, paths: &[String], force: bool) -> anyhow::Result<()> {
        self.require_worktree()?;
        let pathspecs = self.pathspecs(paths)?;
        let ignore = IgnoreRules::load(self.workspace(), self.git_dir())?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut files = BTreeSet::<PathBuf>::new();
        let mut vanished = BTreeSet::<PathBuf>::new();

        for (arg, spec) in paths.iter().zip(pathspecs) {
            let tracked = index.entries_under_path(&spec);

            if self.workspace().exists(&spec) {
                let explicit_file = !self.workspace().is_dir(&spec);
                files.extend(
                    self.workspace()
                        .list_files(Some(&spec))?
                        .into_iter()
                        .filter(|file| explicit_file || force || !ignore.is_ignored(file, false)),
                );
            } else if tracked.is_empty() {
                Err(RepositoryError::PathspecNotFound(arg.clone()))?;
            }

            for path in tracked {
                if self.workspace().try_stat_file(&path)?.is_none() {
                    vanished.insert(path);
                }
            }
        }

        for path in &files {
            let blob = self.workspace().parse_blob(path)?;
            let stat = self.workspace().stat_file(path)?;
            let blob_id = blob.object_id()?;

            self.database().store(&blob)?;
            index.add(IndexEntry::new(path.clone(), blob_id, stat))?;
        }
        for path in &vanished {
            index.remove(path)?;
        }
        debug!(staged = files.len(), removed = vanished.len(), "paths added");

        index.write_updates()?;

        Ok(())
    }
}
