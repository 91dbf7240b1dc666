use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::errors::RepositoryError;
use std::path::{Path, PathBuf};
use tracing::debug;

const MV_USAGE: &str = "usage: twig mv [-f] <source>... <destination>";

impl Repository {
    /// Move or rename tracked files and directories.
    ///
    /// With several sources, or when the destination is an existing directory, every source
    /// moves into it under its own name.
    pub async fn mv(&mut self, args: &[String], force: bool) -> anyhow::Result<()> {
        self.require_worktree()?;
        let (destination_arg, source_args) = match args.split_last() {
            Some((destination, sources)) if !sources.is_empty() => (destination, sources),
            _ => Err(RepositoryError::Usage(MV_USAGE.into()))?,
        };

        let destination = self.pathspecs(std::slice::from_ref(destination_arg))?.remove(0);
        let sources = self.pathspecs(source_args)?;
        let into_directory = destination.as_os_str().is_empty()
            || self.workspace().is_dir(&destination);
        if sources.len() > 1 && !into_directory {
            Err(RepositoryError::Usage(format!(
                "destination '{destination_arg}' is not a directory"
            )))?;
        }

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut moves = Vec::<(PathBuf, PathBuf)>::new();
        for (arg, source) in source_args.iter().zip(sources) {
            let target = match into_directory {
                true => match source.file_name() {
                    Some(name) => destination.join(name),
                    None => Err(RepositoryError::Usage(format!(
                        "bad source, source={arg}, destination={destination_arg}"
                    )))?,
                },
                false => destination.clone(),
            };

            if !self.workspace().exists(&source) {
                Err(RepositoryError::Usage(format!(
                    "bad source, source={}, destination={}",
                    source.display(),
                    target.display()
                )))?;
            }
            if index.entries_under_path(&source).is_empty() || source.as_os_str().is_empty() {
                Err(RepositoryError::UntrackedFile(source.display().to_string()))?;
            }
            if target.starts_with(&source) {
                Err(RepositoryError::Usage(format!(
                    "can not move directory into itself, source={}, destination={}",
                    source.display(),
                    target.display()
                )))?;
            }
            if self.workspace().exists(&target) {
                if !force || self.workspace().is_dir(&target) {
                    Err(RepositoryError::DestinationExists {
                        from: source.clone(),
                        destination: target.clone(),
                    })?;
                }
                self.workspace().remove_file(&target)?;
                index.remove(&target)?;
            }

            moves.push((source, target));
        }

        for (source, target) in moves {
            self.workspace().rename_path(&source, &target)?;

            for path in index.entries_under_path(&source) {
                let Some(entry) = index.entry_by_path(&path).cloned() else {
                    continue;
                };
                let moved = rebase_path(&path, &source, &target);
                let stat = self
                    .workspace()
                    .try_stat_file(&moved)?
                    .unwrap_or(entry.metadata.clone());

                index.remove(&path)?;
                index.add(IndexEntry::new(moved, entry.oid, stat))?;
            }
            debug!(from = %source.display(), to = %target.display(), "path moved");
        }

        index.write_updates()?;

        Ok(())
    }
}

/// `path` with its `from` prefix replaced by `to`
fn rebase_path(path: &Path, from: &Path, to: &Path) -> PathBuf {
    match path.strip_prefix(from) {
        Ok(rest) if rest.as_os_str().is_empty() => to.to_path_buf(),
        Ok(rest) => to.join(rest),
        Err(_) => path.to_path_buf(),
    }
}
