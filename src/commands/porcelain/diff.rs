use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::{Revision, RevisionRange};
use crate::artifacts::diff::diff_target::{DiffTarget, SnapshotLoader, TreeLike};
use crate::artifacts::diff::file_delta::{ChangeKind, DiffOptions, FileDelta, build_deltas};
use crate::artifacts::diff::format::print_deltas;
use crate::artifacts::diff::rename::DEFAULT_RENAME_THRESHOLD;
use crate::artifacts::diff::tree_diff::diff_snapshots;
use crate::artifacts::log::path_filter::PathFilter;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use std::io::Write;
use std::path::Path;
use tracing::debug;

impl Repository {
    /// `diff [--cached] [<commit> [<commit>]] [-- <paths>]`
    ///
    /// Arguments before `--` that do not name a revision are taken as paths when they exist
    /// in the working tree.
    pub async fn diff(
        &mut self,
        args: &[String],
        paths: &[String],
        cached: bool,
        options: &DiffOptions,
    ) -> anyhow::Result<()> {
        let mut revisions = Vec::new();
        let mut path_args = paths.to_vec();
        for arg in args {
            match self.names_revision(arg) {
                true if path_args.len() == paths.len() => revisions.push(arg.clone()),
                true => Err(RepositoryError::Usage(format!(
                    "bad revision '{arg}' after a path"
                )))?,
                false if !self.is_bare() && self.pathspecs(&[arg])?.iter().all(|path| {
                    self.workspace().exists(path)
                }) =>
                {
                    path_args.push(arg.clone());
                }
                false => Err(RepositoryError::UnknownRevision(arg.clone()))?,
            }
        }

        let (old, new) = self.diff_sides(&revisions, cached)?;
        if old == TreeLike::Index || new.is_worktree() || new == TreeLike::Index {
            self.require_worktree()?;
        }

        let mut options = options.clone();
        if options.renames.is_none() && self.config_flag("diff.renames", true)? {
            options.renames = Some(DEFAULT_RENAME_THRESHOLD);
        }
        let filter = PathFilter::new(match self.is_bare() {
            true => path_args.iter().map(Into::into).collect(),
            false => self.pathspecs(&path_args)?,
        });

        let index = self.index();
        let mut index = index.lock().await;
        if !self.is_bare() {
            index.rehydrate()?;
        }

        let loader = SnapshotLoader::new(self.database(), self.workspace(), &index);
        let changes = diff_snapshots(&loader.snapshot(&old)?, &loader.snapshot(&new)?, &filter);
        let deltas = build_deltas(changes, &options, |path, entry, is_new| {
            let side = if is_new { &new } else { &old };
            loader.load(side, path, entry)
        })?;
        debug!(?old, ?new, deltas = deltas.len(), "diff computed");

        let mut writer = self.writer();
        print_deltas(&mut **writer, &deltas, &options)?;

        Ok(())
    }

    fn names_revision(&self, arg: &str) -> bool {
        if let Some((from, to)) = arg.split_once("..") {
            return [from, to]
                .iter()
                .all(|side| side.is_empty() || self.names_revision(side));
        }

        Revision::try_parse(arg)
            .and_then(|revision| revision.resolve(self))
            .is_ok()
    }

    fn diff_sides(
        &self,
        revisions: &[String],
        cached: bool,
    ) -> anyhow::Result<(TreeLike, TreeLike)> {
        let resolve = |arg: &str| -> anyhow::Result<ObjectId> {
            Revision::try_parse(arg)?.resolve(self)
        };

        match revisions {
            [] if cached => Ok((TreeLike::Tree(self.refs().read_head()?), TreeLike::Index)),
            [] => Ok((TreeLike::Index, TreeLike::Worktree)),
            [range] if range.contains("..") => {
                let range = RevisionRange::try_parse_args(std::slice::from_ref(range))?;
                let (includes, excludes) = range.resolve(self)?;
                match (excludes.first(), includes.first()) {
                    (Some(old), Some(new)) => Ok((
                        TreeLike::Tree(Some(old.clone())),
                        TreeLike::Tree(Some(new.clone())),
                    )),
                    _ => Err(RepositoryError::Usage("invalid diff range".into()).into()),
                }
            }
            [commit] if cached => Ok((TreeLike::Tree(Some(resolve(commit)?)), TreeLike::Index)),
            [commit] => Ok((TreeLike::Tree(Some(resolve(commit)?)), TreeLike::Worktree)),
            [_, _] if cached => {
                Err(RepositoryError::Usage("--cached takes at most one commit".into()).into())
            }
            [old, new] => Ok((
                TreeLike::Tree(Some(resolve(old)?)),
                TreeLike::Tree(Some(resolve(new)?)),
            )),
            _ => Err(RepositoryError::Usage(
                "usage: twig diff [<options>] [<commit> [<commit>]] [--] [<path>...]".into(),
            )
            .into()),
        }
    }
}

/// `diff --no-index <a> <b>`: compare two files outside any repository.
///
/// Returns `false` when they differ, which the command reports through its exit status.
pub fn diff_no_index(
    writer: &mut dyn Write,
    paths: &[String],
    options: &DiffOptions,
) -> anyhow::Result<bool> {
    let [a, b] = paths else {
        return Err(
            RepositoryError::Usage("usage: twig diff --no-index <path> <path>".into()).into(),
        );
    };
    let old = DiffTarget::from_fs_path(Path::new(a))?;
    let new = DiffTarget::from_fs_path(Path::new(b))?;

    let Some(delta) = no_index_delta(old, new) else {
        return Ok(true);
    };
    let delta = match options.reverse {
        true => delta.reversed(),
        false => delta,
    };
    if delta.has_no_visible_changes(options) {
        return Ok(true);
    }
    print_deltas(writer, &[delta], options)?;

    Ok(false)
}

fn no_index_delta(old: DiffTarget, new: DiffTarget) -> Option<FileDelta> {
    let kind = match (old.exists(), new.exists()) {
        (false, false) => return None,
        (false, true) => ChangeKind::Added,
        (true, false) => ChangeKind::Deleted,
        (true, true) if old.oid == new.oid && old.mode == new.mode => return None,
        (true, true) if old.mode.map(|m| m.is_file()) != new.mode.map(|m| m.is_file()) => {
            ChangeKind::TypeChanged
        }
        (true, true) => ChangeKind::Modified,
    };

    // the missing side borrows the other's name so headers read `a/x b/x`
    let (old, new) = match kind {
        ChangeKind::Added => (DiffTarget::from_nothing(&new.file), new),
        ChangeKind::Deleted => {
            let new = DiffTarget::from_nothing(&old.file);
            (old, new)
        }
        _ => (old, new),
    };

    Some(FileDelta {
        kind,
        old,
        new,
        similarity: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::diff::file_delta::OutputFormat;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;

    fn options(format: OutputFormat) -> DiffOptions {
        colored::control::set_override(false);
        DiffOptions {
            format,
            ..DiffOptions::default()
        }
    }

    #[test]
    fn identical_files_report_no_difference() {
        let dir = TempDir::new().unwrap();
        dir.child("a.txt").write_str("same\n").unwrap();
        dir.child("b.txt").write_str("same\n").unwrap();
        let paths = [a_path(&dir, "a.txt"), a_path(&dir, "b.txt")];

        let mut out = Vec::new();
        let same = diff_no_index(&mut out, &paths, &options(OutputFormat::Patch)).unwrap();

        assert!(same);
        assert!(out.is_empty());
    }

    #[test]
    fn differing_files_print_a_patch() {
        let dir = TempDir::new().unwrap();
        dir.child("a.txt").write_str("one\ntwo\n").unwrap();
        dir.child("b.txt").write_str("one\n2\n").unwrap();
        let paths = [a_path(&dir, "a.txt"), a_path(&dir, "b.txt")];

        let mut out = Vec::new();
        let same = diff_no_index(&mut out, &paths, &options(OutputFormat::Patch)).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(!same);
        assert!(out.contains("@@ -1,2 +1,2 @@\n one\n-two\n+2\n"));
    }

    #[test]
    fn dev_null_reads_as_a_new_file() {
        let dir = TempDir::new().unwrap();
        dir.child("b.txt").write_str("fresh\n").unwrap();
        let paths = ["/dev/null".to_string(), a_path(&dir, "b.txt")];

        let mut out = Vec::new();
        let same = diff_no_index(&mut out, &paths, &options(OutputFormat::NameStatus)).unwrap();

        assert!(!same);
        assert_eq!(String::from_utf8(out).unwrap(), format!("A\t{}\n", paths[1]));
    }

    #[test]
    fn exactly_two_paths_are_required() {
        let err = diff_no_index(&mut Vec::new(), &["a".to_string()], &DiffOptions::default())
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RepositoryError>(),
            Some(RepositoryError::Usage(_))
        ));
    }

    fn a_path(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).display().to_string()
    }
}
