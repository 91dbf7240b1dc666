use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::RevisionRange;
use crate::artifacts::diff::file_delta::{DiffOptions, build_deltas};
use crate::artifacts::diff::format::print_deltas;
use crate::artifacts::diff::tree_diff::diff_snapshots;
use crate::artifacts::log::decoration::Decorations;
use crate::artifacts::log::path_filter::PathFilter;
use crate::artifacts::log::rev_list::{RevWalk, RevWalkOptions};
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::{CommitDecoration, CommitDisplayFormat};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub oneline: bool,
    pub abbrev_commit: bool,
    pub format: CommitDisplayFormat,
    pub decorate: CommitDecoration,
    pub patch: bool,
    pub max_count: Option<usize>,
}

impl Repository {
    /// Show the commits selected by `revisions` (HEAD by default), newest first
    pub fn log(
        &self,
        revisions: &[String],
        paths: &[String],
        opts: &LogOptions,
    ) -> anyhow::Result<()> {
        let revisions = match revisions.is_empty() {
            true => vec!["HEAD".to_string()],
            false => revisions.to_vec(),
        };
        // an unborn branch has no history to show
        if revisions == ["HEAD"] && self.refs().read_head()?.is_none() {
            return Ok(());
        }

        let (includes, excludes) = RevisionRange::try_parse_args(&revisions)?.resolve(self)?;
        let paths = match self.is_bare() {
            true => paths.iter().map(PathBuf::from).collect(),
            false => self.pathspecs(paths)?,
        };
        let decorations = Decorations::load(self)?;
        let walk = RevWalk::new(
            self.database(),
            &includes,
            &excludes,
            RevWalkOptions {
                max_count: opts.max_count,
                paths: paths.clone(),
            },
        )?;

        for (position, item) in walk.enumerate() {
            let (oid, commit) = item?;
            let format = match opts.oneline {
                true => CommitDisplayFormat::OneLine,
                false => opts.format,
            };
            if position > 0 && format != CommitDisplayFormat::OneLine {
                writeln!(self.writer())?;
            }

            self.display_commit(&oid, &commit, &decorations, format, opts)?;
            if opts.patch {
                self.show_commit_patch(&commit, &paths, format)?;
            }
        }

        Ok(())
    }

    fn display_commit(
        &self,
        oid: &ObjectId,
        commit: &Commit,
        decorations: &Decorations,
        format: CommitDisplayFormat,
        opts: &LogOptions,
    ) -> anyhow::Result<()> {
        // --oneline implies abbreviated ids
        let abbreviate = opts.abbrev_commit || opts.oneline;
        let id = match abbreviate {
            true => oid.to_short_oid(),
            false => oid.to_string(),
        };
        let decoration = decorations.render(oid, opts.decorate);

        match format {
            CommitDisplayFormat::OneLine => {
                writeln!(
                    self.writer(),
                    "{}{decoration} {}",
                    id.yellow(),
                    commit.short_message()
                )?;
                Ok(())
            }
            _ => self.show_commit_block(commit, &id, &decoration, format),
        }
    }

    /// Every layout but `oneline`: a header block, then the indented message
    fn show_commit_block(
        &self,
        commit: &Commit,
        id: &str,
        decoration: &str,
        format: CommitDisplayFormat,
    ) -> anyhow::Result<()> {
        writeln!(self.writer(), "{}{decoration}", format!("commit {id}").yellow())?;
        if commit.is_merge() {
            let parents = commit
                .parents()
                .iter()
                .map(ObjectId::to_short_oid)
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(self.writer(), "Merge: {parents}")?;
        }
        let (author, committer) = (commit.author(), commit.committer());
        match format {
            CommitDisplayFormat::Full => {
                writeln!(self.writer(), "Author: {}", author.display_name())?;
                writeln!(self.writer(), "Commit: {}", committer.display_name())?;
            }
            CommitDisplayFormat::Fuller => {
                writeln!(self.writer(), "Author:     {}", author.display_name())?;
                writeln!(self.writer(), "AuthorDate: {}", author.readable_timestamp())?;
                writeln!(self.writer(), "Commit:     {}", committer.display_name())?;
                writeln!(self.writer(), "CommitDate: {}", committer.readable_timestamp())?;
            }
            _ => {
                writeln!(self.writer(), "Author: {}", author.display_name())?;
                writeln!(self.writer(), "Date:   {}", author.readable_timestamp())?;
            }
        }
        writeln!(self.writer())?;
        for message_line in commit.message().lines() {
            writeln!(self.writer(), "    {}", message_line)?;
        }

        Ok(())
    }

    /// Patch against the first parent; merges show nothing, as git does by default
    fn show_commit_patch(
        &self,
        commit: &Commit,
        paths: &[PathBuf],
        format: CommitDisplayFormat,
    ) -> anyhow::Result<()> {
        if commit.is_merge() {
            return Ok(());
        }

        let database = self.database();
        let parent_tree = match commit.parent() {
            Some(parent) => Some(database.peel_to_tree(parent)?),
            None => None,
        };
        let old = database.flatten_tree(parent_tree.as_ref())?;
        let new = database.flatten_tree(Some(commit.tree_oid()))?;
        let changes = diff_snapshots(&old, &new, &PathFilter::new(paths.to_vec()));

        let options = DiffOptions::default();
        let deltas = build_deltas(changes, &options, |_, entry, _| {
            database.load_blob_bytes(&entry.oid)
        })?;

        if format != CommitDisplayFormat::OneLine && !deltas.is_empty() {
            writeln!(self.writer())?;
        }
        let mut writer = self.writer();
        print_deltas(&mut **writer, &deltas, &options)?;

        Ok(())
    }
}
