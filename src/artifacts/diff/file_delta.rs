//! File-level diff results
//!
//! A [`FileDelta`] pairs the two sides of one changed path, after rename detection. Line
//! diffs are computed on demand from the loaded contents.

use crate::artifacts::diff::diff_algorithm::Edit;
use crate::artifacts::diff::diff_target::DiffTarget;
use crate::artifacts::diff::hunk::{Hunks, LineDiffOptions, count_changes, diff_lines, split_lines};
use crate::artifacts::diff::rename::{RenameCandidate, detect_renames};
use crate::artifacts::diff::tree_diff::{ChangeSet, DiffFilter, TreeChangeType};
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::blob::is_binary;
use crate::artifacts::objects::object_id::SHORT_OID_LENGTH;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
    Renamed,
    TypeChanged,
}

impl ChangeKind {
    pub fn letter(&self) -> char {
        match self {
            ChangeKind::Added => 'A',
            ChangeKind::Deleted => 'D',
            ChangeKind::Modified => 'M',
            ChangeKind::Renamed => 'R',
            ChangeKind::TypeChanged => 'T',
        }
    }

    pub fn filter_flag(&self) -> DiffFilter {
        match self {
            ChangeKind::Added => DiffFilter::ADDED,
            ChangeKind::Deleted => DiffFilter::DELETED,
            ChangeKind::Modified => DiffFilter::MODIFIED,
            ChangeKind::Renamed => DiffFilter::RENAMED,
            ChangeKind::TypeChanged => DiffFilter::TYPE_CHANGED,
        }
    }
}

/// How a set of deltas is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Patch,
    Stat,
    ShortStat,
    NumStat,
    Summary,
    NameOnly,
    NameStatus,
    Raw,
    /// Compute only, print nothing
    Quiet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOptions {
    pub line: LineDiffOptions,
    /// `-a`: treat every file as text
    pub text: bool,
    /// Rename threshold in percent, `None` disables detection
    pub renames: Option<u8>,
    pub filter: DiffFilter,
    pub format: OutputFormat,
    pub reverse: bool,
    pub abbrev: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            line: LineDiffOptions::default(),
            text: false,
            renames: None,
            filter: DiffFilter::all(),
            format: OutputFormat::Patch,
            reverse: false,
            abbrev: SHORT_OID_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDelta {
    pub kind: ChangeKind,
    pub old: DiffTarget,
    pub new: DiffTarget,
    /// Percent, for renames
    pub similarity: Option<u8>,
}

impl FileDelta {
    pub fn path(&self) -> &Path {
        match self.kind {
            ChangeKind::Deleted => &self.old.file,
            _ => &self.new.file,
        }
    }

    /// `old => new` for renames, the path otherwise
    pub fn display_path(&self) -> String {
        match self.kind {
            ChangeKind::Renamed => {
                format!("{} => {}", self.old.file.display(), self.new.file.display())
            }
            _ => self.path().display().to_string(),
        }
    }

    pub fn is_binary(&self, options: &DiffOptions) -> bool {
        !options.text && (is_binary(&self.old.data) || is_binary(&self.new.data))
    }

    pub fn content_changed(&self) -> bool {
        self.old.oid != self.new.oid
    }

    pub fn mode_changed(&self) -> bool {
        self.old.exists() && self.new.exists() && self.old.mode != self.new.mode
    }

    /// Swap the sides, as `-R` does
    pub fn reversed(self) -> Self {
        let kind = match self.kind {
            ChangeKind::Added => ChangeKind::Deleted,
            ChangeKind::Deleted => ChangeKind::Added,
            kind => kind,
        };

        Self {
            kind,
            old: self.new,
            new: self.old,
            similarity: self.similarity,
        }
    }

    pub fn line_edits(&self, options: &DiffOptions) -> Vec<Edit> {
        let a = split_lines(&self.old.data);
        let b = split_lines(&self.new.data);

        diff_lines(&a, &b, options.line.whitespace)
    }

    /// Inserted and deleted lines, `None` for binary content
    pub fn line_stats(&self, options: &DiffOptions) -> Option<(usize, usize)> {
        if self.is_binary(options) {
            return None;
        }

        Some(count_changes(&self.line_edits(options)))
    }

    /// Run `f` over the hunks of this delta
    pub fn with_hunks<R>(
        &self,
        options: &DiffOptions,
        f: impl FnOnce(Hunks<'_, '_>) -> R,
    ) -> R {
        let a = split_lines(&self.old.data);
        let b = split_lines(&self.new.data);
        let edits = diff_lines(&a, &b, options.line.whitespace);

        f(Hunks::new(&edits, &a, &b, options.line))
    }

    /// True when whitespace options hide every difference in the content
    pub fn has_no_visible_changes(&self, options: &DiffOptions) -> bool {
        self.kind == ChangeKind::Modified
            && !self.mode_changed()
            && !self.is_binary(options)
            && !self.line_edits(options).iter().any(Edit::is_change)
    }
}

/// Turn a path-level change set into file deltas.
///
/// `load` fetches the content of one side: `(path, entry, is_new_side)`.
pub fn build_deltas(
    changes: ChangeSet,
    options: &DiffOptions,
    mut load: impl FnMut(&Path, &DatabaseEntry, bool) -> anyhow::Result<Bytes>,
) -> anyhow::Result<Vec<FileDelta>> {
    let mut deltas = BTreeMap::<PathBuf, FileDelta>::new();
    let mut loaded = BTreeMap::<(PathBuf, bool), Bytes>::new();

    let mut load_side =
        |path: &Path, entry: &DatabaseEntry, is_new: bool| -> anyhow::Result<DiffTarget> {
            let key = (path.to_path_buf(), is_new);
            let data = match loaded.get(&key) {
                Some(data) => data.clone(),
                None => {
                    let data = load(path, entry, is_new)?;
                    loaded.insert(key, data.clone());
                    data
                }
            };
            Ok(DiffTarget::from_entry(path, entry, data))
        };

    let mut deleted = Vec::new();
    let mut added = Vec::new();
    for (path, change) in &changes {
        match change {
            TreeChangeType::Added(entry) => added.push((path.clone(), entry.clone())),
            TreeChangeType::Deleted(entry) => deleted.push((path.clone(), entry.clone())),
            TreeChangeType::Modified { .. } => {}
        }
    }

    if let Some(threshold) = options.renames
        && !deleted.is_empty()
        && !added.is_empty()
    {
        let to_candidates = |side: &[(PathBuf, DatabaseEntry)]| {
            side.iter()
                .map(|(path, entry)| RenameCandidate {
                    path: path.clone(),
                    oid: entry.oid.clone(),
                })
                .collect::<Vec<_>>()
        };
        let deleted_candidates = to_candidates(&deleted);
        let added_candidates = to_candidates(&added);
        let entries = deleted
            .iter()
            .map(|(path, entry)| ((path.clone(), false), entry.clone()))
            .chain(added.iter().map(|(path, entry)| ((path.clone(), true), entry.clone())))
            .collect::<BTreeMap<_, _>>();
        let is_added = added.iter().map(|(path, _)| path.clone()).collect::<BTreeSet<_>>();

        let pairs = detect_renames(&deleted_candidates, &added_candidates, threshold, |candidate| {
            let is_new = is_added.contains(&candidate.path);
            let entry = &entries[&(candidate.path.clone(), is_new)];
            Ok(load_side(&candidate.path, entry, is_new)?.data.to_vec())
        })?;

        for pair in pairs {
            let old_entry = entries[&(pair.from.clone(), false)].clone();
            let new_entry = entries[&(pair.to.clone(), true)].clone();
            deleted.retain(|(path, _)| *path != pair.from);
            added.retain(|(path, _)| *path != pair.to);

            let delta = FileDelta {
                kind: ChangeKind::Renamed,
                old: load_side(&pair.from, &old_entry, false)?,
                new: load_side(&pair.to, &new_entry, true)?,
                similarity: Some(pair.score),
            };
            deltas.insert(pair.to.clone(), delta);
        }
    }

    for (path, change) in changes {
        let delta = match change {
            TreeChangeType::Added(entry) if added.iter().any(|(p, _)| *p == path) => FileDelta {
                kind: ChangeKind::Added,
                old: DiffTarget::from_nothing(&path),
                new: load_side(&path, &entry, true)?,
                similarity: None,
            },
            TreeChangeType::Deleted(entry) if deleted.iter().any(|(p, _)| *p == path) => FileDelta {
                kind: ChangeKind::Deleted,
                old: load_side(&path, &entry, false)?,
                new: DiffTarget::from_nothing(&path),
                similarity: None,
            },
            TreeChangeType::Modified { ref old, ref new } => FileDelta {
                kind: match change.is_type_change() {
                    true => ChangeKind::TypeChanged,
                    false => ChangeKind::Modified,
                },
                old: load_side(&path, old, false)?,
                new: load_side(&path, new, true)?,
                similarity: None,
            },
            _ => continue,
        };
        deltas.insert(path, delta);
    }

    let deltas = deltas
        .into_values()
        .map(|delta| match options.reverse {
            true => delta.reversed(),
            false => delta,
        })
        .filter(|delta| options.filter.contains(delta.kind.filter_flag()))
        .collect();

    Ok(deltas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::diff::hunk::WhitespaceMode;
    use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
    use crate::artifacts::objects::blob::Blob;
    use crate::artifacts::objects::object::Object;
    use pretty_assertions::assert_eq;

    fn entry(content: &str) -> DatabaseEntry {
        DatabaseEntry::new(
            Blob::from_bytes(content.as_bytes().to_vec()).object_id().unwrap(),
            EntryMode::File(FileMode::Regular),
        )
    }

    fn contents() -> BTreeMap<&'static str, &'static str> {
        BTreeMap::from([
            ("old.txt", "1\n2\n3\n4\n"),
            ("new.txt", "1\n2\n3\nfour\n"),
            ("gone.txt", "bye\n"),
            ("mod.txt", "a\n"),
        ])
    }

    fn changes() -> ChangeSet {
        ChangeSet::from([
            (PathBuf::from("old.txt"), TreeChangeType::Deleted(entry("1\n2\n3\n4\n"))),
            (PathBuf::from("new.txt"), TreeChangeType::Added(entry("1\n2\n3\nfour\n"))),
            (PathBuf::from("gone.txt"), TreeChangeType::Deleted(entry("bye\n"))),
            (
                PathBuf::from("mod.txt"),
                TreeChangeType::Modified {
                    old: entry("a\n"),
                    new: entry("a \n"),
                },
            ),
        ])
    }

    fn build(options: &DiffOptions) -> Vec<FileDelta> {
        let contents = contents();
        build_deltas(changes(), options, |path, _, is_new| {
            let key = path.to_str().unwrap();
            Ok(Bytes::from(match (key, is_new) {
                ("mod.txt", true) => "a \n",
                _ => contents[key],
            }))
        })
        .unwrap()
    }

    #[test]
    fn renames_are_paired_only_when_enabled() {
        let plain = build(&DiffOptions::default());
        assert_eq!(
            plain.iter().map(|d| d.kind.letter()).collect::<String>(),
            "DMAD"
        );

        let renamed = build(&DiffOptions {
            renames: Some(50),
            ..Default::default()
        });
        let rename = renamed.iter().find(|d| d.kind == ChangeKind::Renamed).unwrap();
        assert_eq!(rename.display_path(), "old.txt => new.txt");
        assert_eq!(rename.similarity, Some(75));
        assert_eq!(renamed.len(), 3);
    }

    #[test]
    fn filters_and_reverse_apply_after_pairing() {
        let deletions = build(&DiffOptions {
            filter: DiffFilter::DELETED,
            ..Default::default()
        });
        assert_eq!(deletions.len(), 2);

        let reversed = build(&DiffOptions {
            filter: DiffFilter::ADDED,
            reverse: true,
            ..Default::default()
        });
        assert_eq!(
            reversed.iter().map(|d| d.path().to_path_buf()).collect::<Vec<_>>(),
            vec![PathBuf::from("gone.txt"), PathBuf::from("old.txt")]
        );
    }

    #[test]
    fn whitespace_only_changes_can_be_hidden() {
        let options = DiffOptions {
            line: LineDiffOptions {
                whitespace: WhitespaceMode::IgnoreAtEol,
                ..Default::default()
            },
            ..Default::default()
        };
        let deltas = build(&options);
        let modified = deltas.iter().find(|d| d.kind == ChangeKind::Modified).unwrap();

        assert!(modified.has_no_visible_changes(&options));
        assert!(!modified.has_no_visible_changes(&DiffOptions::default()));
        assert_eq!(modified.line_stats(&DiffOptions::default()), Some((1, 1)));
    }
}
