//! References (branches, tags, remote-tracking refs, HEAD, stash)
//!
//! A reference is a text file under the metadata root holding either a 40-character object id
//! or `ref: <other ref>`. Refs missing from the loose layout are looked up in `packed-refs`.
//!
//! ## Updates
//!
//! Writes take an exclusive `file_guard` lock on the ref file. `update` is a compare-and-swap:
//! the current value is read under the lock and the write only happens when it matches the
//! caller's expectation, which makes the ref write the commit point of every mutating command.

use crate::artifacts::branch::branch_name::{
    BranchName, HEADS_PREFIX, REMOTES_PREFIX, SymRefName, TAGS_PREFIX,
};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use anyhow::Context;
use derive_new::new;
use file_guard::Lock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::DerefMut;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;
use walkdir::WalkDir;

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

static SYMREF: LazyLock<Result<regex::Regex, regex::Error>> =
    LazyLock::new(|| regex::Regex::new(SYMREF_REGEX));

pub const HEAD_REF_NAME: &str = "HEAD";
pub const ORIG_HEAD_REF_NAME: &str = "ORIG_HEAD";
pub const STASH_REF_NAME: &str = "refs/stash";

/// Symbolic hops followed before giving up with `RefCycle`
pub const MAX_SYMREF_DEPTH: usize = 5;

#[derive(Debug, new)]
pub struct Refs {
    /// Metadata root (`.git`, or the repository itself when bare)
    path: Box<Path>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymRefOrOid {
    SymRef { sym_ref_name: SymRefName },
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn parse(content: &str) -> anyhow::Result<Option<SymRefOrOid>> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let symref = SYMREF
            .as_ref()
            .map_err(Clone::clone)
            .context("invalid symref regex")?;

        match symref.captures(content) {
            Some(symref_match) => Ok(Some(SymRefOrOid::SymRef {
                sym_ref_name: SymRefName::new(symref_match[1].to_string()),
            })),
            None => Ok(Some(SymRefOrOid::Oid(ObjectId::try_parse(
                content.to_string(),
            )?))),
        }
    }

    fn read_symref_or_oid(path: &Path) -> anyhow::Result<Option<SymRefOrOid>> {
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ref file at {:?}", path))?;
        Self::parse(&content)
    }
}

/// One line of a reflog: `<old> <new> <identity>\t<message>`
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct ReflogEntry {
    pub old_oid: ObjectId,
    pub new_oid: ObjectId,
    /// `Name <email> <seconds> <±hhmm>`
    pub identity: String,
    pub message: String,
}

impl ReflogEntry {
    fn parse(line: &str) -> anyhow::Result<Self> {
        let (head, message) = line.split_once('\t').unwrap_or((line, ""));
        let mut parts = head.splitn(3, ' ');
        let old_oid = parts.next().context("reflog entry without old id")?;
        let new_oid = parts.next().context("reflog entry without new id")?;
        let identity = parts.next().unwrap_or_default();

        Ok(ReflogEntry {
            old_oid: ObjectId::try_parse(old_oid.to_string())?,
            new_oid: ObjectId::try_parse(new_oid.to_string())?,
            identity: identity.to_string(),
            message: message.to_string(),
        })
    }

    fn serialize(&self) -> String {
        format!(
            "{} {} {}\t{}\n",
            self.old_oid, self.new_oid, self.identity, self.message
        )
    }
}

impl Refs {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value stored for `name`, loose file first, then `packed-refs`
    pub fn read_raw(&self, name: &SymRefName) -> anyhow::Result<Option<SymRefOrOid>> {
        match SymRefOrOid::read_symref_or_oid(&self.path.join(name.as_ref_path()))? {
            Some(value) => Ok(Some(value)),
            None => Ok(self
                .packed_refs()?
                .remove(name.as_ref_path())
                .map(SymRefOrOid::Oid)),
        }
    }

    /// Follow the symbolic chain starting at `name` and return the last name in it.
    ///
    /// The terminal ref does not have to exist (an unborn branch is a valid terminal).
    pub fn terminal(&self, name: &SymRefName) -> anyhow::Result<SymRefName> {
        let mut current = name.clone();

        for _ in 0..=MAX_SYMREF_DEPTH {
            match self.read_raw(&current)? {
                Some(SymRefOrOid::SymRef { sym_ref_name }) => current = sym_ref_name,
                Some(SymRefOrOid::Oid(_)) | None => return Ok(current),
            }
        }

        Err(RepositoryError::RefCycle(name.to_string()))?
    }

    pub fn resolve(&self, name: &SymRefName) -> anyhow::Result<ObjectId> {
        let terminal = self.terminal(name)?;

        match self.read_raw(&terminal)? {
            Some(SymRefOrOid::Oid(oid)) => Ok(oid),
            _ => Err(RepositoryError::RefNotFound(name.to_string()))?,
        }
    }

    /// `resolve` with a missing ref mapped to `None`
    pub fn try_resolve(&self, name: &SymRefName) -> anyhow::Result<Option<ObjectId>> {
        match self.resolve(name) {
            Ok(oid) => Ok(Some(oid)),
            Err(err) if matches!(
                err.downcast_ref::<RepositoryError>(),
                Some(RepositoryError::RefNotFound(_))
            ) =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn exists(&self, name: &SymRefName) -> anyhow::Result<bool> {
        Ok(self.read_raw(name)?.is_some())
    }

    /// Expand a short name the way git does: the name itself, then under `refs/`,
    /// `refs/tags/`, `refs/heads/`, `refs/remotes/` and finally `refs/remotes/<name>/HEAD`.
    pub fn dwim(&self, short_name: &str) -> anyhow::Result<Option<SymRefName>> {
        let candidates = [
            short_name.to_string(),
            format!("refs/{short_name}"),
            format!("{TAGS_PREFIX}{short_name}"),
            format!("{HEADS_PREFIX}{short_name}"),
            format!("{REMOTES_PREFIX}{short_name}"),
            format!("{REMOTES_PREFIX}{short_name}/HEAD"),
        ];

        for candidate in candidates {
            let is_full_name = candidate.starts_with("refs/")
                || candidate.chars().all(|c| c.is_ascii_uppercase() || c == '_');
            let name = SymRefName::new(candidate);
            if is_full_name && self.exists(&name)? {
                return Ok(Some(name));
            }
        }

        Ok(None)
    }

    /// Ref HEAD ends up at: `refs/heads/<branch>` when attached, `HEAD` when detached
    pub fn current_ref(&self) -> anyhow::Result<SymRefName> {
        self.terminal(&SymRefName::head())
    }

    /// Branch HEAD is attached to, if any
    pub fn current_branch(&self) -> anyhow::Result<Option<BranchName>> {
        let current_ref = self.current_ref()?;
        if current_ref.is_branch() {
            Ok(Some(BranchName::try_parse_sym_ref_name(&current_ref)?))
        } else {
            Ok(None)
        }
    }

    pub fn is_current_branch(&self, branch_name: &BranchName) -> anyhow::Result<bool> {
        Ok(self.current_branch()?.as_ref() == Some(branch_name))
    }

    pub fn is_head_detached(&self) -> anyhow::Result<bool> {
        Ok(self.current_ref()?.is_detached_head())
    }

    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        self.try_resolve(&SymRefName::head())
    }

    pub fn set_head_symbolic(&self, branch_name: &BranchName) -> anyhow::Result<()> {
        debug!(branch = %branch_name, "attaching HEAD");
        self.update_ref_file(
            &self.head_path(),
            format!("ref: {}\n", branch_name.to_sym_ref_name()),
        )
    }

    /// Point `name` at another ref, as `refs/remotes/origin/HEAD` does
    pub fn set_symbolic(&self, name: &SymRefName, target: &SymRefName) -> anyhow::Result<()> {
        debug!(name = %name, target = %target, "writing symbolic ref");
        self.update_ref_file(
            &self.path.join(name.as_ref_path()),
            format!("ref: {target}\n"),
        )
    }

    pub fn set_head_detached(&self, oid: &ObjectId) -> anyhow::Result<()> {
        debug!(oid = %oid, "detaching HEAD");
        self.update_ref_file(&self.head_path(), format!("{oid}\n"))
    }

    pub fn create(
        &self,
        name: &SymRefName,
        oid: &ObjectId,
        allow_overwrite: bool,
    ) -> anyhow::Result<()> {
        if !allow_overwrite && self.exists(name)? {
            Err(RepositoryError::RefExists(name.short_name().to_string()))?;
        }

        debug!(name = %name, oid = %oid, "creating ref");
        self.update_ref_file(&self.path.join(name.as_ref_path()), format!("{oid}\n"))
    }

    /// Compare-and-swap the terminal ref of `name` from `old` to `new`.
    ///
    /// `old = None` requires the ref to be absent.
    pub fn update(
        &self,
        name: &SymRefName,
        old: Option<&ObjectId>,
        new: &ObjectId,
    ) -> anyhow::Result<()> {
        let terminal = self.terminal(name)?;
        let path = self.path.join(terminal.as_ref_path());
        let packed = self.packed_refs()?.remove(terminal.as_ref_path());

        std::fs::create_dir_all(
            path.parent()
                .with_context(|| format!("invalid ref path {:?}", path))?,
        )?;

        let existed = path.is_file();
        let mut ref_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("failed to open ref file at {:?}", path))?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)?;

        let mut content = String::new();
        lock.deref_mut().read_to_string(&mut content)?;
        let current = match SymRefOrOid::parse(&content)? {
            Some(SymRefOrOid::Oid(oid)) => Some(oid),
            Some(SymRefOrOid::SymRef { .. }) | None => packed,
        };

        if current.as_ref() != old {
            drop(lock);
            if !existed {
                std::fs::remove_file(&path)?;
            }
            return Err(RepositoryError::RefChanged {
                name: terminal.to_string(),
                expected: old.map_or_else(|| "nothing".to_string(), ToString::to_string),
                actual: current.map_or_else(|| "nothing".to_string(), |oid| oid.to_string()),
            }
            .into());
        }

        lock.set_len(0)?;
        lock.deref_mut().seek(SeekFrom::Start(0))?;
        lock.deref_mut().write_all(format!("{new}\n").as_bytes())?;
        debug!(name = %terminal, new = %new, "ref updated");

        Ok(())
    }

    /// Point the terminal ref of `name` at `oid` whatever it held before
    pub fn force_update(&self, name: &SymRefName, oid: &ObjectId) -> anyhow::Result<()> {
        let terminal = self.terminal(name)?;
        debug!(name = %terminal, oid = %oid, "ref overwritten");
        self.update_ref_file(&self.path.join(terminal.as_ref_path()), format!("{oid}\n"))
    }

    pub fn delete(&self, name: &SymRefName) -> anyhow::Result<ObjectId> {
        if self.current_ref()? == *name && !name.is_detached_head() {
            Err(RepositoryError::RefInUse(name.short_name().to_string()))?;
        }

        let oid = match self.read_raw(name)? {
            Some(SymRefOrOid::Oid(oid)) => oid,
            Some(SymRefOrOid::SymRef { .. }) => self.resolve(name)?,
            None => Err(RepositoryError::RefNotFound(name.short_name().to_string()))?,
        };

        let ref_path = self.path.join(name.as_ref_path());
        if ref_path.is_file() {
            std::fs::remove_file(&ref_path)
                .with_context(|| format!("failed to delete ref file at {:?}", ref_path))?;
            self.prune_empty_parent_dirs(&ref_path)?;
        }
        self.remove_packed_ref(name)?;
        debug!(name = %name, oid = %oid, "ref deleted");

        Ok(oid)
    }

    /// Names under `prefix` (`refs/heads/`, `refs/tags/`, ...), lexicographic
    pub fn list(&self, prefix: &str) -> anyhow::Result<Vec<SymRefName>> {
        let mut names = BTreeSet::new();
        let root = self.path.join(prefix.trim_end_matches('/'));

        if root.is_dir() {
            for entry in WalkDir::new(&root).into_iter().filter_map(|entry| entry.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Ok(relative_path) = entry.path().strip_prefix(self.path.as_ref()) {
                    let name = relative_path
                        .components()
                        .map(|component| component.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    if !name.ends_with(".lock") {
                        names.insert(name);
                    }
                }
            }
        }

        names.extend(
            self.packed_refs()?
                .into_keys()
                .filter(|name| name.starts_with(prefix)),
        );

        Ok(names.into_iter().map(SymRefName::new).collect())
    }

    pub fn list_branches(&self) -> anyhow::Result<Vec<SymRefName>> {
        self.list(HEADS_PREFIX)
    }

    pub fn list_remote_branches(&self) -> anyhow::Result<Vec<SymRefName>> {
        self.list(REMOTES_PREFIX)
    }

    /// Object id to names pointing at it, HEAD included.
    ///
    /// `peel` maps a ref target to the commit it stands for, so annotated tags land on the
    /// commit they tag.
    pub fn reverse_refs(
        &self,
        peel: impl Fn(&ObjectId) -> anyhow::Result<ObjectId>,
    ) -> anyhow::Result<HashMap<ObjectId, Vec<SymRefName>>> {
        let mut reverse_refs: HashMap<ObjectId, Vec<SymRefName>> = HashMap::new();

        let names = self
            .list("refs/")?
            .into_iter()
            .filter(|name| name.as_ref_path() != STASH_REF_NAME)
            .chain(std::iter::once(SymRefName::head()));

        for name in names {
            if let Some(oid) = self.try_resolve(&name)? {
                reverse_refs.entry(peel(&oid)?).or_default().push(name);
            }
        }

        Ok(reverse_refs)
    }

    pub fn read_reflog(&self, name: &SymRefName) -> anyhow::Result<Vec<ReflogEntry>> {
        let log_path = self.reflog_path(name);
        if !log_path.is_file() {
            return Ok(Vec::new());
        }

        std::fs::read_to_string(&log_path)
            .with_context(|| format!("failed to read reflog at {:?}", log_path))?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(ReflogEntry::parse)
            .collect()
    }

    pub fn append_reflog(&self, name: &SymRefName, entry: &ReflogEntry) -> anyhow::Result<()> {
        let log_path = self.reflog_path(name);
        std::fs::create_dir_all(
            log_path
                .parent()
                .with_context(|| format!("invalid reflog path {:?}", log_path))?,
        )?;

        let mut log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("failed to open reflog at {:?}", log_path))?;
        let mut lock = file_guard::lock(&mut log_file, Lock::Exclusive, 0, 1)?;
        lock.deref_mut().write_all(entry.serialize().as_bytes())?;

        Ok(())
    }

    /// Replace the whole reflog; an empty list removes it
    pub fn write_reflog(&self, name: &SymRefName, entries: &[ReflogEntry]) -> anyhow::Result<()> {
        let log_path = self.reflog_path(name);

        if entries.is_empty() {
            if log_path.is_file() {
                std::fs::remove_file(&log_path)?;
                self.prune_empty_parent_dirs(&log_path)?;
            }
            return Ok(());
        }

        let content = entries
            .iter()
            .map(ReflogEntry::serialize)
            .collect::<String>();
        self.update_ref_file(&log_path, content)
    }

    fn reflog_path(&self, name: &SymRefName) -> Box<Path> {
        self.path
            .join("logs")
            .join(name.as_ref_path())
            .into_boxed_path()
    }

    fn update_ref_file(&self, path: &Path, raw_ref: String) -> anyhow::Result<()> {
        std::fs::create_dir_all(path.parent().with_context(|| {
            format!(
                "failed to create parent directories for ref file at {:?}",
                path
            )
        })?)?;

        let mut ref_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("failed to open ref file at {:?}", path))?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)?;
        lock.deref_mut().write_all(raw_ref.as_bytes())?;

        Ok(())
    }

    fn packed_refs(&self) -> anyhow::Result<BTreeMap<String, ObjectId>> {
        let packed_path = self.path.join("packed-refs");
        if !packed_path.is_file() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&packed_path)
            .with_context(|| format!("failed to read {:?}", packed_path))?;

        content
            .lines()
            .filter(|line| !line.starts_with('#') && !line.starts_with('^'))
            .filter_map(|line| line.split_once(' '))
            .map(|(oid, name)| Ok((name.trim().to_string(), ObjectId::try_parse(oid.to_string())?)))
            .collect()
    }

    fn remove_packed_ref(&self, name: &SymRefName) -> anyhow::Result<()> {
        let packed_path = self.path.join("packed-refs");
        if !packed_path.is_file() {
            return Ok(());
        }

        let content = std::fs::read_to_string(&packed_path)?;
        let mut kept = Vec::new();
        let mut skip_peeled = false;
        let mut removed = false;

        for line in content.lines() {
            if line.starts_with('^') && skip_peeled {
                continue;
            }
            skip_peeled = false;
            if line
                .split_once(' ')
                .is_some_and(|(_, ref_name)| ref_name.trim() == name.as_ref_path())
            {
                skip_peeled = true;
                removed = true;
                continue;
            }
            kept.push(line);
        }

        if removed {
            let mut content = kept.join("\n");
            content.push('\n');
            self.update_ref_file(&packed_path, content)?;
        }

        Ok(())
    }

    fn prune_empty_parent_dirs(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent()
            && parent != self.path.as_ref()
            && parent != self.refs_path().as_ref()
            && parent != self.heads_path().as_ref()
            && parent != self.path.join("refs").join("tags")
            && parent != self.path.join("logs").join("refs")
            && parent.read_dir()?.next().is_none()
        {
            std::fs::remove_dir(parent)
                .with_context(|| format!("failed to remove empty ref directory at {:?}", parent))?;
            self.prune_empty_parent_dirs(parent)?;
        }

        Ok(())
    }

    pub fn head_path(&self) -> Box<Path> {
        self.path.join(HEAD_REF_NAME).into_boxed_path()
    }

    pub fn refs_path(&self) -> Box<Path> {
        self.path.join("refs").into_boxed_path()
    }

    pub fn heads_path(&self) -> Box<Path> {
        self.refs_path().join("heads").into_boxed_path()
    }
}
