use crate::areas::refs::STASH_REF_NAME;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::artifacts::branch::{ANCESTOR_REGEX, PARENT_REGEX, REF_ALIASES, STASH_REGEX};
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::RepositoryError;
use anyhow::Context;
use std::sync::LazyLock;

static PARENT: LazyLock<Result<regex::Regex, regex::Error>> =
    LazyLock::new(|| regex::Regex::new(PARENT_REGEX));
static ANCESTOR: LazyLock<Result<regex::Regex, regex::Error>> =
    LazyLock::new(|| regex::Regex::new(ANCESTOR_REGEX));
static STASH: LazyLock<Result<regex::Regex, regex::Error>> =
    LazyLock::new(|| regex::Regex::new(STASH_REGEX));

/// Special refs living directly in the metadata root
const PSEUDO_REFS: [&str; 4] = ["HEAD", "ORIG_HEAD", "MERGE_HEAD", "FETCH_HEAD"];

fn compiled(
    regex: &'static LazyLock<Result<regex::Regex, regex::Error>>,
    pattern: &str,
) -> anyhow::Result<&'static regex::Regex> {
    regex
        .as_ref()
        .map_err(Clone::clone)
        .with_context(|| format!("invalid revision regex: {pattern}"))
}

/// A revision expression naming one object.
///
/// Supports:
/// - ref names: `main`, `feature/x`, `v1.0`, `origin/main`, `refs/heads/main`, `HEAD`, `ORIG_HEAD`
/// - aliases: `@` (resolves to `HEAD`)
/// - full and abbreviated object ids (4-40 hex digits, resolved when no ref matches)
/// - `<rev>^`, `<rev>^<n>` (n-th parent, `^0` is the commit itself)
/// - `<rev>~`, `<rev>~<n>` (n-th first-parent ancestor)
/// - `stash@{<n>}`
///
/// Names that look like object ids are parsed as `Ref` and only fall back to an object lookup
/// when no ref by that name exists, as git prefers refs on ambiguity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    Ref(String),
    Parent(Box<Revision>, usize),
    Ancestor(Box<Revision>, usize),
    Stash(usize),
}

impl Revision {
    pub fn try_parse(revision: &str) -> anyhow::Result<Revision> {
        if let Some(caps) = compiled(&PARENT, PARENT_REGEX)?.captures(revision) {
            let base_revision = Self::try_parse(&caps[1])?;
            let nth = Self::parse_count(&caps[2], revision)?;

            Ok(Revision::Parent(Box::new(base_revision), nth))
        } else if let Some(caps) = compiled(&ANCESTOR, ANCESTOR_REGEX)?.captures(revision) {
            let base_revision = Self::try_parse(&caps[1])?;
            let generations = Self::parse_count(&caps[2], revision)?;

            Ok(Revision::Ancestor(Box::new(base_revision), generations))
        } else if let Some(caps) = compiled(&STASH, STASH_REGEX)?.captures(revision) {
            let index = caps[1]
                .parse()
                .with_context(|| format!("failed to parse stash index in revision: {revision}"))?;

            Ok(Revision::Stash(index))
        } else {
            let resolved_name = *REF_ALIASES.get(revision).unwrap_or(&revision);
            if !PSEUDO_REFS.contains(&resolved_name) {
                BranchName::try_parse(resolved_name.to_string())?;
            }

            Ok(Revision::Ref(resolved_name.to_string()))
        }
    }

    /// An empty count means one: `HEAD^` is `HEAD^1`, `HEAD~` is `HEAD~1`
    fn parse_count(count: &str, revision: &str) -> anyhow::Result<usize> {
        if count.is_empty() {
            return Ok(1);
        }

        count
            .parse()
            .with_context(|| format!("failed to parse count in revision: {revision}"))
    }

    /// Object named by the revision, without peeling the outermost result
    pub fn resolve_object(&self, repository: &Repository) -> anyhow::Result<ObjectId> {
        match self {
            Revision::Ref(name) => Self::resolve_name(name, repository),
            Revision::Stash(index) => Self::resolve_stash(*index, repository),
            Revision::Parent(base_revision, 0) => base_revision.resolve(repository),
            Revision::Parent(base_revision, nth) => {
                let commit_oid = base_revision.resolve(repository)?;
                let commit = Self::load_commit(&commit_oid, repository)?;

                commit
                    .parents()
                    .get(nth - 1)
                    .cloned()
                    .ok_or_else(|| RepositoryError::UnknownRevision(self.to_string()).into())
            }
            Revision::Ancestor(base_revision, generations) => {
                let mut oid = base_revision.resolve(repository)?;
                for _ in 0..*generations {
                    let commit = Self::load_commit(&oid, repository)?;
                    oid = commit
                        .parent()
                        .cloned()
                        .ok_or_else(|| RepositoryError::UnknownRevision(self.to_string()))?;
                }

                Ok(oid)
            }
        }
    }

    /// Commit named by the revision; annotated tags are peeled
    pub fn resolve(&self, repository: &Repository) -> anyhow::Result<ObjectId> {
        let oid = self.resolve_object(repository)?;

        repository
            .database()
            .peel_to_commit(&oid)?
            .with_context(|| {
                let object_type = repository
                    .database()
                    .get_object_type(&oid)
                    .map_or_else(|_| "object".to_string(), |t| t.to_string());
                format!("object {} is a {}, not a commit", oid.to_short_oid(), object_type)
            })
    }

    fn load_commit(
        oid: &ObjectId,
        repository: &Repository,
    ) -> anyhow::Result<crate::artifacts::objects::commit::Commit> {
        let commit_oid = repository
            .database()
            .peel_to_commit(oid)?
            .with_context(|| format!("object {} is not a commit", oid))?;

        repository
            .database()
            .parse_object_as_commit(&commit_oid)?
            .with_context(|| format!("object {} is not a commit", commit_oid))
    }

    fn resolve_name(name: &str, repository: &Repository) -> anyhow::Result<ObjectId> {
        if let Some(sym_ref) = repository.refs().dwim(name)?
            && let Some(oid) = repository.refs().try_resolve(&sym_ref)?
        {
            return Ok(oid);
        }

        if Self::looks_like_oid(name) {
            return Self::resolve_oid(name, repository);
        }

        Err(RepositoryError::UnknownRevision(name.to_string()))?
    }

    fn resolve_stash(index: usize, repository: &Repository) -> anyhow::Result<ObjectId> {
        let entries = repository
            .refs()
            .read_reflog(&SymRefName::new(STASH_REF_NAME.to_string()))?;

        entries
            .iter()
            .rev()
            .nth(index)
            .map(|entry| entry.new_oid.clone())
            .ok_or_else(|| RepositoryError::UnknownRevision(format!("stash@{{{index}}}")).into())
    }

    fn resolve_oid(oid_str: &str, repository: &Repository) -> anyhow::Result<ObjectId> {
        if oid_str.len() == OBJECT_ID_LENGTH {
            let oid = ObjectId::try_parse(oid_str.to_string())?;
            if repository.database().exists(&oid) {
                return Ok(oid);
            }
            Err(RepositoryError::UnknownRevision(oid_str.to_string()))?;
        }

        let matches = repository.database().find_objects_by_prefix(oid_str)?;

        match matches.as_slice() {
            [] => Err(RepositoryError::UnknownRevision(oid_str.to_string()))?,
            [oid] => Ok(oid.clone()),
            candidates => {
                let mut error_msg = format!(
                    "short object ID {} is ambiguous\nhint: The candidates are:",
                    oid_str
                );
                for oid in candidates {
                    let object_type = repository
                        .database()
                        .get_object_type(oid)
                        .map_or(ObjectType::Blob.as_str(), |t| t.as_str());
                    error_msg
                        .push_str(&format!("\nhint:   {} {}", oid.to_short_oid(), object_type));
                }
                anyhow::bail!(error_msg)
            }
        }
    }

    fn looks_like_oid(s: &str) -> bool {
        s.len() >= 4 && s.len() <= OBJECT_ID_LENGTH && s.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Revision::Ref(name) => write!(f, "{name}"),
            Revision::Parent(base, 1) => write!(f, "{base}^"),
            Revision::Parent(base, nth) => write!(f, "{base}^{nth}"),
            Revision::Ancestor(base, generations) => write!(f, "{base}~{generations}"),
            Revision::Stash(index) => write!(f, "stash@{{{index}}}"),
        }
    }
}

/// Commit selection for walks: `a..b` is `^a b`, `^rev` excludes, anything else includes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionRange {
    pub includes: Vec<Revision>,
    pub excludes: Vec<Revision>,
}

impl RevisionRange {
    pub fn try_parse_args<S: AsRef<str>>(args: &[S]) -> anyhow::Result<Self> {
        let mut range = RevisionRange::default();

        for arg in args {
            let arg = arg.as_ref();
            if arg.contains("...") {
                Err(RepositoryError::Usage(format!(
                    "symmetric difference '{arg}' is not supported"
                )))?;
            }

            if let Some((from, to)) = arg.split_once("..") {
                range.excludes.push(Self::side_or_head(from)?);
                range.includes.push(Self::side_or_head(to)?);
            } else if let Some(excluded) = arg.strip_prefix('^') {
                range.excludes.push(Revision::try_parse(excluded)?);
            } else {
                range.includes.push(Revision::try_parse(arg)?);
            }
        }

        Ok(range)
    }

    /// Whether any argument looked like a range (`a..b` or `^rev`)
    pub fn is_range(&self) -> bool {
        !self.excludes.is_empty()
    }

    fn side_or_head(side: &str) -> anyhow::Result<Revision> {
        if side.is_empty() {
            Ok(Revision::Ref("HEAD".to_string()))
        } else {
            Revision::try_parse(side)
        }
    }

    pub fn resolve(
        &self,
        repository: &Repository,
    ) -> anyhow::Result<(Vec<ObjectId>, Vec<ObjectId>)> {
        let includes = self
            .includes
            .iter()
            .map(|revision| revision.resolve(repository))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let excludes = self
            .excludes
            .iter()
            .map(|revision| revision.resolve(repository))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok((includes, excludes))
    }
}
