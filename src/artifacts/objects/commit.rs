//! Commit object
//!
//! Commits record a snapshot of the repository:
//! - a tree object ID (directory snapshot)
//! - parent commit ID(s) (history)
//! - author and committer identities
//! - the commit message
//!
//! ## Format
//!
//! ```text
//! commit <size>\0
//! tree <tree-sha>
//! parent <parent-sha>
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//!
//! <commit message>
//! ```
//!
//! Headers this crate does not understand (`gpgsig`, `encoding`, ...) are skipped when reading.

use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::io::BufRead;

/// Which identity an environment lookup is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityRole {
    Author,
    Committer,
}

impl IdentityRole {
    fn env_prefix(&self) -> &'static str {
        match self {
            IdentityRole::Author => "GIT_AUTHOR",
            IdentityRole::Committer => "GIT_COMMITTER",
        }
    }
}

/// Author, committer or tagger identity
///
/// Contains name, email, and timestamp with timezone information.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    email: String,
    timestamp: chrono::DateTime<chrono::FixedOffset>,
}

impl Author {
    /// Create an identity stamped with the current time
    pub fn new(name: String, email: String) -> Self {
        Author {
            name,
            email,
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(
        name: String,
        email: String,
        timestamp: chrono::DateTime<chrono::FixedOffset>,
    ) -> Self {
        Author {
            name,
            email,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// `Name <email@example.com>`
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    /// `Name <email> <unix-seconds> <±hhmm>`, the serialized form
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    /// Load an identity from `GIT_<ROLE>_NAME`, `GIT_<ROLE>_EMAIL` and `GIT_<ROLE>_DATE`.
    ///
    /// Missing name or email fall back to `fallback` (usually `user.name`/`user.email` from
    /// the configuration); a missing date means now.
    pub fn load_from_env(
        role: IdentityRole,
        fallback: Option<(String, String)>,
    ) -> anyhow::Result<Self> {
        let prefix = role.env_prefix();
        let env_name = std::env::var(format!("{prefix}_NAME")).ok();
        let env_email = std::env::var(format!("{prefix}_EMAIL")).ok();

        let (name, email) = match (env_name, env_email, fallback) {
            (Some(name), Some(email), _) => (name, email),
            (name, email, Some((fallback_name, fallback_email))) => (
                name.unwrap_or(fallback_name),
                email.unwrap_or(fallback_email),
            ),
            (None, _, None) => anyhow::bail!(
                "{prefix}_NAME not set\n\n*** Please tell me who you are.\n\nRun\n\
                 \n  git config user.name \"Your Name\"\
                 \n  git config user.email \"you@example.com\""
            ),
            (_, None, None) => anyhow::bail!("{prefix}_EMAIL not set"),
        };

        let timestamp = std::env::var(format!("{prefix}_DATE"))
            .ok()
            .and_then(|date_str| parse_date(&date_str));

        match timestamp {
            Some(ts) => Ok(Author::new_with_timestamp(name, email, ts)),
            None => Ok(Author::new(name, email)),
        }
    }

    /// `Mon Jan 1 12:34:56 2024 +0000`
    pub fn readable_timestamp(&self) -> String {
        self.timestamp
            .format("%a %b %-d %H:%M:%S %Y %z")
            .to_string()
    }

    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.timestamp
    }
}

/// Accepts RFC 2822, `%Y-%m-%d %H:%M:%S %z`, ISO 8601 and git's raw `<seconds> <±hhmm>`
fn parse_date(date_str: &str) -> Option<chrono::DateTime<chrono::FixedOffset>> {
    let date_str = date_str.trim();

    chrono::DateTime::parse_from_rfc2822(date_str)
        .or_else(|_| chrono::DateTime::parse_from_str(date_str, "%Y-%m-%d %H:%M:%S %z"))
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(date_str))
        .ok()
        .or_else(|| {
            let (seconds, zone) = date_str.trim_start_matches('@').split_once(' ')?;
            parse_raw_timestamp(seconds.parse().ok()?, zone)
        })
}

fn parse_raw_timestamp(seconds: i64, zone: &str) -> Option<chrono::DateTime<chrono::FixedOffset>> {
    let (sign, digits) = match zone.split_at_checked(1)? {
        ("-", digits) => (-1, digits),
        ("+", digits) => (1, digits),
        _ => return None,
    };
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    let offset = chrono::FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;

    Some(chrono::DateTime::from_timestamp(seconds, 0)?.with_timezone(&offset))
}

impl TryFrom<&str> for Author {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Format: "name <email> timestamp timezone"
        let email_start = value
            .find('<')
            .ok_or_else(|| anyhow::anyhow!("Invalid identity: missing '<'"))?;
        let email_end = value
            .rfind('>')
            .ok_or_else(|| anyhow::anyhow!("Invalid identity: missing '>'"))?;

        let name = value[..email_start].trim().to_string();
        let email = value[email_start + 1..email_end].to_string();

        let (seconds, zone) = value[email_end + 1..]
            .trim()
            .split_once(' ')
            .ok_or_else(|| anyhow::anyhow!("Invalid identity: missing timestamp"))?;
        let seconds = seconds
            .parse::<i64>()
            .map_err(|_| anyhow::anyhow!("Invalid timestamp"))?;
        let timestamp = parse_raw_timestamp(seconds, zone.trim())
            .ok_or_else(|| anyhow::anyhow!("Invalid timezone"))?;

        Ok(Author {
            name,
            email,
            timestamp,
        })
    }
}

/// Slim representation of a commit
///
/// Only what graph algorithms need: identity, parents and the committer timestamp.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SlimCommit {
    pub oid: ObjectId,
    pub parents: Vec<ObjectId>,
    pub timestamp: chrono::DateTime<chrono::FixedOffset>,
}

impl PartialOrd for SlimCommit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SlimCommit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| other.oid.cmp(&self.oid))
    }
}

/// Commit object
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    /// Empty for a root commit, several for merges
    parents: Vec<ObjectId>,
    tree_oid: ObjectId,
    author: Author,
    committer: Author,
    message: String,
}

impl Commit {
    /// Create a commit whose committer is its author
    pub fn new(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Author,
        message: String,
    ) -> Self {
        Commit {
            parents,
            tree_oid,
            author: author.clone(),
            committer: author,
            message,
        }
    }

    pub fn new_with_committer(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Author,
        committer: Author,
        message: String,
    ) -> Self {
        Commit {
            parents,
            tree_oid,
            author,
            committer,
            message,
        }
    }

    /// First line of the message, as shown by `log --oneline`
    pub fn short_message(&self) -> String {
        self.message.lines().next().unwrap_or("").to_string()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn committer(&self) -> &Author {
        &self.committer
    }

    /// Committer time, the key history walks order by
    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.committer.timestamp()
    }

    pub fn to_slim(&self, oid: ObjectId) -> SlimCommit {
        SlimCommit {
            oid,
            parents: self.parents.clone(),
            timestamp: self.timestamp(),
        }
    }

    fn payload(&self) -> String {
        let mut payload = format!("tree {}\n", self.tree_oid);
        for parent in &self.parents {
            payload.push_str(&format!("parent {parent}\n"));
        }
        payload.push_str(&format!("author {}\n", self.author.display()));
        payload.push_str(&format!("committer {}\n", self.committer.display()));
        payload.push('\n');
        payload.push_str(&self.message);

        payload
    }
}

impl Packable for Commit {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        Ok(frame(self.object_type(), self.payload().as_bytes()))
    }
}

impl Unpackable for Commit {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;
        let content = String::from_utf8_lossy(&content);

        let (headers, message) = content
            .split_once("\n\n")
            .unwrap_or((content.as_ref(), ""));

        let mut tree_oid = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in headers.lines() {
            if let Some(tree) = line.strip_prefix("tree ") {
                tree_oid = Some(ObjectId::try_parse(tree.to_string())?);
            } else if let Some(parent) = line.strip_prefix("parent ") {
                parents.push(ObjectId::try_parse(parent.to_string())?);
            } else if let Some(identity) = line.strip_prefix("author ") {
                author = Some(Author::try_from(identity)?);
            } else if let Some(identity) = line.strip_prefix("committer ") {
                committer = Some(Author::try_from(identity)?);
            }
        }

        let tree_oid = tree_oid.context("Invalid commit object: missing tree line")?;
        let author = author.context("Invalid commit object: missing author line")?;
        let committer = committer.unwrap_or_else(|| author.clone());

        Ok(Self::new_with_committer(
            parents,
            tree_oid,
            author,
            committer,
            message.to_string(),
        ))
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn display(&self) -> String {
        self.payload()
    }
}
