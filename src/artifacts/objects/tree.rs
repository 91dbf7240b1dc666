//! Tree object
//!
//! Trees are directory snapshots: a sorted list of `(name, mode, oid)` entries pointing at
//! blobs, subtrees or submodule commits.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`
//!
//! ## Ordering
//!
//! Entries are sorted the way git sorts them: a subtree compares as if its name ended in `/`,
//! so `a.txt` sorts before the directory `a` but after `a-b`. The map key carries that
//! trailing slash and the accessors strip it.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, DatabaseEntry>,
}

fn sort_key(name: &str, mode: &EntryMode) -> String {
    match mode.is_tree() {
        true => format!("{name}/"),
        false => name.to_string(),
    }
}

impl Tree {
    pub fn from_entries<N: AsRef<str>>(
        entries: impl IntoIterator<Item = (N, DatabaseEntry)>,
    ) -> Self {
        let mut tree = Self::default();
        for (name, entry) in entries {
            tree.insert(name.as_ref(), entry);
        }
        tree
    }

    /// Insert or replace `name`, whether it was a file or a directory before
    pub fn insert(&mut self, name: &str, entry: DatabaseEntry) {
        self.entries.remove(name);
        self.entries.remove(&format!("{name}/"));
        self.entries.insert(sort_key(name, &entry.mode), entry);
    }

    pub fn get(&self, name: &str) -> Option<&DatabaseEntry> {
        self.entries
            .get(name)
            .or_else(|| self.entries.get(&format!("{name}/")))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in tree order, names without the directory slash
    pub fn entries(&self) -> impl Iterator<Item = (&str, &DatabaseEntry)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.trim_end_matches('/'), entry))
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, DatabaseEntry)> {
        self.entries.into_iter().map(|(mut key, entry)| {
            if key.ends_with('/') {
                key.pop();
            }
            (key, entry)
        })
    }
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content = Vec::new();

        for (name, entry) in self.entries() {
            write!(content, "{} {}", entry.mode.as_str(), name)?;
            content.push(0);
            entry.oid.write_h40_to(&mut content)?;
        }

        Ok(frame(self.object_type(), &content))
    }
}

impl Unpackable for Tree {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut tree = Tree::default();
        let mut reader = reader;

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break;
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(anyhow::anyhow!("unexpected EOF in mode"));
            }

            let mode = EntryMode::from_octal_str(std::str::from_utf8(&mode_bytes)?)?;

            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                return Err(anyhow::anyhow!("unexpected EOF in name"));
            }
            let name = String::from_utf8_lossy(&name_bytes).into_owned();

            let oid =
                ObjectId::read_h40_from(&mut reader).context("unexpected EOF in object id")?;

            tree.entries
                .insert(sort_key(&name, &mode), DatabaseEntry::new(oid, mode));
        }

        Ok(tree)
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        self.entries()
            .map(|(name, entry)| {
                format!(
                    "{} {} {}\t{}",
                    entry.mode.padded(),
                    entry.mode.object_type(),
                    entry.oid,
                    name
                )
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}
