//! Index (staging area)
//!
//! The index tracks what the next commit will contain: one entry per `(path, stage)` with the
//! blob id, mode and the stat data cached when the file was last hashed. Stage 0 is a normal
//! entry; stages 1, 2 and 3 hold the base, ours and theirs versions of an unresolved conflict.
//!
//! ## Index File Format
//!
//! - Header: `DIRC`, version 2, entry count
//! - Entries: sorted by path bytes, then stage
//! - Extensions written by git (`TREE`, `REUC`, ...): skipped on read, dropped on write
//! - Checksum: SHA-1 of everything before it
//!
//! ## Data Structures
//!
//! - `entries`: `(path, stage)` to entry, in on-disk order
//! - `children`: directory to the tracked paths below it, for file/directory collision checks
//! - `tree_cache`: directory listings already stored as trees, reused by `to_tree`

use crate::areas::database::Database;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::{
    ENTRY_BLOCK, ENTRY_MIN_SIZE, EntryMetadata, IndexEntry, Stage,
};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{CHECKSUM_SIZE, EXTENSION_HEADER_SIZE, HEADER_SIZE};
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;
use byteorder::{ByteOrder, NetworkEndian};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::DerefMut;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// One child of a directory as it appears in the tree built for it
pub type TreeCacheKey = (String, EntryMode, ObjectId);

type EntryKey = (String, Stage);

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Stage-0 entries grouped by directory, the shape `to_tree` builds from
#[derive(Debug, Default)]
struct DirectoryNode {
    files: BTreeMap<String, (EntryMode, ObjectId)>,
    directories: BTreeMap<String, DirectoryNode>,
}

impl DirectoryNode {
    fn insert(&mut self, entry: &IndexEntry) {
        let components = entry
            .name
            .iter()
            .map(|component| component.to_string_lossy().into_owned())
            .collect::<Vec<_>>();

        if let Some((file_name, directories)) = components.split_last() {
            let mut node = self;
            for directory in directories {
                node = node.directories.entry(directory.clone()).or_default();
            }
            node.files
                .insert(file_name.clone(), (entry.mode(), entry.oid.clone()));
        }
    }
}

#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (typically `.git/index`)
    path: Box<Path>,
    entries: BTreeMap<EntryKey, IndexEntry>,
    children: BTreeMap<Box<Path>, BTreeSet<Box<Path>>>,
    header: IndexHeader,
    tree_cache: HashMap<Vec<TreeCacheKey>, ObjectId>,
    /// Modified since the last load or write
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            header: IndexHeader::empty(),
            tree_cache: HashMap::new(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Stage-0 entry of `path`
    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        self.entry_at(path, Stage::Merged)
    }

    pub fn entry_at(&self, path: &Path, stage: Stage) -> Option<&IndexEntry> {
        self.entries.get(&(path_key(path), stage))
    }

    /// Conflict stages of `path` as `[base, ours, theirs]`
    pub fn conflict_entries(&self, path: &Path) -> [Option<&IndexEntry>; 3] {
        Stage::CONFLICT_STAGES.map(|stage| self.entry_at(path, stage))
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.header = IndexHeader::empty();
        self.changed = false;
    }

    /// Load the index from disk under a shared lock and verify its checksum.
    ///
    /// A missing or empty file is an empty index.
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.clear();

        if !self.path().exists() {
            return Ok(());
        }

        let mut index_file = std::fs::OpenOptions::new().read(true).open(self.path())?;
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)?;

        if lock.deref_mut().metadata()?.len() == 0 {
            return Ok(());
        }

        let mut reader = Checksum::new(lock);
        let entries_count = self.parse_header(&mut reader)?;
        self.parse_entries(entries_count, &mut reader)?;
        Self::skip_extensions(&mut reader)?;

        reader.verify()?;
        trace!(entries = entries_count, "index loaded");

        Ok(())
    }

    /// Whether `path` is an entry (at any stage) or a directory holding entries
    pub fn is_directly_tracked(&self, path: &Path) -> bool {
        self.is_tracked_file(path) || self.children.contains_key(path)
    }

    pub fn is_tracked_file(&self, path: &Path) -> bool {
        let key = path_key(path);
        self.entries
            .range((key.clone(), Stage::Merged)..=(key, Stage::Theirs))
            .next()
            .is_some()
    }

    fn parse_header(&self, reader: &mut Checksum) -> anyhow::Result<u32> {
        let header_bytes = reader.read(HEADER_SIZE)?;
        let header = IndexHeader::deserialize(std::io::Cursor::new(header_bytes))?;
        header.validate()?;

        Ok(header.entries_count)
    }

    /// Entries are NUL-padded to 8 bytes, so read blocks until the last byte is a NUL
    fn parse_entries(&mut self, entries_count: u32, reader: &mut Checksum) -> anyhow::Result<()> {
        for _ in 0..entries_count {
            let mut entry_bytes = reader.read(ENTRY_MIN_SIZE)?.to_vec();

            while entry_bytes.last() != Some(&0) {
                entry_bytes.extend_from_slice(&reader.read(ENTRY_BLOCK)?);
            }

            let entry = IndexEntry::deserialize(std::io::Cursor::new(Bytes::from(entry_bytes)))?;
            self.store_entry(&entry)?;
        }

        self.header.entries_count = entries_count;

        Ok(())
    }

    /// Extensions still feed the checksum. An unknown one whose signature starts with an
    /// uppercase letter is optional; anything else cannot be ignored.
    fn skip_extensions(reader: &mut Checksum) -> anyhow::Result<()> {
        while reader.remaining()? > CHECKSUM_SIZE as u64 {
            let header = reader.read(EXTENSION_HEADER_SIZE)?;
            let signature = String::from_utf8_lossy(&header[..4]).into_owned();
            if !header[0].is_ascii_uppercase() {
                anyhow::bail!("index uses {signature} extension, which we do not understand");
            }

            let size = NetworkEndian::read_u32(&header[4..]);
            reader.read(size as usize)?;
            trace!(signature, size, "index extension skipped");
        }

        Ok(())
    }

    /// Drop every entry that would collide with `entry`: files sitting where its parent
    /// directories go, and anything below it if it used to be a directory.
    fn discard_conflicts(&mut self, entry: &IndexEntry) -> anyhow::Result<()> {
        for parent in entry.parent_dirs()? {
            self.remove_all_stages(parent)?;
        }
        self.remove_children(&entry.name)
    }

    fn store_entry(&mut self, entry: &IndexEntry) -> anyhow::Result<()> {
        for parent in entry.parent_dirs()? {
            self.children
                .entry(parent.to_owned().into_boxed_path())
                .or_default()
                .insert(entry.name.clone().into_boxed_path());
        }

        self.entries
            .insert((path_key(&entry.name), entry.stage), entry.clone());

        Ok(())
    }

    fn remove_children(&mut self, path_name: &Path) -> anyhow::Result<()> {
        if let Some(children) = self.children.remove(path_name) {
            for child in children {
                self.remove_all_stages(&child)?;
            }
        }

        Ok(())
    }

    fn remove_all_stages(&mut self, path_name: &Path) -> anyhow::Result<()> {
        let mut removed = None;
        for stage in [Stage::Merged, Stage::Base, Stage::Ours, Stage::Theirs] {
            if let Some(entry) = self.entries.remove(&(path_key(path_name), stage)) {
                removed = Some(entry);
            }
        }

        if let Some(entry) = removed {
            for parent in entry.parent_dirs()? {
                let parent = parent.to_owned().into_boxed_path();
                if let Some(children) = self.children.get_mut(&parent) {
                    children.remove(path_name);
                    if children.is_empty() {
                        self.children.remove(&parent);
                    }
                }
            }
        }

        Ok(())
    }

    fn touch(&mut self) {
        self.header.entries_count = self.entries.len() as u32;
        self.changed = true;
    }

    /// Upsert the stage-0 entry of a path, resolving any conflict it had
    pub fn add(&mut self, entry: IndexEntry) -> anyhow::Result<()> {
        let entry = entry.with_stage(Stage::Merged);
        self.remove_all_stages(&entry.name)?;
        self.discard_conflicts(&entry)?;
        self.store_entry(&entry)?;
        self.touch();

        Ok(())
    }

    /// Replace the path's entries with the given conflict stages
    pub fn add_conflict(
        &mut self,
        path: &Path,
        base: Option<&DatabaseEntry>,
        ours: Option<&DatabaseEntry>,
        theirs: Option<&DatabaseEntry>,
    ) -> anyhow::Result<()> {
        self.remove_all_stages(path)?;

        for (stage, side) in Stage::CONFLICT_STAGES.into_iter().zip([base, ours, theirs]) {
            if let Some(side) = side {
                let entry = IndexEntry::new(
                    path.to_path_buf(),
                    side.oid.clone(),
                    EntryMetadata::unstated(side.mode),
                )
                .with_stage(stage);
                self.discard_conflicts(&entry)?;
                self.store_entry(&entry)?;
            }
        }
        self.touch();

        Ok(())
    }

    /// Remove every stage of `path` and, for a directory, everything below it
    pub fn remove(&mut self, path: &Path) -> anyhow::Result<()> {
        self.remove_all_stages(path)?;
        self.remove_children(path)?;
        self.touch();

        Ok(())
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.keys().any(|(_, stage)| stage.is_conflict())
    }

    pub fn conflicted_paths(&self) -> Vec<PathBuf> {
        self.entries
            .values()
            .filter(|entry| entry.stage.is_conflict())
            .map(|entry| entry.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut index_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.path())?;
        let lock = file_guard::lock(&mut index_file, file_guard::Lock::Exclusive, 0, 1)?;

        let mut writer = Checksum::new(lock);

        self.header = IndexHeader::with_count(self.entries.len() as u32);
        writer.write(&self.header.serialize()?)?;

        for entry in self.entries.values() {
            writer.write(&entry.serialize()?)?;
        }

        writer.write_checksum()?;
        self.changed = false;
        debug!(entries = self.entries.len(), "index written");

        Ok(())
    }

    /// Refresh the cached stat of a stage-0 entry whose content is unchanged
    pub fn update_entry_stat(&mut self, entry: &IndexEntry, stat: EntryMetadata) {
        if let Some(existing_entry) = self.entries.get_mut(&(path_key(&entry.name), entry.stage))
        {
            existing_entry.metadata = stat;
            self.changed = true;
        }
    }

    /// All entries in on-disk order, conflict stages included
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Stage-0 entries only
    pub fn merged_entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries
            .values()
            .filter(|entry| !entry.stage.is_conflict())
    }

    /// Distinct tracked paths (any stage), in index order
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        let mut paths = self
            .entries
            .values()
            .map(|entry| entry.name.clone())
            .collect::<Vec<_>>();
        paths.dedup();
        paths
    }

    pub fn into_entries(self) -> impl Iterator<Item = IndexEntry> {
        self.entries.into_values()
    }

    /// Tracked paths equal to `path` or below it; `.` means everything
    pub fn entries_under_path(&self, path: &Path) -> Vec<PathBuf> {
        self.tracked_paths()
            .into_iter()
            .filter(|entry_path| path == Path::new(".") || entry_path.starts_with(path))
            .collect()
    }

    /// Reset the index to mirror `tree_oid` exactly; `None` empties it
    pub fn load_from_tree(
        &mut self,
        database: &Database,
        tree_oid: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        self.clear();

        for (path, entry) in database.flatten_tree(tree_oid)? {
            let index_entry = IndexEntry::new(path, entry.oid, EntryMetadata::unstated(entry.mode));
            self.store_entry(&index_entry)?;
        }
        self.touch();

        Ok(())
    }

    /// Build and store the trees for the stage-0 entries, bottom-up, and return the root id.
    ///
    /// A directory whose listing was built before is answered from the cache without being
    /// serialized or stored again.
    pub fn to_tree(&mut self, database: &Database) -> anyhow::Result<ObjectId> {
        let mut root = DirectoryNode::default();
        for entry in self.merged_entries() {
            root.insert(entry);
        }

        let mut tree_cache = std::mem::take(&mut self.tree_cache);
        let root_oid = Self::build_tree(&root, database, &mut tree_cache);
        self.tree_cache = tree_cache;

        root_oid
    }

    fn build_tree(
        node: &DirectoryNode,
        database: &Database,
        tree_cache: &mut HashMap<Vec<TreeCacheKey>, ObjectId>,
    ) -> anyhow::Result<ObjectId> {
        let mut listing = node
            .files
            .iter()
            .map(|(name, (mode, oid))| (name.clone(), *mode, oid.clone()))
            .collect::<Vec<TreeCacheKey>>();

        for (name, child) in &node.directories {
            let child_oid = Self::build_tree(child, database, tree_cache)?;
            listing.push((name.clone(), EntryMode::Directory, child_oid));
        }
        listing.sort();

        if let Some(oid) = tree_cache.get(&listing) {
            trace!(%oid, "tree reused from cache");
            return Ok(oid.clone());
        }

        let tree = Tree::from_entries(
            listing
                .iter()
                .map(|(name, mode, oid)| (name, DatabaseEntry::new(oid.clone(), *mode))),
        );
        let oid = database.store(&tree)?;
        tree_cache.insert(listing, oid.clone());

        Ok(oid)
    }

    /// Number of trees remembered by `to_tree`
    pub fn cached_tree_count(&self) -> usize {
        self.tree_cache.len()
    }
}
