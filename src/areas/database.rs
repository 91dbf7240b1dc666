//! Loose object database (`.git/objects`)
//!
//! Objects are zlib-compressed files named by their SHA-1 under a two-character fan-out
//! directory. Writes go to a temporary file in the fan-out directory and are renamed into
//! place, so readers never observe a partial object.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::{Commit, SlimCommit};
use crate::artifacts::objects::object::{Object, ObjectBox, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use crate::errors::RepositoryError;
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Upper bound on tag-to-tag hops while peeling
const MAX_PEEL_DEPTH: usize = 16;

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).is_file()
    }

    /// Raw framed bytes (`<type> <size>\0<payload>`) of an object
    pub fn load(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        let object_path = self.path.join(object_id.to_path());
        if !object_path.is_file() {
            Err(RepositoryError::ObjectNotFound(object_id.to_string()))?;
        }

        self.read_object(object_path)
    }

    /// Store an object unless it is already present and return its id
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let object_content = object.serialize()?;
        let object_id = crate::artifacts::objects::object::hash_bytes(&object_content);
        let object_path = self.path.join(object_id.to_path());

        if object_path.exists() {
            trace!(oid = %object_id, "object already stored");
            return Ok(object_id);
        }

        std::fs::create_dir_all(
            object_path
                .parent()
                .with_context(|| format!("Invalid object path {}", object_path.display()))?,
        )
        .with_context(|| format!("Unable to create object directory {}", object_path.display()))?;

        self.write_object(object_path, object_content)?;
        debug!(oid = %object_id, kind = %object.object_type(), "object stored");

        Ok(object_id)
    }

    pub fn parse_object(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        Ok(match object_type {
            ObjectType::Blob => ObjectBox::Blob(Box::new(Blob::deserialize(object_reader)?)),
            ObjectType::Tree => ObjectBox::Tree(Box::new(Tree::deserialize(object_reader)?)),
            ObjectType::Commit => {
                ObjectBox::Commit(Box::new(Commit::deserialize(object_reader)?))
            }
            ObjectType::Tag => ObjectBox::Tag(Box::new(Tag::deserialize(object_reader)?)),
        })
    }

    pub fn parse_object_as_blob(&self, object_id: &ObjectId) -> anyhow::Result<Option<Blob>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Blob => Ok(Some(Blob::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_tree(&self, object_id: &ObjectId) -> anyhow::Result<Option<Tree>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Tree => Ok(Some(Tree::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> anyhow::Result<Option<Commit>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Commit => Ok(Some(Commit::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_tag(&self, object_id: &ObjectId) -> anyhow::Result<Option<Tag>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Tag => Ok(Some(Tag::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    /// Blob content, failing when the id names something else
    pub fn load_blob_bytes(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        self.parse_object_as_blob(object_id)?
            .map(Blob::into_content)
            .with_context(|| format!("object {object_id} is not a blob"))
    }

    /// Follow annotated tags until something that is not a tag
    pub fn peel(&self, object_id: &ObjectId) -> anyhow::Result<(ObjectId, ObjectType)> {
        let mut current = object_id.clone();

        for _ in 0..MAX_PEEL_DEPTH {
            let object_type = self.get_object_type(&current)?;
            if object_type != ObjectType::Tag {
                return Ok((current, object_type));
            }
            let tag = self
                .parse_object_as_tag(&current)?
                .with_context(|| format!("object {current} is not a tag"))?;
            current = tag.target().clone();
        }

        anyhow::bail!("tag chain starting at {object_id} is too deep")
    }

    /// Peel tags and require a commit
    pub fn peel_to_commit(&self, object_id: &ObjectId) -> anyhow::Result<Option<ObjectId>> {
        match self.peel(object_id)? {
            (oid, ObjectType::Commit) => Ok(Some(oid)),
            _ => Ok(None),
        }
    }

    /// Tree of a commit, tag or tree id
    pub fn peel_to_tree(&self, object_id: &ObjectId) -> anyhow::Result<ObjectId> {
        match self.peel(object_id)? {
            (oid, ObjectType::Tree) => Ok(oid),
            (oid, ObjectType::Commit) => Ok(self
                .parse_object_as_commit(&oid)?
                .with_context(|| format!("object {oid} is not a commit"))?
                .tree_oid()
                .clone()),
            (oid, object_type) => anyhow::bail!("object {oid} is a {object_type}, not a tree"),
        }
    }

    /// Every non-tree entry reachable from `tree_oid`, keyed by its path from the root
    pub fn flatten_tree(
        &self,
        tree_oid: Option<&ObjectId>,
    ) -> anyhow::Result<BTreeMap<PathBuf, DatabaseEntry>> {
        let mut entries = BTreeMap::new();
        if let Some(tree_oid) = tree_oid {
            self.flatten_tree_into(tree_oid, Path::new(""), &mut entries)?;
        }

        Ok(entries)
    }

    fn flatten_tree_into(
        &self,
        tree_oid: &ObjectId,
        prefix: &Path,
        entries: &mut BTreeMap<PathBuf, DatabaseEntry>,
    ) -> anyhow::Result<()> {
        let tree = self
            .parse_object_as_tree(tree_oid)?
            .with_context(|| format!("object {tree_oid} is not a tree"))?;

        for (name, entry) in tree.into_entries() {
            let path = prefix.join(name);
            if entry.is_tree() {
                self.flatten_tree_into(&entry.oid, &path, entries)?;
            } else {
                entries.insert(path, entry);
            }
        }

        Ok(())
    }

    fn parse_object_as_bytes(
        &self,
        object_id: &ObjectId,
    ) -> anyhow::Result<(ObjectType, impl BufRead)> {
        let object_content = self.load(object_id)?;
        let mut object_reader = Cursor::new(object_content);

        let object_type = ObjectType::parse_object_type(&mut object_reader)?;

        Ok((object_type, object_reader))
    }

    fn read_object(&self, object_path: PathBuf) -> anyhow::Result<Bytes> {
        let object_content = std::fs::read(&object_path)
            .with_context(|| format!("Unable to read object file {}", object_path.display()))?;

        Self::decompress(object_content.into())
    }

    fn write_object(&self, object_path: PathBuf, object_content: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .with_context(|| format!("Invalid object path {}", object_path.display()))?;
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let object_content = Self::compress(object_content)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .with_context(|| {
                format!("Unable to open object file {}", temp_object_path.display())
            })?;

        file.write_all(&object_content).with_context(|| {
            format!("Unable to write object file {}", temp_object_path.display())
        })?;

        std::fs::rename(&temp_object_path, &object_path)
            .with_context(|| format!("Unable to rename object file to {}", object_path.display()))?;

        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("Unable to compress object content")?;

        encoder
            .finish()
            .map(|compressed_content| compressed_content.into())
            .context("Unable to finish compressing object content")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed_content = Vec::new();
        decoder
            .read_to_end(&mut decompressed_content)
            .context("Unable to decompress object content")?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }

    /// Find all objects whose OID starts with the given prefix.
    ///
    /// Used to resolve abbreviated OIDs. An empty result means no match, more than one means
    /// the prefix is ambiguous. Prefixes of two or more characters only scan their fan-out
    /// directory.
    pub fn find_objects_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        let prefix = prefix.to_ascii_lowercase();
        let mut matches = Vec::new();

        let directories = match prefix.len() >= 2 {
            true => vec![prefix[..2].to_string()],
            false => (0..=255u8).map(|i| format!("{i:02x}")).collect(),
        };

        for dir_name in directories {
            let dir_path = self.path.join(&dir_name);
            if !dir_path.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(&dir_path)? {
                let file_name = entry?.file_name();
                let full_oid = format!("{}{}", dir_name, file_name.to_string_lossy());

                if full_oid.starts_with(&prefix)
                    && let Ok(oid) = ObjectId::try_parse(full_oid)
                {
                    matches.push(oid);
                }
            }
        }

        matches.sort();
        Ok(matches)
    }

    /// Type of an object, read from its header only
    pub fn get_object_type(&self, object_id: &ObjectId) -> anyhow::Result<ObjectType> {
        let (object_type, _) = self.parse_object_as_bytes(object_id)?;
        Ok(object_type)
    }
}

/// Memoizes the slim view of commits for graph algorithms
///
/// Missing commit objects (a shallow boundary) are cached as `None` so callers can treat them
/// as roots.
#[derive(Debug, Default)]
pub struct CommitCache {
    commits: RefCell<HashMap<ObjectId, Option<SlimCommit>>>,
}

impl CommitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load_slim_commit(
        &self,
        database: &Database,
        oid: &ObjectId,
    ) -> anyhow::Result<Option<SlimCommit>> {
        if let Some(cached) = self.commits.borrow().get(oid) {
            return Ok(cached.clone());
        }

        let slim = match database.exists(oid) {
            true => database
                .parse_object_as_commit(oid)?
                .map(|commit| commit.to_slim(oid.clone())),
            false => {
                debug!(%oid, "commit missing from the database, treating it as a root");
                None
            }
        };
        self.commits.borrow_mut().insert(oid.clone(), slim.clone());

        Ok(slim)
    }
}
