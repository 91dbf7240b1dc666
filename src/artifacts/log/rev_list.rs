use crate::areas::database::{CommitCache, Database};
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::log::path_filter::PathFilter;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::path::PathBuf;
use tracing::{debug, trace};

#[derive(Debug, Clone, Default)]
pub struct RevWalkOptions {
    pub max_count: Option<usize>,
    /// Keep only commits touching these paths
    pub paths: Vec<PathBuf>,
}

/// Queue slot: newest committer time first, earlier insertion first on ties
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueuedCommit {
    timestamp: DateTime<FixedOffset>,
    order: u64,
    oid: ObjectId,
}

impl PartialOrd for QueuedCommit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedCommit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Lazy reverse-chronological history walk.
///
/// Yields `(oid, commit)` pairs. Commits reachable from an excluded start are never
/// yielded; a parent missing from the database ends its line of history.
pub struct RevWalk<'r> {
    database: &'r Database,
    cache: CommitCache,
    queue: BinaryHeap<QueuedCommit>,
    seen: HashSet<ObjectId>,
    hidden: HashSet<ObjectId>,
    filter: PathFilter,
    max_count: Option<usize>,
    emitted: usize,
    inserted: u64,
}

impl<'r> RevWalk<'r> {
    pub fn new(
        database: &'r Database,
        includes: &[ObjectId],
        excludes: &[ObjectId],
        options: RevWalkOptions,
    ) -> anyhow::Result<Self> {
        let mut walk = RevWalk {
            database,
            cache: CommitCache::new(),
            queue: BinaryHeap::new(),
            seen: HashSet::new(),
            hidden: HashSet::new(),
            filter: PathFilter::new(options.paths),
            max_count: options.max_count,
            emitted: 0,
            inserted: 0,
        };

        walk.hide_reachable(excludes)?;
        for oid in includes {
            walk.enqueue(oid)?;
        }
        debug!(
            includes = includes.len(),
            excludes = excludes.len(),
            hidden = walk.hidden.len(),
            "history walk started"
        );

        Ok(walk)
    }

    fn hide_reachable(&mut self, excludes: &[ObjectId]) -> anyhow::Result<()> {
        let mut pending = excludes.iter().cloned().collect::<VecDeque<_>>();

        while let Some(oid) = pending.pop_front() {
            if !self.hidden.insert(oid.clone()) {
                continue;
            }
            if let Some(commit) = self.cache.get_or_load_slim_commit(self.database, &oid)? {
                pending.extend(commit.parents);
            }
        }

        Ok(())
    }

    fn enqueue(&mut self, oid: &ObjectId) -> anyhow::Result<()> {
        if self.hidden.contains(oid) || self.seen.contains(oid) {
            return Ok(());
        }
        let Some(commit) = self.cache.get_or_load_slim_commit(self.database, oid)? else {
            return Ok(());
        };

        self.seen.insert(oid.clone());
        self.queue.push(QueuedCommit {
            timestamp: commit.timestamp,
            order: self.inserted,
            oid: oid.clone(),
        });
        self.inserted += 1;

        Ok(())
    }

    /// Whether the commit changes something under the path filter relative to its first
    /// parent; roots and shallow boundaries compare against the empty tree.
    fn touches_filtered_paths(&self, oid: &ObjectId, commit: &Commit) -> anyhow::Result<bool> {
        if self.filter.is_unrestricted() {
            return Ok(true);
        }

        let parent = commit
            .parent()
            .filter(|parent| self.database.exists(parent));
        let mut tree_diff = TreeDiff::new(self.database);
        tree_diff.compare_oids(parent, Some(oid), &self.filter)?;

        Ok(!tree_diff.changes().is_empty())
    }

    fn next_commit(&mut self) -> anyhow::Result<Option<(ObjectId, Commit)>> {
        if self.max_count.is_some_and(|max| self.emitted >= max) {
            return Ok(None);
        }

        while let Some(QueuedCommit { oid, .. }) = self.queue.pop() {
            let commit = self
                .database
                .parse_object_as_commit(&oid)?
                .ok_or_else(|| anyhow::anyhow!("object {oid} is not a commit"))?;

            for parent in commit.parents() {
                self.enqueue(parent)?;
            }

            if self.touches_filtered_paths(&oid, &commit)? {
                trace!(%oid, "history walk yields commit");
                self.emitted += 1;
                return Ok(Some((oid, commit)));
            }
        }

        Ok(None)
    }
}

impl Iterator for RevWalk<'_> {
    type Item = anyhow::Result<(ObjectId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_commit() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(err) => {
                self.queue.clear();
                Some(Err(err))
            }
        }
    }
}
