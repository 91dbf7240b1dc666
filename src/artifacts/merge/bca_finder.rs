//! Best common ancestor search
//!
//! Finds the merge base of two commits, the starting point of every three-way merge.
//!
//! ## Algorithm
//!
//! ### Phase 1: paint down to the common commits
//!
//! Both tips enter one priority queue ordered by committer time (newest first). Each popped
//! commit passes its visit flags on to its parents. A commit carrying both the source and
//! the target flag is a common ancestor: it is recorded as a result and its flags gain
//! `STALE`, which then flows into everything below it. The walk ends once only stale
//! commits remain queued.
//!
//! ### Phase 2: drop redundant candidates
//!
//! > A best common ancestor of X and Y is a common ancestor of X and Y that is not an
//! > ancestor of any other common ancestor.
//!
//! Every candidate is painted against the others; a candidate reached from another one is
//! redundant.
//!
//! When several best candidates remain (criss-cross histories) the one with the most recent
//! committer time wins, then the lexicographically smallest object id.
//!
//! ## Missing objects
//!
//! The loader answers `None` for commits absent from the database (shallow boundaries). Such
//! commits are never queued, so their children behave as roots.

use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, trace};

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    struct VisitState: u8 {
        const NONE = 0b00;
        const VISITED_FROM_SOURCE = 0b01;
        const VISITED_FROM_TARGET = 0b10;
        const VISITED_FROM_BOTH =
            Self::VISITED_FROM_SOURCE.bits() | Self::VISITED_FROM_TARGET.bits();
        const STALE = 0b100;
        const RESULT = 0b1000;
    }
}

impl fmt::Debug for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.contains(VisitState::VISITED_FROM_SOURCE) {
            flags.push("SOURCE");
        }
        if self.contains(VisitState::VISITED_FROM_TARGET) {
            flags.push("TARGET");
        }
        if self.contains(VisitState::STALE) {
            flags.push("STALE");
        }
        if self.contains(VisitState::RESULT) {
            flags.push("RESULT");
        }
        if flags.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", flags.join("|"))
        }
    }
}

impl fmt::Display for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of one painting pass
struct Painting {
    states: HashMap<ObjectId, VisitState>,
    /// Common commits in discovery order
    results: Vec<SlimCommit>,
}

impl Painting {
    fn state(&self, oid: &ObjectId) -> VisitState {
        self.states.get(oid).copied().unwrap_or(VisitState::NONE)
    }
}

/// Merge base search over any commit store.
///
/// `CommitLoaderFn` returns the slim form of a commit, or `None` when the object is missing.
pub struct BCAFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<Option<SlimCommit>>,
{
    commit_loader: CommitLoaderFn,
}

impl<CommitLoaderFn> BCAFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<Option<SlimCommit>>,
{
    pub fn new(commit_loader: CommitLoaderFn) -> Self {
        Self { commit_loader }
    }

    fn paint_down_to_common(
        &self,
        source_commit_id: &ObjectId,
        target_commit_ids: &[&ObjectId],
    ) -> anyhow::Result<Painting> {
        let mut states = HashMap::<ObjectId, VisitState>::new();
        let mut queue = BinaryHeap::<SlimCommit>::new();
        let mut results = Vec::new();

        let starts = std::iter::once((source_commit_id, VisitState::VISITED_FROM_SOURCE)).chain(
            target_commit_ids
                .iter()
                .map(|oid| (*oid, VisitState::VISITED_FROM_TARGET)),
        );
        for (oid, flag) in starts {
            let Some(commit) = (self.commit_loader)(oid)? else {
                continue;
            };
            let state = states.entry(oid.clone()).or_insert(VisitState::NONE);
            *state |= flag;
            queue.push(commit);
        }

        while queue
            .iter()
            .any(|commit| !states[&commit.oid].contains(VisitState::STALE))
        {
            let Some(commit) = queue.pop() else {
                break;
            };
            let state = states[&commit.oid];
            let mut flags = state & (VisitState::VISITED_FROM_BOTH | VisitState::STALE);
            trace!(oid = %commit.oid, %state, "painting commit");

            if flags == VisitState::VISITED_FROM_BOTH {
                if !state.contains(VisitState::RESULT) {
                    states.insert(commit.oid.clone(), state | VisitState::RESULT);
                    results.push(commit.clone());
                }
                flags |= VisitState::STALE;
            }

            for parent_id in &commit.parents {
                let parent_state = states.get(parent_id).copied().unwrap_or(VisitState::NONE);
                if parent_state.contains(flags) {
                    continue;
                }
                let Some(parent) = (self.commit_loader)(parent_id)? else {
                    trace!(oid = %parent_id, "missing parent treated as a boundary");
                    continue;
                };

                states.insert(parent_id.clone(), parent_state | flags);
                queue.push(parent);
            }
        }

        Ok(Painting { states, results })
    }

    /// All best common ancestors, best first
    pub fn find_best_common_ancestors(
        &self,
        source_commit_id: &ObjectId,
        target_commit_id: &ObjectId,
    ) -> anyhow::Result<Vec<ObjectId>> {
        let mut painting = self.paint_down_to_common(source_commit_id, &[target_commit_id])?;
        let mut candidates = std::mem::take(&mut painting.results)
            .into_iter()
            .filter(|commit| !painting.state(&commit.oid).contains(VisitState::STALE))
            .collect::<Vec<_>>();

        if candidates.len() > 1 {
            let redundant = self.redundant_candidates(&candidates)?;
            debug!(
                candidates = candidates.len(),
                redundant = redundant.len(),
                "filtering redundant merge bases"
            );
            candidates.retain(|commit| !redundant.contains(&commit.oid));
        }

        // most recent committer time first, then the smallest digest
        candidates.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.oid.cmp(&b.oid)));

        Ok(candidates.into_iter().map(|commit| commit.oid).collect())
    }

    pub fn find_best_common_ancestor(
        &self,
        source_commit_id: &ObjectId,
        target_commit_id: &ObjectId,
    ) -> anyhow::Result<Option<ObjectId>> {
        let best = self
            .find_best_common_ancestors(source_commit_id, target_commit_id)?
            .into_iter()
            .next();
        debug!(
            source = %source_commit_id,
            target = %target_commit_id,
            base = ?best.as_ref().map(ToString::to_string),
            "merge base"
        );

        Ok(best)
    }

    /// Whether `ancestor` is reachable from `descendant` (a commit is its own ancestor)
    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> anyhow::Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }

        Ok(self
            .find_best_common_ancestors(ancestor, descendant)?
            .iter()
            .any(|base| base == ancestor))
    }

    fn redundant_candidates(&self, candidates: &[SlimCommit]) -> anyhow::Result<HashSet<ObjectId>> {
        let mut redundant = HashSet::<ObjectId>::new();

        for candidate in candidates {
            if redundant.contains(&candidate.oid) {
                continue;
            }
            let others = candidates
                .iter()
                .map(|commit| &commit.oid)
                .filter(|oid| **oid != candidate.oid && !redundant.contains(*oid))
                .collect::<Vec<_>>();
            if others.is_empty() {
                continue;
            }

            let painting = self.paint_down_to_common(&candidate.oid, &others)?;
            if painting
                .state(&candidate.oid)
                .contains(VisitState::VISITED_FROM_TARGET)
            {
                redundant.insert(candidate.oid.clone());
            }
            for other in others {
                if painting
                    .state(other)
                    .contains(VisitState::VISITED_FROM_SOURCE)
                {
                    redundant.insert(other.clone());
                }
            }
        }

        Ok(redundant)
    }
}
