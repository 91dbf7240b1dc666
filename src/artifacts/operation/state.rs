//! State of an in-progress merge or rebase
//!
//! Every transition consumes the current state and returns the next one (or the typed error
//! for an illegal transition); nothing here touches the disk.

use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeState {
    /// HEAD when the merge started
    pub head: ObjectId,
    pub merge_head: ObjectId,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseState {
    /// Branch being rebased (`refs/heads/...`), `None` when HEAD was detached
    pub head_name: Option<String>,
    pub orig_head: ObjectId,
    pub onto: ObjectId,
    /// Commit being applied, set while paused on a conflict
    pub current: Option<ObjectId>,
    /// Commits still to apply, oldest first
    pub remaining: Vec<ObjectId>,
    pub done_count: usize,
    pub total: usize,
}

impl RebaseState {
    pub fn new(
        head_name: Option<String>,
        orig_head: ObjectId,
        onto: ObjectId,
        todo: Vec<ObjectId>,
    ) -> Self {
        Self {
            head_name,
            orig_head,
            onto,
            current: None,
            total: todo.len(),
            remaining: todo,
            done_count: 0,
        }
    }

    /// Take the next commit to apply; `None` when the rebase is complete
    pub fn advance(mut self) -> (Option<ObjectId>, Self) {
        if self.remaining.is_empty() {
            self.current = None;
            return (None, self);
        }

        let next = self.remaining.remove(0);
        self.done_count += 1;
        self.current = Some(next.clone());
        (Some(next), self)
    }

    /// The current commit is applied (or skipped); nothing is pending any more
    pub fn settle(mut self) -> Self {
        self.current = None;
        self
    }
}

/// Persisted operation state; a missing record means `Idle`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationState {
    #[default]
    Idle,
    Merge(MergeState),
    Rebase(RebaseState),
}

impl OperationState {
    pub fn name(&self) -> &'static str {
        match self {
            OperationState::Idle => "idle",
            OperationState::Merge(_) => "merge",
            OperationState::Rebase(_) => "rebase",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, OperationState::Idle)
    }

    fn require_idle(&self) -> anyhow::Result<()> {
        if !self.is_idle() {
            Err(RepositoryError::OperationInProgress(format!("a {}", self.name())))?;
        }
        Ok(())
    }

    /// Idle → MergeInProgress
    pub fn start_merge(self, merge: MergeState) -> anyhow::Result<Self> {
        self.require_idle()?;
        Ok(OperationState::Merge(merge))
    }

    /// Idle → RebaseInProgress
    pub fn start_rebase(self, rebase: RebaseState) -> anyhow::Result<Self> {
        self.require_idle()?;
        Ok(OperationState::Rebase(rebase))
    }

    pub fn merge(&self) -> anyhow::Result<&MergeState> {
        match self {
            OperationState::Merge(merge) => Ok(merge),
            _ => Err(RepositoryError::NoOperationInProgress("merge".into()))?,
        }
    }

    pub fn rebase(&self) -> anyhow::Result<&RebaseState> {
        match self {
            OperationState::Rebase(rebase) => Ok(rebase),
            _ => Err(RepositoryError::NoOperationInProgress("rebase".into()))?,
        }
    }

    pub fn into_rebase(self) -> anyhow::Result<RebaseState> {
        match self {
            OperationState::Rebase(rebase) => Ok(rebase),
            _ => Err(RepositoryError::NoOperationInProgress("rebase".into()))?,
        }
    }

    /// MergeInProgress → Idle, on commit or abort
    pub fn finish_merge(self) -> anyhow::Result<(MergeState, Self)> {
        match self {
            OperationState::Merge(merge) => Ok((merge, OperationState::Idle)),
            _ => Err(RepositoryError::NoOperationInProgress("merge".into()))?,
        }
    }

    /// RebaseInProgress → Idle, on completion, abort or quit
    pub fn finish_rebase(self) -> anyhow::Result<(RebaseState, Self)> {
        match self {
            OperationState::Rebase(rebase) => Ok((rebase, OperationState::Idle)),
            _ => Err(RepositoryError::NoOperationInProgress("rebase".into()))?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn oid(c: char) -> ObjectId {
        ObjectId::try_parse(c.to_string().repeat(40)).unwrap()
    }

    fn merge_state() -> MergeState {
        MergeState {
            head: oid('a'),
            merge_head: oid('b'),
            message: "Merge branch 'topic'".into(),
        }
    }

    #[test]
    fn starting_twice_is_refused() {
        let state = OperationState::Idle.start_merge(merge_state()).unwrap();
        let err = state
            .clone()
            .start_rebase(RebaseState::new(None, oid('a'), oid('b'), vec![]))
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<RepositoryError>(),
            Some(&RepositoryError::OperationInProgress("a merge".into()))
        );
        assert_eq!(state.finish_merge().unwrap().1, OperationState::Idle);
    }

    #[test]
    fn finishing_the_wrong_operation_is_refused() {
        let err = OperationState::Idle.finish_rebase().unwrap_err();

        assert_eq!(
            err.downcast_ref::<RepositoryError>(),
            Some(&RepositoryError::NoOperationInProgress("rebase".into()))
        );
        assert!(OperationState::Merge(merge_state()).rebase().is_err());
    }

    #[test]
    fn rebases_advance_through_their_todo_list() {
        let state = RebaseState::new(
            Some("refs/heads/topic".into()),
            oid('a'),
            oid('b'),
            vec![oid('c'), oid('d')],
        );

        let (first, state) = state.advance();
        assert_eq!(first, Some(oid('c')));
        assert_eq!((state.done_count, state.total), (1, 2));

        let (second, state) = state.settle().advance();
        assert_eq!(second, Some(oid('d')));
        assert_eq!(state.current, Some(oid('d')));

        let (done, state) = state.advance();
        assert_eq!(done, None);
        assert_eq!(state.current, None);
    }

    #[test]
    fn states_round_trip_through_toml() {
        let state = OperationState::Rebase(RebaseState::new(
            None,
            oid('1'),
            oid('2'),
            vec![oid('3')],
        ));

        let text = toml::to_string(&state).unwrap();
        assert!(text.contains("kind = \"rebase\""));
        assert_eq!(toml::from_str::<OperationState>(&text).unwrap(), state);
    }
}
