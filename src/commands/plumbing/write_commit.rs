use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::SymRefName;
use crate::artifacts::objects::commit::{Author, Commit, IdentityRole};
use crate::artifacts::objects::object_id::ObjectId;
use tracing::debug;

impl Repository {
    /// `write-tree`: store the index as trees and print the root tree id
    pub async fn write_tree(&mut self) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        if index.has_conflicts() {
            anyhow::bail!("write-tree: the index has unmerged entries");
        }
        let tree_oid = index.to_tree(self.database())?;
        writeln!(self.writer(), "{tree_oid}")?;

        Ok(())
    }

    /// Store a commit of `tree_oid` authored and committed by the configured identities
    pub(crate) fn write_commit(
        &self,
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        message: &str,
    ) -> anyhow::Result<(ObjectId, Commit)> {
        let author = self.identity(IdentityRole::Author)?;
        self.write_commit_as(parents, tree_oid, author, message)
    }

    /// Like `write_commit` but keeping an existing author, as rebase does when replaying
    pub(crate) fn write_commit_as(
        &self,
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Author,
        message: &str,
    ) -> anyhow::Result<(ObjectId, Commit)> {
        let committer = self.identity(IdentityRole::Committer)?;
        let commit = Commit::new_with_committer(
            parents,
            tree_oid,
            author,
            committer,
            normalize_message(message),
        );
        let commit_oid = self.database().store(&commit)?;
        debug!(oid = %commit_oid, parents = commit.parents().len(), "commit written");

        Ok((commit_oid, commit))
    }

    /// Commit the index on top of HEAD and move HEAD (or the branch it names) to it
    pub(crate) fn commit_index(
        &self,
        index: &mut Index,
        parents: Vec<ObjectId>,
        message: &str,
    ) -> anyhow::Result<(ObjectId, Commit)> {
        let head = self.refs().read_head()?;
        let tree_oid = index.to_tree(self.database())?;
        let (commit_oid, commit) = self.write_commit(parents, tree_oid, message)?;

        self.refs()
            .update(&SymRefName::head(), head.as_ref(), &commit_oid)?;

        Ok((commit_oid, commit))
    }
}

/// Trim surrounding blank lines and end the message with exactly one newline
pub fn normalize_message(message: &str) -> String {
    let trimmed = message.trim_matches(|c| c == '\n' || c == '\r').trim_end();
    format!("{trimmed}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("subject", "subject\n")]
    #[case("\nsubject\n\nbody\n\n\n", "subject\n\nbody\n")]
    #[case("subject   ", "subject\n")]
    fn messages_end_with_one_newline(#[case] message: &str, #[case] expected: &str) {
        assert_eq!(normalize_message(message), expected);
    }
}
