use crate::areas::database::CommitCache;
use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::merge::bca_finder::BCAFinder;
use crate::errors::RepositoryError;

impl Repository {
    /// `merge-base <a> <b>`: the best common ancestor, or all of them with `--all`.
    ///
    /// Returns whether a base was found; `--is-ancestor` returns whether `a` is an ancestor of
    /// `b` and prints nothing.
    pub fn merge_base(
        &mut self,
        commits: &[String],
        all: bool,
        is_ancestor: bool,
    ) -> anyhow::Result<bool> {
        let [first, second] = commits else {
            return Err(
                RepositoryError::Usage("merge-base takes exactly two commits".to_string()).into(),
            );
        };
        let first = Revision::try_parse(first)?.resolve(self)?;
        let second = Revision::try_parse(second)?.resolve(self)?;

        let commit_cache = CommitCache::new();
        let database = self.database();
        let finder = BCAFinder::new(|oid| commit_cache.get_or_load_slim_commit(database, oid));

        if is_ancestor {
            return finder.is_ancestor(&first, &second);
        }

        let bases = finder.find_best_common_ancestors(&first, &second)?;
        let shown = match all {
            true => bases.len(),
            false => bases.len().min(1),
        };
        for base in &bases[..shown] {
            writeln!(self.writer(), "{base}")?;
        }

        Ok(!bases.is_empty())
    }
}
