use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::RevisionRange;
use crate::artifacts::log::rev_list::{RevWalk, RevWalkOptions};
use std::path::PathBuf;

impl Repository {
    /// `rev-list <revs>... [-- <paths>]`: ids of the selected commits, newest first
    pub fn rev_list(
        &mut self,
        revisions: &[String],
        paths: &[PathBuf],
        max_count: Option<usize>,
    ) -> anyhow::Result<()> {
        let range = RevisionRange::try_parse_args(revisions)?;
        let (includes, excludes) = range.resolve(self)?;
        let options = RevWalkOptions {
            max_count,
            paths: paths.to_vec(),
        };

        for item in RevWalk::new(self.database(), &includes, &excludes, options)? {
            let (oid, _) = item?;
            writeln!(self.writer(), "{oid}")?;
        }

        Ok(())
    }
}
