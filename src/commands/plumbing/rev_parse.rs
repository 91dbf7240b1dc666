use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;

#[derive(Debug, Clone, Default)]
pub struct RevParseOptions {
    pub is_bare_repository: bool,
    pub git_dir: bool,
    pub show_toplevel: bool,
    /// Print the branch name instead of the object id (`HEAD` when detached)
    pub abbrev_ref: bool,
    pub short: bool,
}

impl Repository {
    pub fn rev_parse(
        &mut self,
        revisions: &[String],
        opts: &RevParseOptions,
    ) -> anyhow::Result<()> {
        if opts.is_bare_repository {
            writeln!(self.writer(), "{}", self.is_bare())?;
        }
        if opts.git_dir {
            writeln!(self.writer(), "{}", self.git_dir().display())?;
        }
        if opts.show_toplevel {
            self.require_worktree()?;
            writeln!(self.writer(), "{}", self.path().display())?;
        }

        for revision in revisions {
            if opts.abbrev_ref {
                let name = self.abbrev_ref(revision)?;
                writeln!(self.writer(), "{name}")?;
                continue;
            }

            let oid = Revision::try_parse(revision)?.resolve_object(self)?;
            match opts.short {
                true => writeln!(self.writer(), "{}", oid.to_short_oid())?,
                false => writeln!(self.writer(), "{oid}")?,
            }
        }

        Ok(())
    }

    fn abbrev_ref(&self, revision: &str) -> anyhow::Result<String> {
        let Some(name) = self.refs().dwim(revision)? else {
            // still fails with the usual message for unknown names
            Revision::try_parse(revision)?.resolve_object(self)?;
            return Ok(revision.to_string());
        };

        let terminal = self.refs().terminal(&name)?;
        Ok(terminal.short_name().to_string())
    }
}
