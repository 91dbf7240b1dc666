use crate::areas::database::CommitCache;
use crate::areas::refs::SymRefOrOid;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, REMOTES_PREFIX, SymRefName};
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::merge::bca_finder::BCAFinder;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use colored::Colorize;
use tracing::info;

/// Which namespaces `branch` lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchListing {
    #[default]
    Local,
    Remote,
    All,
}

struct BranchRow {
    is_current: bool,
    is_remote: bool,
    name: String,
    /// `None` for a symbolic remote ref such as `origin/HEAD`
    oid: Option<ObjectId>,
}

impl BranchRow {
    fn paint(&self, text: &str) -> String {
        match (self.is_current, self.is_remote) {
            (true, _) => text.green().to_string(),
            (_, true) => text.red().to_string(),
            _ => text.to_string(),
        }
    }
}

impl Repository {
    /// Create `branch_name` at `source_refname` (HEAD by default)
    pub fn branch(
        &mut self,
        branch_name: &str,
        source_refname: Option<&str>,
        force: bool,
    ) -> anyhow::Result<()> {
        let branch_name = BranchName::try_parse(branch_name.to_string())?;
        if force && self.refs().is_current_branch(&branch_name)? {
            anyhow::bail!("cannot force update the current branch.");
        }

        let source_oid = match source_refname {
            Some(source_refname) => Revision::try_parse(source_refname)?.resolve(self)?,
            None => self.refs().read_head()?.ok_or_else(|| {
                RepositoryError::Usage("not a valid object name: 'HEAD'".to_string())
            })?,
        };

        self.refs()
            .create(&branch_name.to_sym_ref_name(), &source_oid, force)?;
        info!(branch = %branch_name, oid = %source_oid, "branch created");

        Ok(())
    }

    /// `branch [-v] [-a|-r]`: branches by name, the current one starred
    pub fn list_branches(&mut self, verbose: bool, listing: BranchListing) -> anyhow::Result<()> {
        let current = self.refs().current_ref()?;
        let head = self.refs().read_head()?;

        let mut rows = Vec::new();
        if listing != BranchListing::Remote {
            if current.is_detached_head()
                && let Some(head) = &head
            {
                rows.push(BranchRow {
                    is_current: true,
                    is_remote: false,
                    name: format!("(HEAD detached at {})", head.to_short_oid()),
                    oid: Some(head.clone()),
                });
            }
            for branch in self.refs().list_branches()? {
                let oid = self.refs().resolve(&branch)?;
                rows.push(BranchRow {
                    is_current: branch == current,
                    is_remote: false,
                    name: branch.short_name().to_string(),
                    oid: Some(oid),
                });
            }
        }
        if listing != BranchListing::Local {
            for tracking in self.refs().list_remote_branches()? {
                let name = match listing {
                    BranchListing::All => format!("remotes/{}", tracking.short_name()),
                    _ => tracking.short_name().to_string(),
                };
                let row = match self.refs().read_raw(&tracking)? {
                    Some(SymRefOrOid::SymRef { sym_ref_name }) => BranchRow {
                        is_current: false,
                        is_remote: true,
                        name: format!("{name} -> {}", sym_ref_name.short_name()),
                        oid: None,
                    },
                    _ => BranchRow {
                        is_current: false,
                        is_remote: true,
                        name,
                        oid: Some(self.refs().resolve(&tracking)?),
                    },
                };
                rows.push(row);
            }
        }

        let width = match verbose {
            true => rows
                .iter()
                .filter(|row| row.oid.is_some())
                .map(|row| row.name.len())
                .max()
                .unwrap_or(0),
            false => 0,
        };
        for row in rows {
            let marker = if row.is_current { "*" } else { " " };
            let (Some(oid), true) = (&row.oid, verbose) else {
                writeln!(self.writer(), "{marker} {}", row.paint(&row.name))?;
                continue;
            };

            let padded = format!("{:width$}", row.name);
            let subject = self
                .database()
                .parse_object_as_commit(oid)?
                .map(|commit| commit.short_message())
                .unwrap_or_default();
            writeln!(
                self.writer(),
                "{marker} {} {} {subject}",
                row.paint(&padded),
                oid.to_short_oid()
            )?;
        }

        Ok(())
    }

    /// `branch -d -r <names>`: drop remote-tracking branches, merged or not
    pub fn delete_remote_branches(&mut self, names: &[String]) -> anyhow::Result<()> {
        for name in names {
            let tracking = SymRefName::new(format!("{REMOTES_PREFIX}{name}"));
            if self.refs().read_raw(&tracking)?.is_none() {
                anyhow::bail!("remote-tracking branch '{name}' not found.");
            }

            let oid = self.refs().delete(&tracking)?;
            info!(branch = %tracking, "remote-tracking branch deleted");
            writeln!(
                self.writer(),
                "Deleted remote-tracking branch {name} (was {}).",
                oid.to_short_oid()
            )?;
        }

        Ok(())
    }

    /// `branch -d|-D <names>`; `-d` refuses branches not merged into HEAD
    pub fn delete_branches(&mut self, names: &[String], force: bool) -> anyhow::Result<()> {
        let head = self.refs().read_head()?;

        for name in names {
            let branch_name = BranchName::try_parse(name.clone())?;
            let sym_ref = branch_name.to_sym_ref_name();
            let Some(oid) = self.refs().try_resolve(&sym_ref)? else {
                anyhow::bail!("branch '{name}' not found.");
            };

            if !force && !self.is_merged_into(&oid, head.as_ref())? {
                anyhow::bail!(
                    "The branch '{name}' is not fully merged.\n\
                     If you are sure you want to delete it, run 'twig branch -D {name}'."
                );
            }

            let oid = self.refs().delete(&sym_ref)?;
            info!(branch = %name, "branch deleted");
            writeln!(
                self.writer(),
                "Deleted branch {name} (was {}).",
                oid.to_short_oid()
            )?;
        }

        Ok(())
    }

    fn is_merged_into(&self, oid: &ObjectId, head: Option<&ObjectId>) -> anyhow::Result<bool> {
        let Some(head) = head else {
            return Ok(false);
        };
        let commit_cache = CommitCache::new();
        let database = self.database();
        let finder = BCAFinder::new(|oid| commit_cache.get_or_load_slim_commit(database, oid));

        finder.is_ancestor(oid, head)
    }
}
