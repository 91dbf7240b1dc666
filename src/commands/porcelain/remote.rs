//! `remote`: the `[remote "<name>"]` sections of the configuration
//!
//! Nothing here talks to another repository. A remote is its URLs and fetch refspecs, and its
//! remote-tracking branches live under `refs/remotes/<name>/`, which `rename` and `remove` keep
//! in step with the configuration.

use crate::areas::refs::SymRefOrOid;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{HEADS_PREFIX, RemoteName, SymRefName};
use crate::errors::RepositoryError;
use tracing::info;

const REMOTE_SECTION: &str = "remote";
const BRANCH_SECTION: &str = "branch";

impl Repository {
    /// `remote add <name> <url>`
    pub fn remote_add(&mut self, name: &str, url: &str) -> anyhow::Result<()> {
        let remote = RemoteName::try_parse(name.to_string())?;
        if self.has_remote(name) {
            Err(RepositoryError::RemoteExists(name.to_string()))?;
        }

        {
            let mut config = self.config_mut();
            config.set(&format!("remote.{remote}.url"), url)?;
            config.add(&format!("remote.{remote}.fetch"), &remote.default_fetch_refspec())?;
        }
        self.config().save()?;
        info!(remote = %remote, url, "remote added");

        Ok(())
    }

    /// `remote remove <name>`: the section, its tracking branches and the branches set to it
    pub fn remote_remove(&mut self, name: &str) -> anyhow::Result<()> {
        let remote = self.existing_remote(name)?;

        let prefix = remote.tracking_prefix();
        for tracking in self.tracking_refs(&prefix)? {
            self.refs().delete(&tracking)?;
        }

        {
            let mut config = self.config_mut();
            for branch in config.subsections(BRANCH_SECTION) {
                if config.get(&format!("branch.{branch}.remote")).as_deref() == Some(name) {
                    config.unset(&format!("branch.{branch}.remote"))?;
                    config.unset(&format!("branch.{branch}.merge"))?;
                }
            }
            config.remove_section(REMOTE_SECTION, Some(name));
        }
        self.config().save()?;
        info!(remote = %remote, "remote removed");

        Ok(())
    }

    /// `remote rename <old> <new>`
    pub fn remote_rename(&mut self, old: &str, new: &str) -> anyhow::Result<()> {
        let old_remote = self.existing_remote(old)?;
        let new_remote = RemoteName::try_parse(new.to_string())?;
        if self.has_remote(new) {
            Err(RepositoryError::RemoteExists(new.to_string()))?;
        }

        let old_prefix = old_remote.tracking_prefix();
        let new_prefix = new_remote.tracking_prefix();
        let tracking = self.tracking_refs(&old_prefix)?;
        let renamed = |name: &SymRefName| match name.as_ref_path().strip_prefix(&old_prefix) {
            Some(rest) => SymRefName::new(format!("{new_prefix}{rest}")),
            None => name.clone(),
        };
        for name in &tracking {
            match self.refs().read_raw(name)? {
                Some(SymRefOrOid::SymRef { sym_ref_name }) => {
                    self.refs().set_symbolic(&renamed(name), &renamed(&sym_ref_name))?
                }
                Some(SymRefOrOid::Oid(oid)) => self.refs().create(&renamed(name), &oid, true)?,
                None => {}
            }
        }
        for name in &tracking {
            self.refs().delete(name)?;
        }

        {
            let mut config = self.config_mut();
            config.rename_section(REMOTE_SECTION, old, new);

            let fetch_key = format!("remote.{new}.fetch");
            let refspecs = config.get_all(&fetch_key);
            config.unset(&fetch_key)?;
            for refspec in refspecs {
                config.add(&fetch_key, &refspec.replace(&old_prefix, &new_prefix))?;
            }

            for branch in config.subsections(BRANCH_SECTION) {
                let key = format!("branch.{branch}.remote");
                if config.get(&key).as_deref() == Some(old) {
                    config.set(&key, new)?;
                }
            }
        }
        self.config().save()?;
        info!(from = %old_remote, to = %new_remote, "remote renamed");

        Ok(())
    }

    /// `remote set-url [--push] <name> <url>`
    pub fn remote_set_url(&mut self, name: &str, url: &str, push: bool) -> anyhow::Result<()> {
        let remote = self.existing_remote(name)?;
        let key = match push {
            true => format!("remote.{remote}.pushurl"),
            false => format!("remote.{remote}.url"),
        };

        self.config_mut().set(&key, url)?;
        self.config().save()?;

        Ok(())
    }

    /// `remote [-v]`: one name per line, or one line per URL and direction
    pub fn remote_list(&self, verbose: bool) -> anyhow::Result<()> {
        let remotes = self.config().subsections(REMOTE_SECTION);

        for name in remotes {
            if !verbose {
                writeln!(self.writer(), "{name}")?;
                continue;
            }

            let (fetch_url, push_url) = self.remote_urls(&name);
            if let Some(url) = &fetch_url {
                writeln!(self.writer(), "{name}\t{url} (fetch)")?;
            }
            if let Some(url) = push_url.or(fetch_url) {
                writeln!(self.writer(), "{name}\t{url} (push)")?;
            }
        }

        Ok(())
    }

    /// `remote show <name>...`: what is known locally about each remote
    pub fn remote_show(&self, names: &[String]) -> anyhow::Result<()> {
        for name in names {
            let remote = self.existing_remote(name)?;
            let (fetch_url, push_url) = self.remote_urls(name);

            writeln!(self.writer(), "* remote {remote}")?;
            if let Some(url) = &fetch_url {
                writeln!(self.writer(), "  Fetch URL: {url}")?;
            }
            if let Some(url) = push_url.or(fetch_url) {
                writeln!(self.writer(), "  Push  URL: {url}")?;
            }

            let prefix = remote.tracking_prefix();
            let mut branches = Vec::new();
            for tracking in self.tracking_refs(&prefix)? {
                let short = tracking
                    .as_ref_path()
                    .strip_prefix(&prefix)
                    .unwrap_or(tracking.as_ref_path())
                    .to_string();
                match self.refs().read_raw(&tracking)? {
                    Some(SymRefOrOid::SymRef { sym_ref_name }) => {
                        let target = sym_ref_name
                            .as_ref_path()
                            .strip_prefix(&prefix)
                            .unwrap_or(sym_ref_name.as_ref_path());
                        writeln!(self.writer(), "  HEAD branch: {target}")?;
                    }
                    _ => branches.push(short),
                }
            }
            if !branches.is_empty() {
                writeln!(self.writer(), "  Remote branches:")?;
                for branch in branches {
                    writeln!(self.writer(), "    {branch}")?;
                }
            }

            let merges = self.branches_following(name);
            if !merges.is_empty() {
                writeln!(self.writer(), "  Local branches configured for 'twig pull':")?;
                for (branch, merge) in merges {
                    writeln!(self.writer(), "    {branch} merges with remote {merge}")?;
                }
            }
        }

        Ok(())
    }

    fn has_remote(&self, name: &str) -> bool {
        self.config().has_section(REMOTE_SECTION, Some(name))
    }

    fn existing_remote(&self, name: &str) -> anyhow::Result<RemoteName> {
        if !self.has_remote(name) {
            Err(RepositoryError::NoSuchRemote(name.to_string()))?;
        }
        RemoteName::try_parse(name.to_string())
    }

    fn remote_urls(&self, name: &str) -> (Option<String>, Option<String>) {
        let config = self.config();
        (
            config.get(&format!("remote.{name}.url")),
            config.get(&format!("remote.{name}.pushurl")),
        )
    }

    /// Local branches whose `branch.<name>.remote` is `remote`, with the branch they merge
    fn branches_following(&self, remote: &str) -> Vec<(String, String)> {
        let config = self.config();
        config
            .subsections(BRANCH_SECTION)
            .into_iter()
            .filter(|branch| {
                config.get(&format!("branch.{branch}.remote")).as_deref() == Some(remote)
            })
            .filter_map(|branch| {
                let merge = config.get(&format!("branch.{branch}.merge"))?;
                let merge = merge.strip_prefix(HEADS_PREFIX).unwrap_or(&merge).to_string();
                Some((branch, merge))
            })
            .collect()
    }

    /// Remote-tracking refs under `prefix`, symbolic ones first so their targets still resolve
    /// while they are deleted
    fn tracking_refs(&self, prefix: &str) -> anyhow::Result<Vec<SymRefName>> {
        let mut symbolic = Vec::new();
        let mut direct = Vec::new();
        for name in self.refs().list(prefix)? {
            match self.refs().read_raw(&name)? {
                Some(SymRefOrOid::SymRef { .. }) => symbolic.push(name),
                _ => direct.push(name),
            }
        }
        symbolic.extend(direct);

        Ok(symbolic)
    }
}
