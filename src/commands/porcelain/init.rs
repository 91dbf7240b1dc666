use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use anyhow::Context;
use std::fs;

pub const DEFAULT_BRANCH: &str = "master";

impl Repository {
    /// Create the metadata layout: objects, refs, HEAD on the unborn default branch and a
    /// config recording whether the repository is bare.
    ///
    /// Running it again on an existing repository keeps HEAD and everything else in place.
    pub async fn init(&mut self) -> anyhow::Result<()> {
        let reinit = self.refs().head_path().is_file();

        fs::create_dir_all(self.database().objects_path())
            .context("Failed to create the objects directory")?;
        fs::create_dir_all(self.refs().heads_path())
            .context("Failed to create the refs/heads directory")?;
        fs::create_dir_all(self.refs().refs_path().join("tags"))
            .context("Failed to create the refs/tags directory")?;

        if !reinit {
            let default_branch = BranchName::try_parse(DEFAULT_BRANCH.to_string())?;
            self.refs()
                .set_head_symbolic(&default_branch)
                .context("Failed to create initial HEAD reference")?;
        }

        if !self.is_bare() {
            let index = self.index();
            let index = index.lock().await;
            if !index.path().exists() {
                fs::write(index.path(), b"").context("Failed to create the index file")?;
            }
        }

        {
            let mut config = self.config_mut();
            config.set("core.repositoryformatversion", "0")?;
            config.set("core.filemode", "true")?;
            config.set("core.bare", if self.is_bare() { "true" } else { "false" })?;
            config.save()?;
        }

        let git_dir = self.git_dir().display().to_string();
        let git_dir = git_dir.trim_end_matches('/');
        match reinit {
            true => writeln!(
                self.writer(),
                "Reinitialized existing Git repository in {git_dir}/"
            )?,
            false => writeln!(
                self.writer(),
                "Initialized empty Git repository in {git_dir}/"
            )?,
        }

        Ok(())
    }
}
