//! Repository handle
//!
//! A `Repository` ties the areas of one repository together: the object database, refs, index,
//! working tree, configuration and the persisted operation state. It is produced once (by
//! `discover` or `new` for `init`) and passed explicitly to every command.
//!
//! ## Layouts
//!
//! - non-bare: `<worktree>/.git` holds the metadata, the worktree is its parent
//! - bare: the metadata root is the repository itself and there is no worktree
//!
//! `GIT_DIR` overrides discovery; the worktree is then the starting directory unless the
//! configuration says `core.bare = true`.

use crate::areas::config::Config;
use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::operations::Operations;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use crate::artifacts::objects::commit::{Author, IdentityRole};
use crate::artifacts::status::status_info::Status;
use crate::errors::RepositoryError;
use anyhow::Context;
use std::cell::{Ref, RefCell, RefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub const GIT_DIR_NAME: &str = ".git";
pub const GIT_DIR_ENV: &str = "GIT_DIR";

pub struct Repository {
    /// Worktree root, or the metadata root of a bare repository
    path: Box<Path>,
    git_dir: Box<Path>,
    bare: bool,
    writer: RefCell<Box<dyn std::io::Write>>,
    index: Arc<Mutex<Index>>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
    config: RefCell<Config>,
    operations: Operations,
}

impl Repository {
    /// Map the layout rooted at `path` without checking it exists, which is what `init` needs.
    pub fn new(path: &Path, bare: bool, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(path)
                .with_context(|| format!("unable to create {}", path.display()))?;
        }
        let path = path
            .canonicalize()
            .with_context(|| format!("unable to resolve {}", path.display()))?;

        let git_dir = match bare {
            true => path.clone(),
            false => path.join(GIT_DIR_NAME),
        };

        Self::open(path, git_dir, bare, writer)
    }

    /// Find the repository containing `start`, honouring `GIT_DIR`
    pub fn discover(start: &Path, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        let start = start
            .canonicalize()
            .with_context(|| format!("unable to resolve {}", start.display()))?;

        if let Ok(git_dir) = std::env::var(GIT_DIR_ENV)
            && !git_dir.is_empty()
        {
            let git_dir = start.join(git_dir);
            if !Self::is_metadata_root(&git_dir) {
                return Err(RepositoryError::NotARepository(git_dir).into());
            }
            let git_dir = git_dir.canonicalize()?;
            let bare = Config::load(&git_dir.join("config"))?
                .get_bool("core.bare")?
                .unwrap_or(false);
            let path = if bare { git_dir.clone() } else { start };

            debug!(git_dir = %git_dir.display(), bare, "repository from GIT_DIR");
            return Self::open(path, git_dir, bare, writer);
        }

        for dir in start.ancestors() {
            let dot_git = dir.join(GIT_DIR_NAME);
            if dot_git.is_dir() && Self::is_metadata_root(&dot_git) {
                debug!(worktree = %dir.display(), "repository discovered");
                return Self::open(dir.to_path_buf(), dot_git, false, writer);
            }

            if Self::is_metadata_root(dir) {
                debug!(git_dir = %dir.display(), "bare repository discovered");
                return Self::open(dir.to_path_buf(), dir.to_path_buf(), true, writer);
            }
        }

        Err(RepositoryError::NotARepository(start))?
    }

    fn is_metadata_root(dir: &Path) -> bool {
        dir.join("HEAD").is_file() && dir.join("objects").is_dir() && dir.join("refs").is_dir()
    }

    fn open(
        path: PathBuf,
        git_dir: PathBuf,
        bare: bool,
        writer: Box<dyn std::io::Write>,
    ) -> anyhow::Result<Self> {
        let config = Config::load(&git_dir.join("config"))?;
        let bare = bare || config.get_bool("core.bare")?.unwrap_or(false);

        Ok(Repository {
            index: Arc::new(Mutex::new(Index::new(
                git_dir.join("index").into_boxed_path(),
            ))),
            database: Database::new(git_dir.join("objects").into_boxed_path()),
            workspace: Workspace::new(path.clone().into_boxed_path()),
            refs: Refs::new(git_dir.clone().into_boxed_path()),
            operations: Operations::new(&git_dir),
            config: RefCell::new(config),
            writer: RefCell::new(writer),
            path: path.into_boxed_path(),
            git_dir: git_dir.into_boxed_path(),
            bare,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn is_bare(&self) -> bool {
        self.bare
    }

    /// Fail with `BareRepositoryUnsupported` unless there is a working tree
    pub fn require_worktree(&self) -> anyhow::Result<()> {
        if self.bare {
            Err(RepositoryError::BareRepositoryUnsupported)?;
        }
        Ok(())
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn index(&self) -> Arc<Mutex<Index>> {
        self.index.clone()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn config(&self) -> Ref<'_, Config> {
        self.config.borrow()
    }

    pub fn config_mut(&self) -> RefMut<'_, Config> {
        self.config.borrow_mut()
    }

    pub fn operations(&self) -> &Operations {
        &self.operations
    }

    pub fn status(&'_ self) -> Status<'_> {
        Status::new(self)
    }

    /// Author or committer identity from the environment, falling back to `user.name` and
    /// `user.email`
    pub fn identity(&self, role: IdentityRole) -> anyhow::Result<Author> {
        let config = self.config();
        let fallback = config.get("user.name").zip(config.get("user.email"));

        Author::load_from_env(role, fallback)
    }

    /// Worktree-relative paths for command-line arguments given from the current directory
    pub fn pathspecs<S: AsRef<str>>(&self, args: &[S]) -> anyhow::Result<Vec<PathBuf>> {
        let cwd = std::env::current_dir().context("unable to read the current directory")?;
        let cwd = cwd.canonicalize().unwrap_or(cwd);

        args.iter()
            .map(|arg| self.workspace.pathspec(&cwd, Path::new(arg.as_ref())))
            .collect()
    }

    /// Boolean configuration value with a default
    pub fn config_flag(&self, key: &str, default: bool) -> anyhow::Result<bool> {
        Ok(self.config().get_bool(key)?.unwrap_or(default))
    }
}
