//! Porcelain commands (user-facing operations)
//!
//! Porcelain commands compose the areas and artifacts into the workflows people type at a
//! prompt. Each one is an `impl Repository` block writing its primary output to the
//! repository writer and its notices to stderr.
//!
//! ## Commands
//!
//! - `init`: create a repository
//! - `add`, `rm`, `mv`: stage, unstage and move paths
//! - `commit`: record the index, concluding a merge when one is pending
//! - `status`: long, short and porcelain views of the three trees
//! - `diff`: changes between trees, the index and the working tree
//! - `log`: commit history
//! - `branch`, `tag`: create, list and delete refs
//! - `checkout`: switch branches, detach HEAD or restore files
//! - `reset`: move the current branch, optionally the index and working tree
//! - `merge`, `rebase`: combine histories, pausing on conflicts
//! - `stash`: set work in progress aside
//! - `remote`: manage the configured remotes and their tracking branches

pub mod add;
pub mod branch;
pub mod checkout;
pub mod commit;
pub mod diff;
pub mod init;
pub mod log;
pub mod merge;
pub mod mv;
pub mod rebase;
pub mod remote;
pub mod reset;
pub mod rm;
pub mod stash;
pub mod status;
pub mod tag;
