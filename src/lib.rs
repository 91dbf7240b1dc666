//! twig: a git-compatible version control core
//!
//! The crate is organised the same way a repository is:
//!
//! - `areas`: the on-disk areas of a repository (object database, refs, index, workspace,
//!   configuration, operation state)
//! - `artifacts`: value types and algorithms (objects, diffs, history, merges, status)
//! - `commands`: one `impl Repository` block per command, split into plumbing and porcelain
//! - `errors`: the typed error taxonomy and its exit-code mapping
//! - `telemetry`: tracing subscriber setup

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod errors;
pub mod telemetry;

/// How ref names attached to a commit are rendered by `log`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CommitDecoration {
    #[default]
    Short,
    Full,
    #[value(name = "no")]
    None,
}

/// Layout of a commit rendered by `log`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CommitDisplayFormat {
    #[default]
    Medium,
    #[value(name = "oneline")]
    OneLine,
    /// Medium plus the committer, without dates
    Full,
    /// Author and committer, each with their date
    Fuller,
}
