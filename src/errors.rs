//! Typed repository errors
//!
//! Core operations return `anyhow::Result` and raise these variants with
//! `Err(RepositoryError::...)?`, so the command layer can `downcast_ref` them to pick the
//! message prefix and the process exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Exit status of a successful command
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status of an operational failure
pub const EXIT_FAILURE: i32 = 1;
/// Exit status when no repository could be found
pub const EXIT_NOT_A_REPOSITORY: i32 = 128;
/// Exit status of a usage error
pub const EXIT_USAGE: i32 = 129;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("not a git repository (or any of the parent directories): {}", .0.display())]
    NotARepository(PathBuf),
    #[error("ref '{0}' not found")]
    RefNotFound(String),
    #[error("a ref named '{0}' already exists")]
    RefExists(String),
    #[error("cannot lock ref '{name}': is at {actual} but expected {expected}")]
    RefChanged {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("symbolic ref '{0}' does not terminate after 5 hops")]
    RefCycle(String),
    #[error("cannot delete branch '{0}' checked out")]
    RefInUse(String),
    #[error("No such remote: '{0}'")]
    NoSuchRemote(String),
    #[error("remote {0} already exists.")]
    RemoteExists(String),
    #[error("object {0} not found")]
    ObjectNotFound(String),
    #[error("pathspec '{0}' did not match any file(s) known to git")]
    PathspecNotFound(String),
    #[error(
        "destination exists, source={}, destination={}",
        .from.display(),
        .destination.display()
    )]
    DestinationExists {
        from: PathBuf,
        destination: PathBuf,
    },
    #[error("'{0}' is untracked")]
    UntrackedFile(String),
    #[error("not removing '{0}' recursively without -r")]
    NotRecursive(String),
    /// Fully rendered list of the paths in the way, grouped by reason
    #[error("{0}")]
    WorkingTreeConflict(String),
    #[error("{0} is already in progress")]
    OperationInProgress(String),
    #[error("There is no {0} in progress")]
    NoOperationInProgress(String),
    #[error("you need to resolve your current index first\n{0}")]
    UnresolvedConflicts(String),
    #[error("this operation must be run in a work tree")]
    BareRepositoryUnsupported,
    #[error("ambiguous argument '{0}': unknown revision or path not in the working tree.")]
    UnknownRevision(String),
    #[error("{0}")]
    Usage(String),
}

impl RepositoryError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RepositoryError::NotARepository(_) | RepositoryError::UnknownRevision(_) => {
                EXIT_NOT_A_REPOSITORY
            }
            RepositoryError::Usage(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }

    /// `fatal:` for errors that stop the command before it touches anything
    pub fn prefix(&self) -> &'static str {
        match self {
            RepositoryError::NotARepository(_)
            | RepositoryError::PathspecNotFound(_)
            | RepositoryError::BareRepositoryUnsupported
            | RepositoryError::UnknownRevision(_)
            | RepositoryError::Usage(_) => "fatal",
            _ => "error",
        }
    }
}

/// Render an error the way `main` prints it and return the exit code to use.
pub fn report(err: &anyhow::Error) -> (String, i32) {
    match err.downcast_ref::<RepositoryError>() {
        Some(repo_err) => (
            format!("{}: {}", repo_err.prefix(), repo_err),
            repo_err.exit_code(),
        ),
        None => (format!("error: {err:#}"), EXIT_FAILURE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(RepositoryError::NotARepository(PathBuf::from("/tmp/x")), 128, "fatal")]
    #[case(RepositoryError::Usage("bad flags".into()), 129, "fatal")]
    #[case(RepositoryError::PathspecNotFound("nope".into()), 1, "fatal")]
    #[case(RepositoryError::RefInUse("master".into()), 1, "error")]
    #[case(RepositoryError::RefCycle("HEAD".into()), 1, "error")]
    fn errors_map_to_exit_codes_and_prefixes(
        #[case] error: RepositoryError,
        #[case] code: i32,
        #[case] prefix: &str,
    ) {
        assert_eq!(error.exit_code(), code);
        assert_eq!(error.prefix(), prefix);
    }

    #[test]
    fn typed_errors_survive_anyhow_wrapping() {
        let err: anyhow::Error = RepositoryError::RefExists("topic".into()).into();
        let (message, code) = report(&err);

        assert_eq!(message, "error: a ref named 'topic' already exists");
        assert_eq!(code, 1);
    }

    #[test]
    fn untyped_errors_are_operational_failures() {
        let err = anyhow::anyhow!("disk on fire");
        let (message, code) = report(&err);

        assert_eq!(message, "error: disk on fire");
        assert_eq!(code, 1);
    }
}
