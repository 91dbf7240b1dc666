use crate::common::command::{repository_dir, run_twig_command};
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;

mod common;

#[rstest]
fn new_repository_gets_the_metadata_layout(
    repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let git_dir = repository_dir.path().canonicalize()?.join(".git");

    run_twig_command(repository_dir.path(), &["init"])
        .assert()
        .success()
        .stdout(format!(
            "Initialized empty Git repository in {}/\n",
            git_dir.display()
        ));

    repository_dir.child(".git/objects").assert(predicate::path::is_dir());
    repository_dir.child(".git/refs/heads").assert(predicate::path::is_dir());
    repository_dir.child(".git/refs/tags").assert(predicate::path::is_dir());
    repository_dir
        .child(".git/HEAD")
        .assert("ref: refs/heads/master\n");
    repository_dir
        .child(".git/config")
        .assert(predicate::str::contains("bare = false"));

    Ok(())
}

#[rstest]
fn init_into_a_new_directory(repository_dir: TempDir) {
    run_twig_command(repository_dir.path(), &["init", "nested/project"])
        .assert()
        .success();

    repository_dir
        .child("nested/project/.git/HEAD")
        .assert(predicate::path::is_file());
}

#[rstest]
fn reinitializing_keeps_head(repository_dir: TempDir) {
    run_twig_command(repository_dir.path(), &["init"])
        .assert()
        .success();
    repository_dir
        .child(".git/HEAD")
        .write_str("ref: refs/heads/topic\n")
        .unwrap();

    run_twig_command(repository_dir.path(), &["init"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Reinitialized existing Git repository"));

    repository_dir
        .child(".git/HEAD")
        .assert("ref: refs/heads/topic\n");
}

#[rstest]
fn bare_repositories_refuse_worktree_commands(repository_dir: TempDir) {
    run_twig_command(repository_dir.path(), &["init", "--bare"])
        .assert()
        .success();
    repository_dir.child("HEAD").assert(predicate::path::is_file());
    repository_dir
        .child("config")
        .assert(predicate::str::contains("bare = true"));

    run_twig_command(repository_dir.path(), &["rev-parse", "--is-bare-repository"])
        .assert()
        .success()
        .stdout("true\n");
    run_twig_command(repository_dir.path(), &["status"])
        .assert()
        .failure()
        .stderr("fatal: this operation must be run in a work tree\n");
}

#[rstest]
fn commands_outside_a_repository_are_fatal(repository_dir: TempDir) {
    run_twig_command(repository_dir.path(), &["status"])
        .assert()
        .code(128)
        .stderr(predicate::str::starts_with(
            "fatal: not a git repository (or any of the parent directories)",
        ));
}

#[rstest]
fn repositories_are_discovered_from_subdirectories(repository_dir: TempDir) {
    run_twig_command(repository_dir.path(), &["init"])
        .assert()
        .success();
    repository_dir.child("deep/er").create_dir_all().unwrap();

    run_twig_command(&repository_dir.path().join("deep/er"), &["status", "--porcelain"])
        .assert()
        .success()
        .stdout("");
}

#[rstest]
fn git_dir_overrides_discovery(repository_dir: TempDir) {
    run_twig_command(repository_dir.path(), &["init", "repo"])
        .assert()
        .success();
    repository_dir.child("elsewhere").create_dir_all().unwrap();

    run_twig_command(&repository_dir.path().join("elsewhere"), &["rev-parse", "--git-dir"])
        .env("GIT_DIR", "../repo/.git")
        .assert()
        .success()
        .stdout(predicate::str::ends_with("repo/.git\n"));
}
