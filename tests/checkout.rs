use crate::common::command::{commit_file, init_repository_dir, rev_parse, run_twig_command};
use crate::common::file::{FileSpec, read_file, write_file};
use crate::common::stderr_of;
use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::rstest;

mod common;

#[rstest]
fn create_and_switch_branches(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    run_twig_command(dir.path(), &["checkout", "-b", "topic"])
        .assert()
        .success()
        .stderr("Switched to a new branch 'topic'\n");
    commit_file(dir.path(), "t.txt", "t\n", "topic work");

    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success()
        .stderr("Switched to branch 'master'\n");
    assert!(!dir.path().join("t.txt").exists());

    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success()
        .stderr("Already on 'master'\n");

    run_twig_command(dir.path(), &["checkout", "topic"])
        .assert()
        .success();
    pretty_assertions::assert_eq!(read_file(&dir.path().join("t.txt")), "t\n");
}

#[rstest]
fn switching_removes_emptied_directories(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["checkout", "-b", "topic"])
        .assert()
        .success();
    commit_file(dir.path(), "deep/nested/f.txt", "f\n", "nested");

    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success();

    assert!(!dir.path().join("deep").exists());
}

#[rstest]
fn unknown_targets_are_pathspec_errors(init_repository_dir: TempDir) {
    run_twig_command(init_repository_dir.path(), &["checkout", "nope"])
        .assert()
        .code(1)
        .stderr("fatal: pathspec 'nope' did not match any file(s) known to git\n");
}

#[rstest]
fn detached_head(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let root = rev_parse(dir.path(), "HEAD");
    commit_file(dir.path(), "x.txt", "x\n", "second");

    let output = run_twig_command(dir.path(), &["checkout", &root])
        .assert()
        .success();
    let err = stderr_of(&output);
    assert!(err.contains("You are in 'detached HEAD' state."));
    assert!(err.ends_with(&format!("HEAD is now at {} Initial commit\n", &root[..7])));

    pretty_assertions::assert_eq!(rev_parse(dir.path(), "HEAD"), root);
    assert!(!dir.path().join("x.txt").exists());
    run_twig_command(dir.path(), &["branch"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!(
            "* (HEAD detached at {})\n",
            &root[..7]
        )));

    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success()
        .stderr(predicate::str::starts_with(format!(
            "Previous HEAD position was {} Initial commit\n",
            &root[..7]
        )));
}

#[rstest]
fn local_changes_block_a_switch(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["checkout", "-b", "topic"])
        .assert()
        .success();
    commit_file(dir.path(), "1.txt", "topic\n", "topic edit");
    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success();
    write_file(FileSpec::new(dir.path().join("1.txt"), "local".to_string()));

    run_twig_command(dir.path(), &["checkout", "topic"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Your local changes to the following files would be overwritten by checkout:\n\
             \t1.txt\n",
        ));
    pretty_assertions::assert_eq!(read_file(&dir.path().join("1.txt")), "local");

    run_twig_command(dir.path(), &["checkout", "-f", "topic"])
        .assert()
        .success();
    pretty_assertions::assert_eq!(read_file(&dir.path().join("1.txt")), "topic\n");
}

#[rstest]
fn untracked_files_in_the_way_block_a_switch(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["checkout", "-b", "topic"])
        .assert()
        .success();
    commit_file(dir.path(), "new.txt", "tracked\n", "add new");
    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success();
    write_file(FileSpec::new(dir.path().join("new.txt"), "untracked".to_string()));

    run_twig_command(dir.path(), &["checkout", "topic"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "The following untracked working tree files would be overwritten by checkout:",
        ));
}

#[rstest]
fn unrelated_local_changes_are_carried_along(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["branch", "topic"])
        .assert()
        .success();
    write_file(FileSpec::new(dir.path().join("a/2.txt"), "edited".to_string()));

    run_twig_command(dir.path(), &["checkout", "topic"])
        .assert()
        .success();

    pretty_assertions::assert_eq!(read_file(&dir.path().join("a/2.txt")), "edited");
}

#[rstest]
fn restoring_paths(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(dir.path().join("1.txt"), "scribbled".to_string()));
    std::fs::remove_file(dir.path().join("a/b/3.txt")).unwrap();

    run_twig_command(dir.path(), &["checkout", "--", "1.txt", "a"])
        .assert()
        .success();

    pretty_assertions::assert_eq!(read_file(&dir.path().join("1.txt")), "one");
    pretty_assertions::assert_eq!(read_file(&dir.path().join("a/b/3.txt")), "three");
    run_twig_command(dir.path(), &["status", "--porcelain"])
        .assert()
        .success()
        .stdout("");
}

#[rstest]
fn restoring_paths_from_a_commit(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    commit_file(dir.path(), "1.txt", "newer\n", "rewrite");

    run_twig_command(dir.path(), &["checkout", "HEAD~1", "--", "1.txt"])
        .assert()
        .success();

    pretty_assertions::assert_eq!(read_file(&dir.path().join("1.txt")), "one");
    run_twig_command(dir.path(), &["status", "--porcelain"])
        .assert()
        .success()
        .stdout("M  1.txt\n");
}

#[rstest]
fn reset_branch_with_capital_b(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let root = rev_parse(dir.path(), "HEAD");
    run_twig_command(dir.path(), &["branch", "topic"])
        .assert()
        .success();
    commit_file(dir.path(), "x.txt", "x\n", "second");
    let head = rev_parse(dir.path(), "HEAD");

    run_twig_command(dir.path(), &["checkout", "-b", "topic"])
        .assert()
        .code(1);
    run_twig_command(dir.path(), &["checkout", "-B", "topic"])
        .assert()
        .success();

    assert_ne!(root, head);
    pretty_assertions::assert_eq!(rev_parse(dir.path(), "topic"), head);
}
