use crate::common::command::{init_repository_dir, rev_parse, run_twig_command};
use crate::common::stdout_of;
use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::rstest;

mod common;

#[rstest]
fn annotated_tags_list_with_their_message(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["tag", "-m", "first release", "v1.0.0"])
        .assert()
        .success();

    let output = run_twig_command(dir.path(), &["tag", "-n", "1"])
        .assert()
        .success();
    let out = stdout_of(&output);
    assert!(out.contains("v1.0.0"));
    assert!(out.contains("first release"));

    run_twig_command(dir.path(), &["cat-file", "-t", "v1.0.0"])
        .assert()
        .success()
        .stdout("tag\n");
    let head = rev_parse(dir.path(), "HEAD");
    run_twig_command(dir.path(), &["cat-file", "-p", "v1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!("object {head}\ntype commit\ntag v1.0.0\n")));
}

#[rstest]
fn lightweight_tags_point_at_the_commit(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["tag", "light"])
        .assert()
        .success();

    pretty_assertions::assert_eq!(rev_parse(dir.path(), "light"), rev_parse(dir.path(), "HEAD"));
    run_twig_command(dir.path(), &["cat-file", "-t", "light"])
        .assert()
        .success()
        .stdout("commit\n");
}

#[rstest]
fn tags_are_listed_sorted(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    for name in ["v2", "v1", "alpha"] {
        run_twig_command(dir.path(), &["tag", name]).assert().success();
    }

    run_twig_command(dir.path(), &["tag"])
        .assert()
        .success()
        .stdout("alpha\nv1\nv2\n");
}

#[rstest]
fn deleting_a_tag(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["tag", "-m", "msg", "v1.0.0"])
        .assert()
        .success();

    run_twig_command(dir.path(), &["tag", "-d", "v1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Deleted tag 'v1.0.0' (was "));
    run_twig_command(dir.path(), &["tag"])
        .assert()
        .success()
        .stdout("");
}

#[rstest]
fn existing_tags_need_force(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["tag", "v1"]).assert().success();

    run_twig_command(dir.path(), &["tag", "v1"])
        .assert()
        .code(1)
        .stderr("error: tag 'v1' already exists\n");
    run_twig_command(dir.path(), &["tag", "-f", "v1"])
        .assert()
        .success();
}
