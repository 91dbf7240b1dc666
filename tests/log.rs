use crate::common::command::{
    commit_file, init_repository_dir, random_author, repository_dir, rev_parse, run_twig_command,
    twig_commit_as,
};
use crate::common::file::{FileSpec, write_file};
use crate::common::stdout_of;
use assert_fs::TempDir;
use predicates::prelude::{PredicateBooleanExt, predicate};
use rstest::rstest;

mod common;

#[rstest]
fn medium_format_shows_every_commit(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    commit_file(dir.path(), "x.txt", "x\n", "Second commit\n\nWith a body.");
    let head = rev_parse(dir.path(), "HEAD");
    let root = rev_parse(dir.path(), "HEAD~1");

    run_twig_command(dir.path(), &["log"])
        .assert()
        .success()
        .stdout(format!(
            "commit {head}\n\
             Author: fake_user <fake_email@email.com>\n\
             Date:   Sun Jan 1 12:00:00 2023 +0000\n\
             \n    Second commit\n    \n    With a body.\n\
             \n\
             commit {root}\n\
             Author: fake_user <fake_email@email.com>\n\
             Date:   Sun Jan 1 12:00:00 2023 +0000\n\
             \n    Initial commit\n"
        ));
}

#[rstest]
fn oneline_format_abbreviates(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    commit_file(dir.path(), "x.txt", "x\n", "Second commit");
    let head = rev_parse(dir.path(), "HEAD")[..7].to_string();
    let root = rev_parse(dir.path(), "HEAD^")[..7].to_string();

    run_twig_command(dir.path(), &["log", "--oneline"])
        .assert()
        .success()
        .stdout(format!("{head} Second commit\n{root} Initial commit\n"));
}

#[rstest]
fn decorations_name_refs_pointing_at_commits(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["tag", "v1"]).assert().success();
    let head = rev_parse(dir.path(), "HEAD")[..7].to_string();

    run_twig_command(dir.path(), &["log", "--oneline", "--decorate"])
        .assert()
        .success()
        .stdout(format!("{head} (HEAD -> master, tag: v1) Initial commit\n"));
}

#[rstest]
fn reset_drops_commits_from_history(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let (name, email) = random_author();
    write_file(FileSpec::new(dir.path().join("x.txt"), "x\n".to_string()));
    run_twig_command(dir.path(), &["add", "x.txt"])
        .assert()
        .success();
    twig_commit_as(dir.path(), "by someone else", &name, &email)
        .assert()
        .success();

    run_twig_command(dir.path(), &["log"])
        .assert()
        .success()
        .stdout(predicate::str::contains(name.as_str()));

    run_twig_command(dir.path(), &["reset", "--hard", "HEAD~1"])
        .assert()
        .success();

    run_twig_command(dir.path(), &["log"])
        .assert()
        .success()
        .stdout(predicate::str::contains(name.as_str()).not());
}

#[rstest]
fn max_count_and_ranges(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    for n in 1..=3 {
        commit_file(dir.path(), "n.txt", &format!("{n}\n"), &format!("commit {n}"));
    }

    let output = run_twig_command(dir.path(), &["log", "--oneline", "-n", "2"])
        .assert()
        .success();
    let subjects = stdout_of(&output)
        .lines()
        .map(|line| line.split_once(' ').map(|(_, s)| s.to_string()).unwrap_or_default())
        .collect::<Vec<_>>();
    pretty_assertions::assert_eq!(subjects, vec!["commit 3", "commit 2"]);

    let output = run_twig_command(dir.path(), &["log", "--oneline", "HEAD~2..HEAD"])
        .assert()
        .success();
    pretty_assertions::assert_eq!(stdout_of(&output).lines().count(), 2);
}

#[rstest]
fn path_limited_history(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    commit_file(dir.path(), "x.txt", "x\n", "touch x");
    commit_file(dir.path(), "y.txt", "y\n", "touch y");

    let output = run_twig_command(dir.path(), &["log", "--oneline", "--", "x.txt"])
        .assert()
        .success();

    let out = stdout_of(&output);
    assert!(out.contains("touch x"));
    assert!(!out.contains("touch y"));
    assert!(!out.contains("Initial commit"));
}

#[rstest]
fn patch_shows_changes(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    commit_file(dir.path(), "1.txt", "uno\n", "rewrite one");

    run_twig_command(dir.path(), &["log", "-p", "-n", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("diff --git a/1.txt b/1.txt"))
        .stdout(predicate::str::contains("-one\n\\ No newline at end of file\n+uno\n"));
}

#[rstest]
fn unborn_branch_prints_nothing(repository_dir: TempDir) {
    run_twig_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    run_twig_command(repository_dir.path(), &["log"])
        .assert()
        .success()
        .stdout("");
}

#[rstest]
fn merge_commits_list_their_parents(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["checkout", "-b", "topic"])
        .assert()
        .success();
    commit_file(dir.path(), "t.txt", "t\n", "topic work");
    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success();
    commit_file(dir.path(), "m.txt", "m\n", "master work");
    run_twig_command(dir.path(), &["merge", "topic", "-m", "Merge topic"])
        .assert()
        .success();

    let ours = rev_parse(dir.path(), "HEAD^1")[..7].to_string();
    let theirs = rev_parse(dir.path(), "HEAD^2")[..7].to_string();
    run_twig_command(dir.path(), &["log", "-n", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Merge: {ours} {theirs}\n")));
}

#[rstest]
#[case::full(
    "--format=full",
    "Author: fake_user <fake_email@email.com>\n\
     Commit: fake_user <fake_email@email.com>\n"
)]
#[case::fuller(
    "--format=fuller",
    "Author:     fake_user <fake_email@email.com>\n\
     AuthorDate: Sun Jan 1 12:00:00 2023 +0000\n\
     Commit:     fake_user <fake_email@email.com>\n\
     CommitDate: Sun Jan 1 12:00:00 2023 +0000\n"
)]
fn full_formats_name_the_committer(
    init_repository_dir: TempDir,
    #[case] flag: &str,
    #[case] header: &str,
) {
    let dir = init_repository_dir;
    let root = rev_parse(dir.path(), "HEAD");

    run_twig_command(dir.path(), &["log", flag])
        .assert()
        .success()
        .stdout(format!("commit {root}\n{header}\n    Initial commit\n"));
}

#[rstest]
fn full_format_separates_commits(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let (name, email) = random_author();
    write_file(FileSpec::new(dir.path().join("x.txt"), "x\n".to_string()));
    run_twig_command(dir.path(), &["add", "x.txt"])
        .assert()
        .success();
    twig_commit_as(dir.path(), "by someone else", &name, &email)
        .assert()
        .success();

    let output = run_twig_command(dir.path(), &["log", "--format=full", "-n", "1"])
        .assert()
        .success();
    let out = stdout_of(&output);
    assert!(out.contains(&format!("Author: {name} <{email}>\n")));
    assert!(out.contains("Commit: fake_user <fake_email@email.com>\n"));
    assert!(!out.contains("Date"));

    let output = run_twig_command(dir.path(), &["log", "--format=fuller"])
        .assert()
        .success();
    assert_eq!(stdout_of(&output).matches("\n\ncommit ").count(), 1);
}
