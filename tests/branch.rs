use crate::common::command::{commit_file, init_repository_dir, rev_parse, run_twig_command};
use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::rstest;

mod common;

#[rstest]
fn create_list_and_delete_a_branch(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    run_twig_command(dir.path(), &["branch", "foregone"])
        .assert()
        .success()
        .stdout("");
    run_twig_command(dir.path(), &["branch"])
        .assert()
        .success()
        .stdout("  foregone\n* master\n");

    let short = rev_parse(dir.path(), "foregone")[..7].to_string();
    run_twig_command(dir.path(), &["branch", "-d", "foregone"])
        .assert()
        .success()
        .stdout(format!("Deleted branch foregone (was {short}).\n"));
    run_twig_command(dir.path(), &["branch"])
        .assert()
        .success()
        .stdout("* master\n");
}

#[rstest]
fn branch_from_a_start_point(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let first = rev_parse(dir.path(), "HEAD");
    commit_file(dir.path(), "x.txt", "x\n", "second");

    run_twig_command(dir.path(), &["branch", "old", "HEAD~1"])
        .assert()
        .success();

    pretty_assertions::assert_eq!(rev_parse(dir.path(), "old"), first);
}

#[rstest]
#[case("feature/login")]
#[case("release-1.0")]
fn hierarchical_and_dotted_names(init_repository_dir: TempDir, #[case] name: &str) {
    run_twig_command(init_repository_dir.path(), &["branch", name])
        .assert()
        .success();

    run_twig_command(init_repository_dir.path(), &["branch"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("  {name}\n")));
}

#[rstest]
#[case("bad..name")]
#[case("-leading")]
#[case("trailing.lock")]
#[case("with space")]
fn invalid_names_are_rejected(init_repository_dir: TempDir, #[case] name: &str) {
    run_twig_command(init_repository_dir.path(), &["branch", "--", name])
        .assert()
        .failure();
}

#[rstest]
fn duplicate_branches_are_rejected(init_repository_dir: TempDir) {
    run_twig_command(init_repository_dir.path(), &["branch", "topic"])
        .assert()
        .success();

    run_twig_command(init_repository_dir.path(), &["branch", "topic"])
        .assert()
        .code(1)
        .stderr("error: a ref named 'topic' already exists\n");
}

#[rstest]
fn unmerged_branches_need_force(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["checkout", "-b", "topic"])
        .assert()
        .success();
    commit_file(dir.path(), "t.txt", "t\n", "topic work");
    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success();

    run_twig_command(dir.path(), &["branch", "-d", "topic"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("is not fully merged"));
    run_twig_command(dir.path(), &["branch", "-D", "topic"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Deleted branch topic"));
}

#[rstest]
fn the_current_branch_cannot_be_deleted(init_repository_dir: TempDir) {
    run_twig_command(init_repository_dir.path(), &["branch", "-D", "master"])
        .assert()
        .code(1)
        .stderr("error: cannot delete branch 'master' checked out\n");
}

#[rstest]
fn verbose_listing_shows_commits(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["branch", "topic"])
        .assert()
        .success();
    let short = rev_parse(dir.path(), "HEAD")[..7].to_string();

    run_twig_command(dir.path(), &["branch", "-v"])
        .assert()
        .success()
        .stdout(format!(
            "* master {short} Initial commit\n  topic  {short} Initial commit\n"
        ));
}

#[rstest]
fn remote_tracking_branches_are_listed_on_request(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["update-ref", "refs/remotes/origin/master", "HEAD"])
        .assert()
        .success();
    std::fs::write(
        dir.path().join(".git/refs/remotes/origin/HEAD"),
        "ref: refs/remotes/origin/master\n",
    )
    .unwrap();

    run_twig_command(dir.path(), &["branch"])
        .assert()
        .success()
        .stdout("* master\n");
    run_twig_command(dir.path(), &["branch", "-r"])
        .assert()
        .success()
        .stdout("  origin/HEAD -> origin/master\n  origin/master\n");
    run_twig_command(dir.path(), &["branch", "-a"])
        .assert()
        .success()
        .stdout("* master\n  remotes/origin/HEAD -> origin/master\n  remotes/origin/master\n");

    let short = rev_parse(dir.path(), "HEAD")[..7].to_string();
    run_twig_command(dir.path(), &["branch", "-a", "-v"])
        .assert()
        .success()
        .stdout(format!(
            "* master                {short} Initial commit\n  \
             remotes/origin/HEAD -> origin/master\n  \
             remotes/origin/master {short} Initial commit\n"
        ));
}

#[rstest]
fn remote_tracking_branches_can_be_deleted(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["update-ref", "refs/remotes/origin/topic", "HEAD"])
        .assert()
        .success();
    let short = rev_parse(dir.path(), "HEAD")[..7].to_string();

    run_twig_command(dir.path(), &["branch", "-d", "-r", "origin/topic"])
        .assert()
        .success()
        .stdout(format!("Deleted remote-tracking branch origin/topic (was {short}).\n"));
    run_twig_command(dir.path(), &["branch", "-r"])
        .assert()
        .success()
        .stdout("");
    run_twig_command(dir.path(), &["branch", "-d", "-r", "origin/topic"])
        .assert()
        .code(1)
        .stderr("error: remote-tracking branch 'origin/topic' not found.\n");
}
