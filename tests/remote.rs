use crate::common::command::{init_repository_dir, repository_dir, rev_parse, run_twig_command};
use crate::common::file::{FileSpec, write_file};
use crate::common::stdout_of;
use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::{fixture, rstest};

mod common;

const ORIGIN_URL: &str = "https://example.com/user/repo.git";
const UPSTREAM_URL: &str = "https://example.com/upstream/repo.git";

fn twig_stdout(dir: &TempDir, args: &[&str]) -> String {
    let output = run_twig_command(dir.path(), args).assert().success();
    stdout_of(&output)
}

/// A repository with `origin`, a tracking branch, a symbolic `origin/HEAD` and `master`
/// following `origin/master`
#[fixture]
fn tracking_repository_dir(init_repository_dir: TempDir) -> TempDir {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["remote", "add", "origin", ORIGIN_URL])
        .assert()
        .success();
    run_twig_command(dir.path(), &["update-ref", "refs/remotes/origin/master", "HEAD"])
        .assert()
        .success();
    write_file(FileSpec::new(
        dir.path().join(".git/refs/remotes/origin/HEAD"),
        "ref: refs/remotes/origin/master\n".to_string(),
    ));
    for (key, value) in [
        ("branch.master.remote", "origin"),
        ("branch.master.merge", "refs/heads/master"),
    ] {
        run_twig_command(dir.path(), &["config", key, value])
            .assert()
            .success();
    }
    dir
}

#[rstest]
fn fresh_repository_has_no_remotes(repository_dir: TempDir) {
    run_twig_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    run_twig_command(repository_dir.path(), &["remote"])
        .assert()
        .success()
        .stdout("");
}

#[rstest]
fn added_remotes_are_listed_in_order(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["remote", "add", "origin", ORIGIN_URL])
        .assert()
        .success()
        .stdout("");
    run_twig_command(dir.path(), &["remote", "add", "upstream", UPSTREAM_URL])
        .assert()
        .success();

    assert_eq!(twig_stdout(&dir, &["remote"]), "origin\nupstream\n");
    assert_eq!(
        twig_stdout(&dir, &["remote", "-v"]),
        format!(
            "origin\t{ORIGIN_URL} (fetch)\norigin\t{ORIGIN_URL} (push)\n\
             upstream\t{UPSTREAM_URL} (fetch)\nupstream\t{UPSTREAM_URL} (push)\n"
        )
    );
    assert_eq!(
        twig_stdout(&dir, &["remote", "show", "-v"]),
        twig_stdout(&dir, &["remote", "-v"])
    );
    assert_eq!(
        twig_stdout(&dir, &["config", "remote.upstream.fetch"]),
        "+refs/heads/*:refs/remotes/upstream/*\n"
    );
}

#[rstest]
#[case::duplicate(
    &["remote", "add", "origin", UPSTREAM_URL],
    "error: remote origin already exists.\n"
)]
#[case::remove_unknown(&["remote", "remove", "nope"], "error: No such remote: 'nope'\n")]
#[case::rename_unknown(
    &["remote", "rename", "nope", "new"],
    "error: No such remote: 'nope'\n"
)]
#[case::rename_onto_existing(
    &["remote", "rename", "origin", "origin"],
    "error: remote origin already exists.\n"
)]
#[case::set_url_unknown(
    &["remote", "set-url", "nope", ORIGIN_URL],
    "error: No such remote: 'nope'\n"
)]
#[case::show_unknown(&["remote", "show", "nope"], "error: No such remote: 'nope'\n")]
fn remote_errors(init_repository_dir: TempDir, #[case] args: &[&str], #[case] stderr: &str) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["remote", "add", "origin", ORIGIN_URL])
        .assert()
        .success();

    run_twig_command(dir.path(), args)
        .assert()
        .code(1)
        .stderr(stderr.to_string());
    assert_eq!(twig_stdout(&dir, &["remote"]), "origin\n");
}

#[rstest]
fn invalid_remote_names_are_refused(init_repository_dir: TempDir) {
    run_twig_command(
        init_repository_dir.path(),
        &["remote", "add", "bad name", ORIGIN_URL],
    )
    .assert()
    .code(1)
    .stderr(predicate::str::contains("is not a valid remote name"));
}

#[rstest]
fn missing_url_is_a_usage_error(init_repository_dir: TempDir) {
    run_twig_command(init_repository_dir.path(), &["remote", "add", "origin"])
        .assert()
        .code(129)
        .stderr(predicate::str::contains("<URL>"));
}

#[rstest]
#[case::remove("remove")]
#[case::rm("rm")]
fn remove_forgets_the_remote_and_its_tracking_branches(
    tracking_repository_dir: TempDir,
    #[case] command: &str,
) {
    let dir = tracking_repository_dir;

    run_twig_command(dir.path(), &["remote", command, "origin"])
        .assert()
        .success();

    assert_eq!(twig_stdout(&dir, &["remote"]), "");
    assert_eq!(twig_stdout(&dir, &["branch", "-r"]), "");
    assert!(!dir.path().join(".git/refs/remotes/origin").exists());
    run_twig_command(dir.path(), &["config", "branch.master.remote"])
        .assert()
        .code(1);
    run_twig_command(dir.path(), &["config", "branch.master.merge"])
        .assert()
        .code(1);
}

#[rstest]
fn rename_moves_tracking_branches_and_followers(tracking_repository_dir: TempDir) {
    let dir = tracking_repository_dir;
    let head = rev_parse(dir.path(), "HEAD");

    run_twig_command(dir.path(), &["remote", "rename", "origin", "upstream"])
        .assert()
        .success();

    assert_eq!(twig_stdout(&dir, &["remote", "-v"]).lines().count(), 2);
    assert_eq!(twig_stdout(&dir, &["remote"]), "upstream\n");
    assert_eq!(
        twig_stdout(&dir, &["branch", "-r"]),
        "  upstream/HEAD -> upstream/master\n  upstream/master\n"
    );
    assert_eq!(rev_parse(dir.path(), "upstream/master"), head);
    assert!(!dir.path().join(".git/refs/remotes/origin").exists());
    assert_eq!(
        twig_stdout(&dir, &["config", "remote.upstream.fetch"]),
        "+refs/heads/*:refs/remotes/upstream/*\n"
    );
    assert_eq!(
        twig_stdout(&dir, &["config", "remote.upstream.url"]),
        format!("{ORIGIN_URL}\n")
    );
    assert_eq!(
        twig_stdout(&dir, &["config", "branch.master.remote"]),
        "upstream\n"
    );
}

#[rstest]
fn set_url_changes_fetch_or_push_url(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let push_url = "https://example.com/user/push.git";
    run_twig_command(dir.path(), &["remote", "add", "origin", ORIGIN_URL])
        .assert()
        .success();

    run_twig_command(dir.path(), &["remote", "set-url", "origin", UPSTREAM_URL])
        .assert()
        .success();
    assert_eq!(
        twig_stdout(&dir, &["remote", "show", "origin"]),
        format!("* remote origin\n  Fetch URL: {UPSTREAM_URL}\n  Push  URL: {UPSTREAM_URL}\n")
    );

    run_twig_command(dir.path(), &["remote", "set-url", "--push", "origin", push_url])
        .assert()
        .success();
    assert_eq!(
        twig_stdout(&dir, &["remote", "-v"]),
        format!("origin\t{UPSTREAM_URL} (fetch)\norigin\t{push_url} (push)\n")
    );
}

#[rstest]
fn show_describes_tracking_state(tracking_repository_dir: TempDir) {
    let dir = tracking_repository_dir;
    run_twig_command(dir.path(), &["update-ref", "refs/remotes/origin/topic", "HEAD"])
        .assert()
        .success();

    run_twig_command(dir.path(), &["remote", "show", "origin"])
        .assert()
        .success()
        .stdout(format!(
            "* remote origin\n  \
             Fetch URL: {ORIGIN_URL}\n  \
             Push  URL: {ORIGIN_URL}\n  \
             HEAD branch: master\n  \
             Remote branches:\n    \
             master\n    \
             topic\n  \
             Local branches configured for 'twig pull':\n    \
             master merges with remote master\n"
        ));
}
