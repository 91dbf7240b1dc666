use crate::common::command::{
    commit_file, init_repository_dir, rev_parse, run_twig_command, twig_commit,
};
use crate::common::file::{FileSpec, read_file, snapshot_tree, write_file};
use crate::common::stdout_of;
use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::{fixture, rstest};

mod common;

/// `topic` and `master` both rewrite the single line of `f.txt`
#[fixture]
fn diverged_repository_dir(init_repository_dir: TempDir) -> TempDir {
    let dir = init_repository_dir;
    commit_file(dir.path(), "f.txt", "base\n", "add f");
    run_twig_command(dir.path(), &["branch", "topic"])
        .assert()
        .success();
    commit_file(dir.path(), "f.txt", "ours\n", "master edit");
    run_twig_command(dir.path(), &["checkout", "topic"])
        .assert()
        .success();
    commit_file(dir.path(), "f.txt", "theirs\n", "topic edit");
    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success();
    dir
}

fn ls_files_stage(dir: &TempDir) -> String {
    let output = run_twig_command(dir.path(), &["ls-files", "-s"])
        .assert()
        .success();
    stdout_of(&output)
}

#[rstest]
fn fast_forward(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let before = rev_parse(dir.path(), "HEAD");
    run_twig_command(dir.path(), &["checkout", "-b", "topic"])
        .assert()
        .success();
    commit_file(dir.path(), "t.txt", "t\n", "topic work");
    let tip = rev_parse(dir.path(), "HEAD");
    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success();

    run_twig_command(dir.path(), &["merge", "topic"])
        .assert()
        .success()
        .stdout(format!(
            "Updating {}..{}\nFast-forward\n",
            &before[..7],
            &tip[..7]
        ));

    pretty_assertions::assert_eq!(rev_parse(dir.path(), "master"), tip);
    pretty_assertions::assert_eq!(read_file(&dir.path().join("t.txt")), "t\n");
    run_twig_command(dir.path(), &["rev-list", "topic..master"])
        .assert()
        .success()
        .stdout("");
}

#[rstest]
fn merging_an_ancestor_is_a_no_op(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["branch", "old"])
        .assert()
        .success();
    commit_file(dir.path(), "x.txt", "x\n", "newer");
    let head = rev_parse(dir.path(), "HEAD");

    run_twig_command(dir.path(), &["merge", "old"])
        .assert()
        .success()
        .stdout("Already up to date.\n");
    pretty_assertions::assert_eq!(rev_parse(dir.path(), "HEAD"), head);
}

#[rstest]
fn clean_three_way_merge(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["checkout", "-b", "topic"])
        .assert()
        .success();
    commit_file(dir.path(), "t.txt", "t\n", "topic work");
    let topic = rev_parse(dir.path(), "HEAD");
    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success();
    commit_file(dir.path(), "m.txt", "m\n", "master work");
    let master = rev_parse(dir.path(), "HEAD");

    run_twig_command(dir.path(), &["merge", "topic"])
        .assert()
        .success()
        .stdout("Merge made by the 'ort' strategy.\n");

    pretty_assertions::assert_eq!(rev_parse(dir.path(), "HEAD^1"), master);
    pretty_assertions::assert_eq!(rev_parse(dir.path(), "HEAD^2"), topic);
    pretty_assertions::assert_eq!(read_file(&dir.path().join("t.txt")), "t\n");
    pretty_assertions::assert_eq!(read_file(&dir.path().join("m.txt")), "m\n");
    run_twig_command(dir.path(), &["log", "-n", "1", "--format", "oneline"])
        .assert()
        .success()
        .stdout(predicate::str::ends_with(" Merge branch 'topic'\n"));
}

#[rstest]
fn conflicting_merge_stops_with_markers(diverged_repository_dir: TempDir) {
    let dir = diverged_repository_dir;

    run_twig_command(dir.path(), &["merge", "topic"])
        .assert()
        .success()
        .stdout(
            "CONFLICT (content): Merge conflict in f.txt\n\
             Automatic merge failed; fix conflicts and then commit the result.\n",
        );

    pretty_assertions::assert_eq!(
        read_file(&dir.path().join("f.txt")),
        "<<<<<<< HEAD\nours\n=======\ntheirs\n>>>>>>> topic\n"
    );
    run_twig_command(dir.path(), &["status", "--porcelain"])
        .assert()
        .success()
        .stdout("UU f.txt\n");
    let stages = ls_files_stage(&dir);
    assert!(stages.contains(" 1\tf.txt\n"));
    assert!(stages.contains(" 2\tf.txt\n"));
    assert!(stages.contains(" 3\tf.txt\n"));
}

#[rstest]
fn abort_restores_the_previous_state(
    diverged_repository_dir: TempDir,
    #[values(false, true)] local_edit: bool,
) {
    let dir = diverged_repository_dir;
    if local_edit {
        write_file(FileSpec::new(dir.path().join("1.txt"), "edited locally".to_string()));
    }
    let head = rev_parse(dir.path(), "HEAD");
    let files_before = snapshot_tree(dir.path());
    let stages_before = ls_files_stage(&dir);

    run_twig_command(dir.path(), &["merge", "topic"])
        .assert()
        .success();
    run_twig_command(dir.path(), &["merge", "--abort"])
        .assert()
        .success();

    pretty_assertions::assert_eq!(rev_parse(dir.path(), "HEAD"), head);
    pretty_assertions::assert_eq!(snapshot_tree(dir.path()), files_before);
    pretty_assertions::assert_eq!(ls_files_stage(&dir), stages_before);
    run_twig_command(dir.path(), &["merge", "--abort"])
        .assert()
        .code(1)
        .stderr("error: There is no merge in progress\n");
}

#[rstest]
fn resolving_and_committing_concludes_the_merge(diverged_repository_dir: TempDir) {
    let dir = diverged_repository_dir;
    let master = rev_parse(dir.path(), "master");
    let topic = rev_parse(dir.path(), "topic");
    run_twig_command(dir.path(), &["merge", "topic"])
        .assert()
        .success();

    twig_commit(dir.path(), "too early")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("f.txt: needs merge"));

    write_file(FileSpec::new(dir.path().join("f.txt"), "resolved\n".to_string()));
    run_twig_command(dir.path(), &["add", "f.txt"])
        .assert()
        .success();
    run_twig_command(dir.path(), &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All conflicts fixed but you are still merging."));
    run_twig_command(dir.path(), &["merge", "--continue"])
        .assert()
        .success();

    pretty_assertions::assert_eq!(rev_parse(dir.path(), "HEAD^1"), master);
    pretty_assertions::assert_eq!(rev_parse(dir.path(), "HEAD^2"), topic);
    run_twig_command(dir.path(), &["status", "--porcelain"])
        .assert()
        .success()
        .stdout("");
}

#[rstest]
fn a_second_merge_is_refused_while_one_is_pending(diverged_repository_dir: TempDir) {
    let dir = diverged_repository_dir;
    run_twig_command(dir.path(), &["merge", "topic"])
        .assert()
        .success();

    run_twig_command(dir.path(), &["merge", "topic"])
        .assert()
        .code(1);
}

#[rstest]
fn unknown_targets_cannot_be_merged(init_repository_dir: TempDir) {
    run_twig_command(init_repository_dir.path(), &["merge", "nowhere"])
        .assert()
        .code(1)
        .stderr("error: nowhere - not something we can merge\n");
}

#[rstest]
fn merge_refuses_to_overwrite_local_changes(diverged_repository_dir: TempDir) {
    let dir = diverged_repository_dir;
    write_file(FileSpec::new(dir.path().join("f.txt"), "local\n".to_string()));

    run_twig_command(dir.path(), &["merge", "topic"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Your local changes to the following files would be overwritten by merge",
        ));
    pretty_assertions::assert_eq!(read_file(&dir.path().join("f.txt")), "local\n");
}

#[rstest]
fn abort_removes_what_the_merge_brought_in(diverged_repository_dir: TempDir) {
    let dir = diverged_repository_dir;
    run_twig_command(dir.path(), &["checkout", "topic"])
        .assert()
        .success();
    commit_file(dir.path(), "new/t.txt", "t\n", "topic adds a file");
    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success();
    write_file(FileSpec::new(dir.path().join("1.txt"), "edited locally".to_string()));
    let files_before = snapshot_tree(dir.path());

    run_twig_command(dir.path(), &["merge", "topic"])
        .assert()
        .success();
    assert!(dir.path().join("new/t.txt").is_file());
    run_twig_command(dir.path(), &["merge", "--abort"])
        .assert()
        .success();

    pretty_assertions::assert_eq!(snapshot_tree(dir.path()), files_before);
    assert!(!dir.path().join("new").exists());
    run_twig_command(dir.path(), &["status", "--porcelain"])
        .assert()
        .success()
        .stdout(" M 1.txt\n");
}

#[rstest]
fn three_way_merge_refuses_staged_changes(diverged_repository_dir: TempDir) {
    let dir = diverged_repository_dir;
    let head = rev_parse(dir.path(), "HEAD");
    write_file(FileSpec::new(dir.path().join("1.txt"), "staged".to_string()));
    run_twig_command(dir.path(), &["add", "1.txt"])
        .assert()
        .success();

    run_twig_command(dir.path(), &["merge", "topic"])
        .assert()
        .code(1)
        .stderr(
            "error: Your local changes to the following files would be overwritten by merge:\n\
             \t1.txt\n\
             Please commit your changes or stash them before you merge.\n\
             Aborting\n",
        );

    pretty_assertions::assert_eq!(rev_parse(dir.path(), "HEAD"), head);
    run_twig_command(dir.path(), &["status", "--porcelain"])
        .assert()
        .success()
        .stdout("M  1.txt\n");
}

#[rstest]
fn merge_commit_holds_only_the_merge_result(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["branch", "side"])
        .assert()
        .success();
    commit_file(dir.path(), "m.txt", "m\n", "master work");
    run_twig_command(dir.path(), &["checkout", "side"])
        .assert()
        .success();
    commit_file(dir.path(), "s.txt", "s\n", "side work");
    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success();
    write_file(FileSpec::new(dir.path().join("1.txt"), "unstaged".to_string()));

    run_twig_command(dir.path(), &["merge", "side"])
        .assert()
        .success();

    run_twig_command(dir.path(), &["diff", "--name-only", "HEAD^1", "HEAD"])
        .assert()
        .success()
        .stdout("s.txt\n");
    pretty_assertions::assert_eq!(read_file(&dir.path().join("1.txt")), "unstaged");
}
