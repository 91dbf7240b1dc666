use crate::common::command::{init_repository_dir, repository_dir, run_twig_command, twig_commit};
use crate::common::file::{FileSpec, write_file, write_generated_files};
use assert_fs::TempDir;
use rstest::rstest;

mod common;

fn porcelain(dir: &TempDir) -> String {
    let output = run_twig_command(dir.path(), &["status", "--porcelain"])
        .assert()
        .success();
    String::from_utf8_lossy(&output.get_output().stdout).into_owned()
}

#[rstest]
fn staged_new_file_in_long_format(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(dir.path().join("x.txt"), "x\n".to_string()));
    run_twig_command(dir.path(), &["add", "x.txt"])
        .assert()
        .success();

    run_twig_command(dir.path(), &["status", "--long"])
        .assert()
        .success()
        .stdout(
            "On branch master\n\
             \n\
             Changes to be committed:\n  (use \"twig reset HEAD <file>...\" to unstage)\n\
             \tnew file:   x.txt\n\
             \n",
        );
}

#[rstest]
fn clean_tree_in_long_format(init_repository_dir: TempDir) {
    run_twig_command(init_repository_dir.path(), &["status"])
        .assert()
        .success()
        .stdout("On branch master\n\nnothing to commit, working tree clean\n");
}

#[rstest]
fn unborn_branch_in_long_format(repository_dir: TempDir) {
    run_twig_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    run_twig_command(repository_dir.path(), &["status"])
        .assert()
        .success()
        .stdout(
            "On branch master\n\nNo commits yet\n\n\
             nothing to commit (create/copy files and use \"twig add\" to track)\n",
        );
}

#[rstest]
fn every_kind_of_change_in_short_format(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(dir.path().join("1.txt"), "changed".to_string()));
    std::fs::remove_file(dir.path().join("a/2.txt")).unwrap();
    write_file(FileSpec::new(dir.path().join("staged.txt"), "new".to_string()));
    run_twig_command(dir.path(), &["add", "staged.txt"])
        .assert()
        .success();
    write_file(FileSpec::new(dir.path().join("zz.txt"), "untracked".to_string()));

    pretty_assertions::assert_eq!(
        porcelain(&dir),
        " M 1.txt\n D a/2.txt\nA  staged.txt\n?? zz.txt\n"
    );
}

#[rstest]
fn untracked_directories_collapse(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(dir.path().join("new/dir/f.txt"), "f".to_string()));
    std::fs::create_dir_all(dir.path().join("empty/dir")).unwrap();
    write_file(FileSpec::new(dir.path().join("a/b/4.txt"), "four".to_string()));

    pretty_assertions::assert_eq!(porcelain(&dir), "?? a/b/4.txt\n?? new/\n");
}

#[rstest]
fn touched_files_are_not_modified(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let path = dir.path().join("1.txt");
    let later = filetime::FileTime::from_unix_time(2_000_000_000, 0);
    filetime::set_file_mtime(&path, later).unwrap();

    pretty_assertions::assert_eq!(porcelain(&dir), "");
}

#[rstest]
fn same_size_modifications_are_detected(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(dir.path().join("1.txt"), "uno".to_string()));

    pretty_assertions::assert_eq!(porcelain(&dir), " M 1.txt\n");
}

#[rstest]
fn ignored_files_are_not_listed(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(dir.path().join(".gitignore"), "*.log\nbuild/\n".to_string()));
    write_file(FileSpec::new(dir.path().join("debug.log"), "noise".to_string()));
    write_file(FileSpec::new(dir.path().join("build/out.bin"), "bin".to_string()));

    pretty_assertions::assert_eq!(porcelain(&dir), "?? .gitignore\n");
}

#[rstest]
fn staged_renames_are_paired(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("long.txt"),
        "line one\nline two\nline three\nline four\n".to_string(),
    ));
    run_twig_command(dir.path(), &["add", "long.txt"])
        .assert()
        .success();
    twig_commit(dir.path(), "add long").assert().success();

    run_twig_command(dir.path(), &["mv", "long.txt", "renamed.txt"])
        .assert()
        .success();

    pretty_assertions::assert_eq!(porcelain(&dir), "R  long.txt -> renamed.txt\n");
}

#[rstest]
fn branch_header_in_short_format(init_repository_dir: TempDir) {
    run_twig_command(init_repository_dir.path(), &["status", "-s", "-b"])
        .assert()
        .success()
        .stdout("## master\n");
}

#[rstest]
fn committed_generated_files_leave_a_clean_tree(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let files = write_generated_files(&dir.path().join("gen"), 8);
    assert_eq!(files.len(), 8);

    assert_eq!(porcelain(&dir), "?? gen/\n");
    run_twig_command(dir.path(), &["add", "gen"])
        .assert()
        .success();
    twig_commit(dir.path(), "Generated").assert().success();

    assert_eq!(porcelain(&dir), "");
}
