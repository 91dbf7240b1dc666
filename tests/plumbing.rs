use crate::common::command::{
    commit_file, init_repository_dir, repository_dir, rev_parse, run_twig_command,
};
use crate::common::file::{FileSpec, write_file};
use crate::common::stdout_of;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;

mod common;

const ROOT_TREE: &str = "88484bd9e7919fa9b7dfeb008fb8f6c85743d171";
const ROOT_COMMIT: &str = "e972be13fc5b660dd06f6de2e96b36a6b93bbcd7";
const ONE_BLOB: &str = "43dd47ea691c90a5fa7827892c70241913351963";

#[rstest]
fn objects_hash_like_git(init_repository_dir: TempDir) {
    pretty_assertions::assert_eq!(rev_parse(init_repository_dir.path(), "HEAD"), ROOT_COMMIT);
    run_twig_command(init_repository_dir.path(), &["write-tree"])
        .assert()
        .success()
        .stdout(format!("{ROOT_TREE}\n"));
}

#[rstest]
fn cat_file_modes(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    run_twig_command(dir.path(), &["cat-file", "-p", ONE_BLOB])
        .assert()
        .success()
        .stdout("one");
    run_twig_command(dir.path(), &["cat-file", "-t", ONE_BLOB])
        .assert()
        .success()
        .stdout("blob\n");
    run_twig_command(dir.path(), &["cat-file", "-s", ONE_BLOB])
        .assert()
        .success()
        .stdout("3\n");
    run_twig_command(dir.path(), &["cat-file", "-e", ONE_BLOB])
        .assert()
        .success()
        .stdout("");
    run_twig_command(dir.path(), &["cat-file", "-e", &"0".repeat(40)])
        .assert()
        .failure();

    run_twig_command(dir.path(), &["cat-file", "-p", "HEAD"])
        .assert()
        .success()
        .stdout(format!(
            "tree {ROOT_TREE}\n\
             author fake_user <fake_email@email.com> 1672574400 +0000\n\
             committer fake_user <fake_email@email.com> 1672574400 +0000\n\
             \n\
             Initial commit\n"
        ));
}

#[rstest]
fn hash_object_with_and_without_writing(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(dir.path().join("hello.txt"), "hello\n".to_string()));
    let hello = "ce013625030ba8dba906f756967f9e9ca394464a";

    run_twig_command(dir.path(), &["hash-object", "hello.txt"])
        .assert()
        .success()
        .stdout(format!("{hello}\n"));
    run_twig_command(dir.path(), &["cat-file", "-e", hello])
        .assert()
        .failure();

    run_twig_command(dir.path(), &["hash-object", "-w", "hello.txt"])
        .assert()
        .success()
        .stdout(format!("{hello}\n"));
    run_twig_command(dir.path(), &["cat-file", "-p", hello])
        .assert()
        .success()
        .stdout("hello\n");
}

#[rstest]
fn binary_blobs_round_trip_byte_for_byte(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let data: Vec<u8> = (0..=255u8).chain([0, 0, b'\r', b'\n']).collect();
    std::fs::write(dir.path().join("raw.bin"), &data).unwrap();

    let output = run_twig_command(dir.path(), &["hash-object", "-w", "raw.bin"])
        .assert()
        .success();
    let oid = stdout_of(&output).trim().to_string();

    let output = run_twig_command(dir.path(), &["cat-file", "-p", &oid])
        .assert()
        .success();
    crate::assert_bytes_eq!(&output.get_output().stdout, &data);
}

#[rstest]
fn hash_object_outside_a_repository(repository_dir: TempDir) {
    repository_dir.child("hello.txt").write_str("hello\n").unwrap();

    run_twig_command(repository_dir.path(), &["hash-object", "hello.txt"])
        .assert()
        .success()
        .stdout("ce013625030ba8dba906f756967f9e9ca394464a\n");
}

#[rstest]
fn ls_tree_listing(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    run_twig_command(dir.path(), &["ls-tree", "HEAD"])
        .assert()
        .success()
        .stdout(format!(
            "100644 blob {ONE_BLOB}\t1.txt\n\
             040000 tree 202bc192d34beb85d0301ec8c8940cd0252cc48a\ta\n"
        ));
    run_twig_command(dir.path(), &["ls-tree", "-r", "HEAD"])
        .assert()
        .success()
        .stdout(format!(
            "100644 blob {ONE_BLOB}\t1.txt\n\
             100644 blob 64c5e5885a4b06010b3a0c20edb7900dd0311025\ta/2.txt\n\
             100644 blob 1d19714ffbc272ba0da6eb419d66123c20527174\ta/b/3.txt\n"
        ));
}

#[rstest]
fn ls_files_and_write_tree(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    run_twig_command(dir.path(), &["ls-files"])
        .assert()
        .success()
        .stdout("1.txt\na/2.txt\na/b/3.txt\n");
    run_twig_command(dir.path(), &["ls-files", "-s"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!("100644 {ONE_BLOB} 0\t1.txt\n")));
    run_twig_command(dir.path(), &["write-tree"])
        .assert()
        .success()
        .stdout(format!("{ROOT_TREE}\n"));
}

#[rstest]
fn update_ref_moves_and_deletes(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    commit_file(dir.path(), "x.txt", "x\n", "second");
    let head = rev_parse(dir.path(), "HEAD");

    run_twig_command(dir.path(), &["update-ref", "refs/heads/other", ROOT_COMMIT])
        .assert()
        .success();
    pretty_assertions::assert_eq!(rev_parse(dir.path(), "other"), ROOT_COMMIT);

    run_twig_command(dir.path(), &["update-ref", "refs/heads/other", &head, &head])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot lock ref"));
    run_twig_command(dir.path(), &["update-ref", "refs/heads/other", &head, ROOT_COMMIT])
        .assert()
        .success();
    pretty_assertions::assert_eq!(rev_parse(dir.path(), "other"), head);

    run_twig_command(dir.path(), &["update-ref", "-d", "refs/heads/other"])
        .assert()
        .success();
    run_twig_command(dir.path(), &["rev-parse", "other"])
        .assert()
        .code(128);
}

#[rstest]
fn rev_list_walks_history(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    commit_file(dir.path(), "x.txt", "x\n", "second");
    let head = rev_parse(dir.path(), "HEAD");

    run_twig_command(dir.path(), &["rev-list", "HEAD"])
        .assert()
        .success()
        .stdout(format!("{head}\n{ROOT_COMMIT}\n"));
    run_twig_command(dir.path(), &["rev-list", "-n", "1", "HEAD"])
        .assert()
        .success()
        .stdout(format!("{head}\n"));
    run_twig_command(dir.path(), &["rev-list", "HEAD", "^HEAD~1"])
        .assert()
        .success()
        .stdout(format!("{head}\n"));
}

#[rstest]
fn merge_base_of_diverged_branches(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    run_twig_command(dir.path(), &["checkout", "-b", "topic"])
        .assert()
        .success();
    commit_file(dir.path(), "t.txt", "t\n", "topic");
    run_twig_command(dir.path(), &["checkout", "master"])
        .assert()
        .success();
    commit_file(dir.path(), "m.txt", "m\n", "master");

    run_twig_command(dir.path(), &["merge-base", "master", "topic"])
        .assert()
        .success()
        .stdout(format!("{ROOT_COMMIT}\n"));
    run_twig_command(dir.path(), &["merge-base", "--is-ancestor", ROOT_COMMIT, "topic"])
        .assert()
        .success()
        .stdout("");
    run_twig_command(dir.path(), &["merge-base", "--is-ancestor", "master", "topic"])
        .assert()
        .code(1);
}

#[rstest]
fn config_round_trip(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    run_twig_command(dir.path(), &["config", "user.name", "Someone"])
        .assert()
        .success();
    run_twig_command(dir.path(), &["config", "user.name"])
        .assert()
        .success()
        .stdout("Someone\n");

    let output = run_twig_command(dir.path(), &["config", "--list"])
        .assert()
        .success();
    assert!(stdout_of(&output).contains("user.name=Someone\n"));

    run_twig_command(dir.path(), &["config", "--unset", "user.name"])
        .assert()
        .success();
    run_twig_command(dir.path(), &["config", "user.name"])
        .assert()
        .code(1)
        .stdout("");
}

#[rstest]
fn git_can_read_what_twig_writes(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let Ok(output) = crate::common::command::run_git_command(dir.path(), &["fsck", "--strict"])
        .output()
    else {
        // git is not installed
        return;
    };

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let output = crate::common::command::run_git_command(dir.path(), &["status", "--porcelain"])
        .output()
        .unwrap();
    pretty_assertions::assert_eq!(String::from_utf8_lossy(&output.stdout), "");
}

#[rstest]
fn twig_can_read_what_git_writes(repository_dir: TempDir) {
    let dir = repository_dir;
    let git = |args: &[&str]| {
        crate::common::command::run_git_command(dir.path(), args)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .envs([
                ("GIT_AUTHOR_NAME", "git_user"),
                ("GIT_AUTHOR_EMAIL", "git@example.com"),
                ("GIT_COMMITTER_NAME", "git_user"),
                ("GIT_COMMITTER_EMAIL", "git@example.com"),
            ])
            .output()
    };
    if git(&["init", "-q"]).is_err() {
        // git is not installed
        return;
    }
    write_file(FileSpec::new(dir.path().join("1.txt"), "one".to_string()));
    write_file(FileSpec::new(dir.path().join("a/b/3.txt"), "three".to_string()));
    git(&["add", "."]).unwrap();
    let output = git(&["commit", "-q", "-m", "from git"]).unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    run_twig_command(dir.path(), &["status", "--porcelain"])
        .assert()
        .success()
        .stdout("");
    run_twig_command(dir.path(), &["ls-files"])
        .assert()
        .success()
        .stdout("1.txt\na/b/3.txt\n");

    let git_head = git(&["rev-parse", "HEAD"]).unwrap();
    pretty_assertions::assert_eq!(
        rev_parse(dir.path(), "HEAD"),
        String::from_utf8_lossy(&git_head.stdout).trim()
    );
}
