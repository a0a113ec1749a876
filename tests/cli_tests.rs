use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const DIFF: &str = r#"diff --git a/src/lib.rs b/src/lib.rs
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -3,3 +3,3 @@
 use std::io;
-fn old() {}
+fn new() {}
 fn keep() {}
@@ -30,2 +30,3 @@
 fn tail() {}
+fn added() {}
 // end
"#;

/// Scratch directory with a diff file and a private session database.
fn setup() -> TempDir {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("change.diff"), DIFF).unwrap();
    temp
}

fn cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("commit-review").unwrap();
    cmd.current_dir(dir)
        .env("COMMIT_REVIEW_DB", dir.join("state/session.db"))
        .env_remove("RUST_LOG");
    cmd
}

fn start(dir: &Path) {
    cmd(dir)
        .args([
            "start",
            "--commit",
            "abcdef0123456789",
            "--base",
            "0123456789abcdef",
            "--message",
            "Rename old to new",
            "--root",
            "/work/repo",
            "change.diff",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Started review of abcdef0 (2 changes)"));
}

#[test]
fn status_without_session() {
    let temp = setup();
    cmd(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No active review"));
}

#[test]
fn accept_without_session_fails() {
    let temp = setup();
    cmd(temp.path())
        .arg("accept")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No active review"));
}

#[test]
fn start_then_status() {
    let temp = setup();
    start(temp.path());

    cmd(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Review of abcdef0 Rename old to new"))
        .stdout(predicate::str::contains("Pending:    2"))
        .stdout(predicate::str::contains("Files:      1/1 remaining"));
}

#[test]
fn start_twice_fails() {
    let temp = setup();
    start(temp.path());

    cmd(temp.path())
        .args(["start", "--commit", "ffff", "--base", "eeee", "change.diff"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already in progress"));
}

#[test]
fn start_reads_diff_from_stdin() {
    let temp = setup();
    cmd(temp.path())
        .args(["start", "--commit", "1234567890", "--base", "0987654321", "--root", "/r"])
        .write_stdin(DIFF)
        .assert()
        .success()
        .stdout(predicate::str::contains("/r/src/lib.rs:4"));
}

#[test]
fn accept_and_reject_current_then_end() {
    let temp = setup();
    start(temp.path());

    cmd(temp.path())
        .arg("accept")
        .assert()
        .success()
        .stdout(predicate::str::contains("accepted"))
        .stdout(predicate::str::contains("Next:"));

    cmd(temp.path())
        .arg("reject")
        .assert()
        .success()
        .stdout(predicate::str::contains("rejected"))
        .stdout(predicate::str::contains(
            "Restore line 31 of /work/repo/src/lib.rs to:",
        ))
        .stdout(predicate::str::contains("All changes resolved"));

    cmd(temp.path())
        .arg("end")
        .assert()
        .success()
        .stdout(predicate::str::contains("Accepted: 1"))
        .stdout(predicate::str::contains("Rejected: 1"))
        .stdout(predicate::str::contains("Pending:  0"));

    cmd(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No active review"));
}

#[test]
fn jump_and_list_mark_current() {
    let temp = setup();
    start(temp.path());

    let output = cmd(temp.path()).arg("list").output().unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with('>'));
    let second_id = lines[1].split_whitespace().next().unwrap().to_string();

    cmd(temp.path())
        .args(["jump", &second_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("+fn added() {}"));

    cmd(temp.path())
        .args(["list", "--pending"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("> {}", second_id)));

    cmd(temp.path())
        .args(["jump", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No change with id missing"));
}

#[test]
fn accept_file_by_relative_path() {
    let temp = setup();
    start(temp.path());

    cmd(temp.path())
        .args(["accept-file", "src/lib.rs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Accepted 2 changes in /work/repo/src/lib.rs"));
}

#[test]
fn notes_round_trip() {
    let temp = setup();
    start(temp.path());

    let output = cmd(temp.path())
        .args(["note", "add", "src/lib.rs", "4", "naming?"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let note_id = stdout.trim().rsplit(' ').next().unwrap().to_string();

    cmd(temp.path())
        .args(["note", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/work/repo/src/lib.rs:4 naming?"));

    cmd(temp.path())
        .args(["remap", "src/lib.rs", "--start", "2", "--text", "a\nb\n"])
        .assert()
        .success();

    cmd(temp.path())
        .args(["note", "list", "--file", "src/lib.rs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/work/repo/src/lib.rs:6 naming?"));

    cmd(temp.path())
        .args(["note", "resolve", &note_id])
        .assert()
        .success();

    cmd(temp.path())
        .args(["note", "list"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn empty_diff_starts_nothing() {
    let temp = setup();
    fs::write(temp.path().join("empty.diff"), "").unwrap();

    cmd(temp.path())
        .args(["start", "--commit", "aaaa", "--base", "bbbb", "empty.diff"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes to review"));

    cmd(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No active review"));
}
