//! End-to-end tests for the `strata` binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn strata(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("strata").unwrap();
    cmd.current_dir(dir).env_remove("STRATA_LOG");
    cmd
}

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    strata(dir.path()).arg("init").assert().success();
    dir
}

fn commit(dir: &Path, message: &str) {
    strata(dir)
        .args(["commit", "-m", message])
        .assert()
        .success()
        .stdout(predicate::str::contains("Committed stage"));
}

#[test]
fn init_creates_repository() {
    let dir = TempDir::new().unwrap();
    strata(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized empty strata repository"));
    assert!(dir.path().join(".strata").is_dir());

    strata(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already initialized"));
}

#[test]
fn commands_outside_a_repository_fail() {
    let dir = TempDir::new().unwrap();
    strata(dir.path())
        .arg("log")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn commit_log_and_revert() {
    let dir = init_repo();
    let file = dir.path().join("notes.txt");

    fs::write(&file, "one\n").unwrap();
    commit(dir.path(), "first");
    fs::write(&file, "two\n").unwrap();
    commit(dir.path(), "second");

    strata(dir.path())
        .arg("log")
        .assert()
        .success()
        .stdout(predicate::str::contains("first").and(predicate::str::contains("second")));

    strata(dir.path())
        .args(["revert", "--relative", "1", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("*1+1"));
    assert_eq!(fs::read_to_string(&file).unwrap(), "one\n");

    strata(dir.path())
        .args(["revert", "--relative", "1", "-1"])
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&file).unwrap(), "two\n");
}

#[test]
fn unchanged_commit_only_warns() {
    let dir = init_repo();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    commit(dir.path(), "first");

    strata(dir.path())
        .args(["commit", "-m", "again"])
        .assert()
        .success()
        .stderr(predicate::str::contains("nothing to commit"));
}

#[test]
fn status_reports_changes() {
    let dir = init_repo();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    commit(dir.path(), "first");
    fs::write(dir.path().join("a.txt"), "changed").unwrap();
    fs::write(dir.path().join("b.txt"), "new").unwrap();

    strata(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("M a.txt").and(predicate::str::contains("A b.txt")));
}

#[test]
fn diff_shows_line_changes() {
    let dir = init_repo();
    let file = dir.path().join("a.txt");
    fs::write(&file, "keep\nold\n").unwrap();
    commit(dir.path(), "first");
    fs::write(&file, "keep\nnew\n").unwrap();

    strata(dir.path())
        .args(["diff", "a.txt"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("- ")
                .and(predicate::str::contains("old"))
                .and(predicate::str::contains("+ ")),
        );
}

#[test]
fn revert_to_unknown_hash_fails() {
    let dir = init_repo();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    commit(dir.path(), "first");

    strata(dir.path())
        .args(["revert", "ffffffffff"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no state matches"));
}

#[test]
fn units_can_be_managed_and_focused() {
    let dir = init_repo();
    strata(dir.path()).args(["manage", "docs"]).assert().success();
    strata(dir.path()).args(["focus", "docs"]).assert().success();
    fs::write(dir.path().join("docs/guide.md"), "v1").unwrap();

    strata(dir.path())
        .args(["commit", "-m", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Committed unit 'docs'"));

    strata(dir.path())
        .args(["units"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* docs"));

    strata(dir.path())
        .args(["focus", "missing"])
        .assert()
        .failure();
}

#[test]
fn log_json_is_parseable() {
    let dir = init_repo();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    commit(dir.path(), "first");

    let output = strata(dir.path()).args(["log", "--json"]).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 1);
    assert_eq!(value[0]["message"], "first");
}
