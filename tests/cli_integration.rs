//! Smoke tests driving the compiled binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// The binary with a test identity, so `init` can commit.
fn rug() -> Command {
    let mut cmd = Command::cargo_bin("rug").unwrap();
    cmd.env("GIT_AUTHOR_NAME", "Test User")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test User")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .env("GIT_CONFIG_NOSYSTEM", "1");
    cmd
}

#[test]
fn help_lists_the_commands() {
    rug()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("checkout")
                .and(predicate::str::contains("update"))
                .and(predicate::str::contains("push")),
        );
}

#[test]
fn init_revset_status_remote_round_trip() {
    let dir = TempDir::new().unwrap();
    let cwd = dir.path().to_str().unwrap();

    rug()
        .args(["--cwd", cwd, "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));

    rug()
        .args(["--cwd", cwd, "revset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("master"));

    rug().args(["--cwd", cwd, "status"]).assert().success();

    rug()
        .args(["--cwd", cwd, "revset", "feature"])
        .assert()
        .success();
    rug()
        .args(["--cwd", cwd, "revset-list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("feature").and(predicate::str::contains("* master")));

    rug()
        .args(["--cwd", cwd, "remote-add", "origin", "/srv/git"])
        .assert()
        .success();
    rug()
        .args(["--cwd", cwd, "remote-list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("origin").and(predicate::str::contains("/srv/git")));
}

#[test]
fn init_twice_fails() {
    let dir = TempDir::new().unwrap();
    let cwd = dir.path().to_str().unwrap();
    rug().args(["--cwd", cwd, "init"]).assert().success();
    rug()
        .args(["--cwd", cwd, "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already a rug project"));
}

#[test]
fn commands_outside_a_project_fail() {
    let dir = TempDir::new().unwrap();
    rug()
        .args(["--cwd", dir.path().to_str().unwrap(), "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not inside a rug project"));
}
