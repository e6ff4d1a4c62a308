//! End-to-end CLI tests that exercise the compiled binary.
//!
//! These stay off the network: they cover argument handling and the
//! library commands that only touch the local database.

use assert_cmd::Command;
use predicates::prelude::*;

fn mangavault() -> Command {
    Command::cargo_bin("mangavault").expect("binary should build")
}

#[test]
fn test_cli_help_lists_subcommands() {
    mangavault()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("resume"));
}

#[test]
fn test_cli_version_prints_version() {
    mangavault()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_requires_a_subcommand() {
    mangavault().assert().failure();
}

#[test]
fn test_cli_list_on_fresh_database_reports_empty_library() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("library.db");

    mangavault()
        .args(["list", "--database"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("Library is empty."));
}

#[test]
fn test_cli_delete_unknown_series_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("library.db");

    mangavault()
        .args(["delete", "no-such-series", "--database"])
        .arg(&db)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not in the library"));
}

#[test]
fn test_cli_resume_with_missing_descriptor_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("library.db");

    mangavault()
        .args(["resume", "does-not-exist.json", "--yes", "--database"])
        .arg(&db)
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading resume descriptor"));
}

#[test]
fn test_cli_rejects_invalid_api_base() {
    mangavault()
        .args(["list", "--api-base", "not a url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --api-base URL"));
}
