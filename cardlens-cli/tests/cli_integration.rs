//! CLI integration tests for cardlens.
//!
//! These run the actual binary and check outputs and exit codes. Nothing here
//! touches the network: the match command is exercised against a fresh, empty
//! index in a temporary directory.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the cardlens binary.
fn cardlens() -> Command {
    Command::cargo_bin("cardlens").unwrap()
}

#[test]
fn test_help_displays_usage() {
    cardlens()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Trading-card recognition from a local visual index",
        ))
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("match"))
        .stdout(predicate::str::contains("scan"));
}

#[test]
fn test_version_displays_version() {
    cardlens()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cardlens"));
}

#[test]
fn test_unknown_subcommand_fails() {
    cardlens().arg("frobnicate").assert().failure();
}

#[test]
fn test_match_requires_image_argument() {
    cardlens().arg("match").assert().failure();
}

#[test]
fn test_match_against_empty_index_reports_it() {
    let tmp = TempDir::new().unwrap();

    cardlens()
        .env("CARDLENS_DB", tmp.path().join("cards.db"))
        .env("CARDLENS_IMAGES_DIR", tmp.path().join("cards"))
        .args(["match", "query.png"])
        .assert()
        .success()
        .stdout(predicate::str::contains("The card index is empty"));
}

#[test]
fn test_download_help_shows_concurrency_flag() {
    cardlens()
        .args(["download", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--concurrency"));
}

#[test]
fn test_scan_help_shows_feed_flag() {
    cardlens()
        .args(["scan", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--feed-url"))
        .stdout(predicate::str::contains("--no-rectify"));
}
