//! Integration tests for basic CLI behavior.
//!
//! Everything here runs offline: failures are triggered before any request
//! leaves the process.

#![allow(deprecated)] // cargo_bin deprecation, replacement not yet stable

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: get a Command for the `chanres` binary.
fn chanres() -> Command {
    Command::cargo_bin("chanres").expect("binary 'chanres' should be built")
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    chanres()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: chanres"))
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("channels"));
}

#[test]
fn version_flag_shows_semver() {
    chanres()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^chanres \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_args_shows_error_and_usage() {
    chanres()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: chanres"));
}

#[test]
fn invalid_subcommand_fails() {
    chanres()
        .arg("this-is-not-a-real-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─── channels ────────────────────────────────────────────────────────────────

#[test]
fn channels_lists_every_site() {
    chanres()
        .arg("channels")
        .assert()
        .success()
        .stdout(predicate::str::contains("goplay"))
        .stdout(predicate::str::contains("dplay"))
        .stdout(predicate::str::contains("vrtnu"))
        .stdout(predicate::str::contains("kijk"));
}

// ─── resolve ─────────────────────────────────────────────────────────────────

#[test]
fn resolve_help_lists_flags() {
    chanres()
        .args(["resolve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--channel"))
        .stdout(predicate::str::contains("--json"))
        .stdout(predicate::str::contains("--no-widevine"))
        .stdout(predicate::str::contains("--probe"));
}

#[test]
fn resolve_requires_url() {
    chanres()
        .arg("resolve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<URL>"));
}

#[test]
fn resolve_unknown_site_fails() {
    chanres()
        .args(["resolve", "https://example.com/video/1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no channel handles"));
}

#[test]
fn resolve_unknown_channel_fails() {
    chanres()
        .args(["resolve", "https://example.com/video/1", "--channel", "npo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown channel"));
}

#[test]
fn resolve_with_broken_config_fails() {
    let path = std::env::temp_dir().join(format!("chanres-cli-{}.toml", std::process::id()));
    std::fs::write(&path, "timeout_secs = 0\n").unwrap();

    chanres()
        .args(["resolve", "https://www.goplay.be/video/x/s1/ep1", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));

    std::fs::remove_file(&path).unwrap();
}
