//! CLI integration tests
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("xxkcd")
}

fn get_fixture_path(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn offline() -> assert_cmd::Command {
    let mut cmd = cmd();
    cmd.args(["--snapshot", &get_fixture_path("snapshot.json")]);
    cmd
}

#[test]
fn test_cli_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("comic"))
        .stdout(predicate::str::contains("what-if"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_cli_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_invalid_key() {
    cmd()
        .args(["comic", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid key"));
}

#[test]
fn test_cli_invalid_format() {
    offline()
        .args(["comic", "1", "-f", "yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid format"));
}

#[test]
fn test_cli_comic_text() {
    offline()
        .args(["comic", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Island (sketch)"))
        .stdout(predicate::str::contains("2006-01-01"))
        .stdout(predicate::str::contains("https://xkcd.com/3/"));
}

#[test]
fn test_cli_comic_json() {
    let output = offline().args(["comic", "2", "-f", "json"]).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["num"], 2);
    assert_eq!(value["title"], "Petit Trees (sketch)");
    assert_eq!(value["day"], 1);
}

#[test]
fn test_cli_negative_key() {
    offline()
        .args(["comic", "-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Blown apart"));
}

#[test]
fn test_cli_latest_by_default() {
    offline()
        .arg("comic")
        .assert()
        .success()
        .stdout(predicate::str::contains("Blown apart"));
}

#[test]
fn test_cli_titles() {
    offline()
        .args(["titles", "--from", "2", "--to", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Petit Trees (sketch)"))
        .stdout(predicate::str::contains("Landscape (sketch)"))
        .stdout(predicate::str::contains("Barrel").not())
        .stdout(predicate::str::contains("Blown apart").not());
}

#[test]
fn test_cli_titles_reverse() {
    let output = offline().args(["titles", "--reverse"]).output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].ends_with("Blown apart"));
    assert!(lines[4].ends_with("Barrel - Part 1"));
}

#[test]
fn test_cli_image_without_image() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("5.png");

    offline()
        .args(["image", "5", "-o", output.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not have an image"));
}

#[test]
fn test_cli_missing_snapshot() {
    cmd()
        .args(["--snapshot", "does-not-exist.json", "comic", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read snapshot"));
}

#[test]
fn test_cli_completions() {
    cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("xxkcd"));
}
