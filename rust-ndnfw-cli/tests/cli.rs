use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn cli() -> Command {
    Command::cargo_bin("rust-ndnfw-cli").unwrap()
}

#[test]
fn encode_interest_prints_summary() {
    cli()
        .args(["encode", "/a/b", "--nonce", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Interest /a/b"));
}

#[test]
fn encode_nack() {
    cli()
        .args(["encode", "/a", "--nack", "loop"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Nack /a"));
}

#[test]
fn encode_rejects_relative_name() {
    cli()
        .args(["encode", "a/b"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid name"));
}

#[test]
fn config_reads_toml_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[forwarder]\nnacks_enabled = true").unwrap();

    cli()
        .args(["config", "--file"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"nacks_enabled\": true"));
}

#[test]
fn config_missing_file_fails() {
    cli()
        .args(["config", "--file", "/nonexistent/ndnfw.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn simulate_reports_deliveries() {
    cli()
        .arg("simulate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Data delivered:").and(predicate::str::contains("40")));
}

#[test]
fn simulate_json() {
    cli()
        .args(["simulate", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"delivered\": 40"));
}
