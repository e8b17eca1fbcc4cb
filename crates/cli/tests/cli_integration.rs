//! CLI integration tests for every subcommand.
//!
//! Uses `assert_cmd` to spawn the `intake` binary and verify exit codes,
//! stdout content and stderr content. Commands run from this crate's
//! directory so fixture paths stay short.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper: the `intake` binary with a clean environment for gateway settings.
fn intake() -> Command {
    let mut cmd = cargo_bin_cmd!("intake");
    cmd.current_dir(Path::new(env!("CARGO_MANIFEST_DIR")))
        .env_remove("INTAKE_GATEWAY_BASE_URL")
        .env_remove("INTAKE_GATEWAY_AUTH_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {}", String::from_utf8_lossy(&output.stdout)))
}

// ──────────────────────────────────────────────
// 1. Help, version, catalog
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    intake()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Multi-step application intake"));
}

#[test]
fn version_exits_0() {
    intake()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("intake"));
}

#[test]
fn forms_lists_builtin_forms() {
    intake()
        .arg("forms")
        .assert()
        .success()
        .stdout(predicate::str::contains("membership").and(predicate::str::contains("volunteer")));
}

#[test]
fn forms_json_has_step_counts() {
    let output = intake().args(["--output", "json", "forms"]).output().unwrap();
    assert!(output.status.success());
    let forms = stdout_json(&output);
    assert_eq!(forms[0]["name"], "membership");
    assert_eq!(forms[0]["steps"], 4);
    assert_eq!(forms[1]["steps"], 3);
}

// ──────────────────────────────────────────────
// 2. Schema
// ──────────────────────────────────────────────

#[test]
fn schema_text_shows_steps_and_conditions() {
    intake()
        .args(["schema", "membership"])
        .assert()
        .success()
        .stdout(predicate::str::contains("step 3: Production"))
        .stdout(predicate::str::contains("required when is_owner is false"))
        .stdout(predicate::str::contains("[animals] at least one item"));
}

#[test]
fn schema_json_describes_fields() {
    let output = intake()
        .args(["schema", "volunteer", "--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let doc = stdout_json(&output);
    assert_eq!(doc["name"], "volunteer");
    assert_eq!(doc["steps"][0]["fields"][0]["name"], "national_id");
    assert_eq!(doc["steps"][0]["fields"][0]["unique"], "id");
    assert_eq!(doc["steps"][1]["fields"][1]["kind"], "integer 1..=40");
}

#[test]
fn unknown_form_exits_2() {
    intake()
        .args(["schema", "adoption"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown form 'adoption'"));
}

// ──────────────────────────────────────────────
// 3. Validate
// ──────────────────────────────────────────────

#[test]
fn validate_complete_answers_exits_0() {
    intake()
        .args(["validate", "membership", "--answers", "tests/fixtures/membership.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("membership: all steps valid"));
}

#[test]
fn validate_reports_every_failing_step() {
    intake()
        .args([
            "validate",
            "membership",
            "--answers",
            "tests/fixtures/membership_incomplete.json",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("step 1 (Applicant):"))
        .stdout(predicate::str::contains("owner_name: this field is required"))
        .stdout(predicate::str::contains("animals: add at least one item"))
        .stdout(predicate::str::contains("accepts_terms"));
}

#[test]
fn validate_json_lists_reasons() {
    let output = intake()
        .args([
            "--output",
            "json",
            "validate",
            "membership",
            "--answers",
            "tests/fixtures/membership_incomplete.json",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let doc = stdout_json(&output);
    assert_eq!(doc["valid"], false);
    let steps: Vec<u64> = doc["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["step"].as_u64().unwrap())
        .collect();
    assert_eq!(steps, vec![1, 2, 3, 4]);
    assert_eq!(doc["steps"][0]["reasons"][0]["type"], "invalid_field");
}

#[test]
fn validate_missing_answers_file_exits_2() {
    intake()
        .args(["validate", "membership", "--answers", "tests/fixtures/nope.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error reading answers"));
}

#[test]
fn validate_unknown_field_exits_2() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("answers.json");
    fs::write(&path, r#"{ "values": { "fax": "2222-0000" } }"#).unwrap();
    intake()
        .args(["validate", "volunteer", "--answers"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("fax"));
}

#[test]
fn validate_duplicate_animals_exit_1() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("answers.json");
    fs::write(
        &path,
        r#"{ "animals": [ { "species": "Vaca", "quantity": 3 }, { "species": " VACA ", "quantity": 2 } ] }"#,
    )
    .unwrap();
    intake()
        .args(["validate", "membership", "--answers"])
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("animals item 2"));
}

#[test]
fn bad_config_exits_2() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("intake.toml");
    fs::write(&path, "[uniqueness]\ndebounce = 10\n").unwrap();
    intake()
        .args(["validate", "membership", "--answers", "tests/fixtures/membership.json", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("could not parse"));
}

// ──────────────────────────────────────────────
// 4. Submit
// ──────────────────────────────────────────────

#[test]
fn submit_with_fixtures_prints_receipt() {
    intake()
        .args([
            "submit",
            "membership",
            "--answers",
            "tests/fixtures/membership.json",
            "--fixtures",
            "tests/fixtures/directory.json",
            "--config",
            "tests/fixtures/intake.toml",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("membership submitted: receipt app-000001"))
        .stdout(predicate::str::contains("attachments: id_document"));
}

#[test]
fn submit_autofills_from_directory() {
    let output = intake()
        .args([
            "--output",
            "json",
            "submit",
            "membership",
            "--answers",
            "tests/fixtures/membership_autofill.json",
            "--fixtures",
            "tests/fixtures/directory.json",
            "--config",
            "tests/fixtures/intake.toml",
        ])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let doc = stdout_json(&output);
    assert_eq!(doc["status"], "submitted");
    assert_eq!(doc["attachments"]["status"], "skipped");
    assert_eq!(doc["fingerprint"].as_str().map(str::len), Some(64));
}

#[test]
fn submit_stops_on_registered_email() {
    intake()
        .args([
            "submit",
            "membership",
            "--answers",
            "tests/fixtures/membership_taken_email.json",
            "--fixtures",
            "tests/fixtures/directory.json",
            "--config",
            "tests/fixtures/intake.toml",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("step 1 (Applicant) cannot be completed"))
        .stdout(predicate::str::contains("email: this email is already registered"));
}

#[test]
fn submit_blocked_json_names_the_step() {
    let output = intake()
        .args([
            "--output",
            "json",
            "submit",
            "membership",
            "--answers",
            "tests/fixtures/membership_incomplete.json",
            "--config",
            "tests/fixtures/intake.toml",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let doc = stdout_json(&output);
    assert_eq!(doc["status"], "blocked");
    assert_eq!(doc["step"], 1);
}

#[test]
fn submit_volunteer_offline() {
    intake()
        .args([
            "submit",
            "volunteer",
            "--answers",
            "tests/fixtures/volunteer.json",
            "--config",
            "tests/fixtures/intake.toml",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("volunteer submitted: receipt app-000001"));
}

#[test]
fn submit_with_unreadable_fixtures_exits_2() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("directory.json");
    fs::write(&path, "{ not json").unwrap();
    intake()
        .args(["submit", "volunteer", "--answers", "tests/fixtures/volunteer.json", "--fixtures"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid fixture document"));
}

#[test]
fn quiet_suppresses_output() {
    intake()
        .args([
            "--quiet",
            "validate",
            "membership",
            "--answers",
            "tests/fixtures/membership_incomplete.json",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());
}
