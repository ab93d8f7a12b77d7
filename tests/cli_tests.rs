//! CLI tests for the flakebench binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn flakebench_cmd() -> Command {
    let mut cmd = Command::cargo_bin("flakebench").unwrap();
    // Keep the parent environment from leaking configuration into tests.
    for name in [
        "FLAKE_SEED",
        "DELAY_MIN_MS",
        "DELAY_MAX_MS",
        "DELAY_PROB",
        "BACKEND_JSONL_LOG",
        "UI_OVERLAY_MS",
        "FLAKE_STRATEGY",
        "FLAKE_OVERLAY_MS",
        "FLAKE_OVERLAY_PROB",
        "TEST_FLAKE_SEED",
        "BASE_URL",
        "FLAKE_RUNS",
        "FLAKE_BIND",
    ] {
        cmd.env_remove(name);
    }
    cmd
}

#[test]
fn help_lists_subcommands() {
    flakebench_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("smoke"))
        .stdout(predicate::str::contains("report"));
}

#[test]
fn version_flag_works() {
    flakebench_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("flakebench"));
}

#[test]
fn report_aggregates_an_existing_trial_log() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("trial_runs.jsonl");
    let mut file = std::fs::File::create(&log_path).unwrap();
    for (run_id, ok, error_type) in [
        (1, true, ""),
        (2, false, "timeout"),
        (3, true, ""),
        (4, false, "timeout"),
        (5, false, "other"),
    ] {
        writeln!(
            file,
            r#"{{"run_id":{run_id},"ok":{ok},"error_type":"{error_type}","error_message":"","elapsed_ms":10.0,"base_url":"http://127.0.0.1:8004","ts_epoch_ms":0}}"#
        )
        .unwrap();
    }

    flakebench_cmd()
        .arg("report")
        .arg(&log_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Runs: 5"))
        .stdout(predicate::str::contains("SuccessRate: 40.00%"))
        .stdout(predicate::str::contains("timeout: 2"))
        .stdout(predicate::str::contains("other: 1"));
}

#[test]
fn report_on_missing_log_fails() {
    flakebench_cmd()
        .arg("report")
        .arg("/nonexistent/trial_runs.jsonl")
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn run_against_unreachable_target_exits_with_infrastructure_code() {
    let dir = tempfile::tempdir().unwrap();
    flakebench_cmd()
        .arg("run")
        .arg("--base-url")
        .arg("http://127.0.0.1:1")
        .arg("--runs")
        .arg("2")
        .arg("--artifacts-dir")
        .arg(dir.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Health check failed"));
}

#[test]
fn run_rejects_malformed_environment() {
    let dir = tempfile::tempdir().unwrap();
    flakebench_cmd()
        .arg("run")
        .arg("--artifacts-dir")
        .arg(dir.path())
        .env("DELAY_PROB", "often")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("DELAY_PROB"));
}
