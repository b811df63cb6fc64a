use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const DAY_MICROS: i64 = 86_400_000_000;

fn event_line(key: &str, event_type: &str, to_status: &str, resolution: Option<&str>, day: i64) -> String {
    let resolution = match resolution {
        Some(r) => format!(r#","resolution":"{r}""#),
        None => String::new(),
    };
    format!(
        r#"{{"issue_key":"{key}","issue_type":"Story","event_type":"{event_type}","to_status":"{to_status}"{resolution},"is_healed":false,"timestamp":{ts}}}"#,
        ts = day * DAY_MICROS
    )
}

/// Seeds a tempdir with a steady one-item-per-day delivery history through
/// Backlog -> In Progress -> Done, plus a workflow mapping that marks Done
/// as the sole Finished/delivered status and In Progress as Downstream.
fn seed_source(dir: &std::path::Path, source: &str, days: i64) {
    let mut lines = Vec::new();
    for day in 0..days {
        let key = format!("P-{day}");
        lines.push(event_line(&key, "created", "Backlog", None, day));
        lines.push(event_line(&key, "change", "In Progress", None, day));
        lines.push(event_line(&key, "change", "Done", Some("Fixed"), day + 3));
    }
    fs::write(dir.join(format!("{source}.jsonl")), lines.join("\n")).unwrap();

    let workflow = r#"{
        "mapping": {
            "Backlog": {"tier": "demand", "role": "queue"},
            "In Progress": {"tier": "downstream", "role": "active"},
            "Done": {"tier": "finished", "role": "terminal", "outcome": "delivered"}
        },
        "resolutions": {"Fixed": "delivered"},
        "commitmentPoint": "In Progress"
    }"#;
    fs::write(dir.join(format!("{source}_workflow.json")), workflow).unwrap();
}

#[test]
fn cli_help_lists_every_subcommand() {
    let mut cmd = Command::cargo_bin("flowcast").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("discover"))
        .stdout(predicate::str::contains("xmr"))
        .stdout(predicate::str::contains("wip-stability"))
        .stdout(predicate::str::contains("flow-metrics"))
        .stdout(predicate::str::contains("walk-forward"))
        .stdout(predicate::str::contains("store"));
}

#[test]
fn cli_version_reports_flowcast() {
    let mut cmd = Command::cargo_bin("flowcast").unwrap();
    cmd.arg("--version").assert().success().stdout(predicate::str::contains("flowcast"));
}

#[test]
fn store_reports_loaded_event_count() {
    let temp_dir = TempDir::new().unwrap();
    seed_source(temp_dir.path(), "proj", 30);

    let mut cmd = Command::cargo_bin("flowcast").unwrap();
    cmd.arg("--data-path")
        .arg(temp_dir.path())
        .arg("store")
        .arg("proj")
        .assert()
        .success()
        .stdout(predicate::str::contains("90 event(s)"));
}

#[test]
fn store_on_missing_source_reports_zero_events_not_an_error() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("flowcast").unwrap();
    cmd.arg("--data-path")
        .arg(temp_dir.path())
        .arg("store")
        .arg("nonexistent")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 event(s)"));
}

#[test]
fn discover_finds_every_observed_status() {
    let temp_dir = TempDir::new().unwrap();
    seed_source(temp_dir.path(), "proj", 20);

    let mut cmd = Command::cargo_bin("flowcast").unwrap();
    cmd.arg("--data-path")
        .arg(temp_dir.path())
        .arg("discover")
        .arg("proj")
        .assert()
        .success()
        .stdout(predicate::str::contains("Backlog"))
        .stdout(predicate::str::contains("In Progress"))
        .stdout(predicate::str::contains("Done"));
}

#[test]
fn simulate_duration_mode_requires_target_items() {
    let temp_dir = TempDir::new().unwrap();
    seed_source(temp_dir.path(), "proj", 40);

    let mut cmd = Command::cargo_bin("flowcast").unwrap();
    cmd.arg("--data-path")
        .arg(temp_dir.path())
        .arg("simulate")
        .arg("proj")
        .arg("--mode")
        .arg("duration")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--target-items"));
}

#[test]
fn simulate_duration_mode_emits_percentiles() {
    let temp_dir = TempDir::new().unwrap();
    seed_source(temp_dir.path(), "proj", 60);

    let mut cmd = Command::cargo_bin("flowcast").unwrap();
    cmd.arg("--data-path")
        .arg(temp_dir.path())
        .arg("simulate")
        .arg("proj")
        .arg("--mode")
        .arg("duration")
        .arg("--target-items")
        .arg("10")
        .arg("--trials")
        .arg("500")
        .assert()
        .success()
        .stdout(predicate::str::contains("p50="));
}

#[test]
fn simulate_json_output_is_valid_json() {
    let temp_dir = TempDir::new().unwrap();
    seed_source(temp_dir.path(), "proj", 60);

    let output = Command::cargo_bin("flowcast")
        .unwrap()
        .arg("--data-path")
        .arg(temp_dir.path())
        .arg("--format")
        .arg("json")
        .arg("simulate")
        .arg("proj")
        .arg("--mode")
        .arg("scope")
        .arg("--horizon-days")
        .arg("14")
        .arg("--trials")
        .arg("500")
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(parsed.get("percentiles").is_some());
}

#[test]
fn xmr_reports_cycle_time_average() {
    let temp_dir = TempDir::new().unwrap();
    seed_source(temp_dir.path(), "proj", 60);

    let mut cmd = Command::cargo_bin("flowcast").unwrap();
    cmd.arg("--data-path")
        .arg(temp_dir.path())
        .arg("xmr")
        .arg("proj")
        .assert()
        .success()
        .stdout(predicate::str::contains("cycle-time XmR"));
}

#[test]
fn flow_metrics_reports_yield_and_cadence() {
    let temp_dir = TempDir::new().unwrap();
    seed_source(temp_dir.path(), "proj", 60);

    let mut cmd = Command::cargo_bin("flowcast").unwrap();
    cmd.arg("--data-path")
        .arg(temp_dir.path())
        .arg("flow-metrics")
        .arg("proj")
        .assert()
        .success()
        .stdout(predicate::str::contains("yield="));
}

#[test]
fn walk_forward_scope_mode_requires_horizon_days() {
    let temp_dir = TempDir::new().unwrap();
    seed_source(temp_dir.path(), "proj", 60);

    let mut cmd = Command::cargo_bin("flowcast").unwrap();
    cmd.arg("--data-path")
        .arg(temp_dir.path())
        .arg("walk-forward")
        .arg("proj")
        .arg("--mode")
        .arg("scope")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--horizon-days"));
}
