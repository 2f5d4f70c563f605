//! CLI integration tests for all subcommands.
//!
//! Uses `assert_cmd` to spawn the `fieldkit` binary and verify exit codes,
//! stdout content, and stderr content. Each test runs in its own temporary
//! directory holding a `fieldkit.toml` and a file-backed store, so separate
//! invocations behave like successive page loads against the same data.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A workspace with a config naming agronomist `ag-1` and an empty store.
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("fieldkit.toml"),
        "agronomist_id = \"ag-1\"\nstore_path = \"store.json\"\n",
    )
    .unwrap();
    dir
}

/// Write the store file directly, as reference data loaded out of band.
fn seed_store(dir: &Path, collections: Value) {
    let body = json!({ "collections": collections });
    fs::write(dir.join("store.json"), serde_json::to_string(&body).unwrap()).unwrap();
}

fn read_store(dir: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(dir.join("store.json")).unwrap()).unwrap()
}

/// Helper: the `fieldkit` binary rooted at `dir`, with a fixed position and
/// no inherited fieldkit environment.
fn fieldkit(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("fieldkit");
    cmd.current_dir(dir)
        .env_remove("FIELDKIT_AGRONOMIST")
        .env_remove("FIELDKIT_STORE")
        .env_remove("RUST_LOG")
        .env("FIELDKIT_LAT", "-15.79")
        .env("FIELDKIT_LON", "-47.88");
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.arg("--output").arg("json").output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    let dir = workspace();
    fieldkit(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Field-visit client for agronomists"));
}

#[test]
fn version_exits_0() {
    let dir = workspace();
    fieldkit(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fieldkit"));
}

#[test]
fn no_subcommand_is_a_usage_error() {
    let dir = workspace();
    fieldkit(dir.path()).assert().failure();
}

// ──────────────────────────────────────────────
// 2. Route
// ──────────────────────────────────────────────

#[test]
fn route_task_fragment_shows_tasks_only() {
    let dir = workspace();
    let body = json_stdout(fieldkit(dir.path()).args(["route", "#/task/42"]));
    assert_eq!(body["active"], "tasks");
    assert_eq!(body["detail"], "42");
    let sections = body["sections"].as_object().unwrap();
    let visible: Vec<_> = sections.iter().filter(|(_, v)| **v == json!(true)).collect();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].0, "tasks");
}

#[test]
fn route_unknown_fragment_shows_default() {
    let dir = workspace();
    fieldkit(dir.path())
        .args(["route", "nowhere"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("dashboard"))
        .stdout(predicate::str::contains("tasks        hidden"));
}

#[test]
fn route_uses_configured_sections() {
    let dir = workspace();
    fs::write(
        dir.path().join("custom.toml"),
        "[router]\ndefault = \"home\"\n\n[[router.sections]]\nprefix = \"map\"\nsection = \"map-view\"\n",
    )
    .unwrap();
    let body = json_stdout(fieldkit(dir.path()).args(["--config", "custom.toml", "route", "map"]));
    assert_eq!(body["active"], "map-view");
    assert_eq!(body["sections"], json!({"home": false, "map-view": true}));
}

#[test]
fn duplicate_route_prefix_is_reported() {
    let dir = workspace();
    fs::write(
        dir.path().join("bad.toml"),
        "[router]\ndefault = \"a\"\n\n[[router.sections]]\nprefix = \"x\"\nsection = \"a\"\n\n[[router.sections]]\nprefix = \"x\"\nsection = \"b\"\n",
    )
    .unwrap();
    fieldkit(dir.path())
        .args(["--config", "bad.toml", "route", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("registered twice"));
}

// ──────────────────────────────────────────────
// 3. Configuration errors
// ──────────────────────────────────────────────

#[test]
fn missing_config_file_fails() {
    let dir = workspace();
    fieldkit(dir.path())
        .args(["--config", "absent.toml", "route"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read"));
}

#[test]
fn missing_agronomist_fails_with_json_error() {
    let dir = TempDir::new().unwrap();
    fieldkit(dir.path())
        .args(["--output", "json", "task", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("no agronomist configured"));
}

#[test]
fn agronomist_from_environment() {
    let dir = TempDir::new().unwrap();
    fieldkit(dir.path())
        .env("FIELDKIT_AGRONOMIST", "ag-env")
        .args(["task", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no tasks"));
}

// ──────────────────────────────────────────────
// 4. Visit lifecycle across invocations
// ──────────────────────────────────────────────

#[test]
fn visit_start_observe_end() {
    let dir = workspace();
    let visit = json_stdout(fieldkit(dir.path()).args([
        "visit",
        "start",
        "--client",
        "client-1",
        "--property",
        "prop-1",
        "--property-name",
        "Talhão Norte",
    ]));
    assert_eq!(visit["status"], "in_progress");
    assert_eq!(visit["check_in_coords"], json!({"latitude": -15.79, "longitude": -47.88}));
    let id = visit["id"].as_str().unwrap().to_string();

    // A later invocation picks the visit up again.
    fieldkit(dir.path())
        .args(["visit", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("in progress: {}", id)));

    fieldkit(dir.path())
        .args(["visit", "observe", "--text", "ferrugem na folha"])
        .assert()
        .success()
        .stdout(predicate::str::contains("observation"));

    let status = json_stdout(fieldkit(dir.path()).args(["visit", "status"]));
    assert_eq!(status["observations"][0]["text"], "ferrugem na folha");

    let done = json_stdout(fieldkit(dir.path()).args(["visit", "end"]));
    assert_eq!(done["id"], id.as_str());
    assert_eq!(done["status"], "completed");

    fieldkit(dir.path())
        .args(["visit", "status"])
        .assert()
        .success()
        .stdout(predicate::str::diff("idle\n"));
}

#[test]
fn visit_start_at_marker_coordinates() {
    let dir = workspace();
    let visit = json_stdout(fieldkit(dir.path()).args([
        "visit",
        "start",
        "--client",
        "c",
        "--property",
        "p",
        "--at",
        "-10.5,-50.25",
    ]));
    assert_eq!(visit["check_in_coords"], json!({"latitude": -10.5, "longitude": -50.25}));
}

#[test]
fn second_start_conflicts() {
    let dir = workspace();
    fieldkit(dir.path())
        .args(["visit", "start", "--client", "c", "--property", "p"])
        .assert()
        .success();
    fieldkit(dir.path())
        .args(["visit", "start", "--client", "c", "--property", "p"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already in progress"));

    let store = read_store(dir.path());
    assert_eq!(store["collections"]["visits"].as_object().unwrap().len(), 1);
}

#[test]
fn end_without_position_keeps_visit_in_progress() {
    let dir = workspace();
    fieldkit(dir.path())
        .args(["visit", "start", "--client", "c", "--property", "p"])
        .assert()
        .success();

    fieldkit(dir.path())
        .env_remove("FIELDKIT_LAT")
        .env_remove("FIELDKIT_LON")
        .args(["visit", "end"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("location unavailable"));

    let status = json_stdout(fieldkit(dir.path()).args(["visit", "status"]));
    assert_eq!(status["status"], "in_progress");
    assert!(status["visit"].get("check_out_time").is_none() || status["visit"]["check_out_time"].is_null());
}

#[test]
fn command_line_position_overrides_environment() {
    let dir = workspace();
    let visit = json_stdout(fieldkit(dir.path()).args([
        "--lat", "1.5", "--lon", "-2.5", "visit", "start", "--client", "c", "--property", "p",
    ]));
    assert_eq!(visit["check_in_coords"], json!({"latitude": 1.5, "longitude": -2.5}));
}

#[test]
fn observe_without_visit_fails() {
    let dir = workspace();
    fieldkit(dir.path())
        .args(["visit", "observe", "--text", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no visit is in progress"));
}

#[test]
fn empty_observation_is_rejected() {
    let dir = workspace();
    fieldkit(dir.path())
        .args(["visit", "start", "--client", "c", "--property", "p"])
        .assert()
        .success();
    fieldkit(dir.path())
        .args(["visit", "observe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("needs text or an image"));
}

#[test]
fn recover_reports_duplicates() {
    let dir = workspace();
    let visit = |time: &str| {
        json!({
            "agronomist_id": "ag-1",
            "client_id": "c",
            "property_id": "p",
            "client_name": "c",
            "property_name": "p",
            "check_in_time": time,
            "check_in_coords": {"latitude": 0.0, "longitude": 0.0},
            "status": "in_progress"
        })
    };
    seed_store(
        dir.path(),
        json!({
            "visits": {
                "v-old": visit("2026-10-01T08:00:00.000000000Z"),
                "v-new": visit("2026-10-02T08:00:00.000000000Z"),
            }
        }),
    );

    let output = fieldkit(dir.path())
        .args(["--output", "json", "visit", "recover"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["visit"]["id"], "v-new");
    assert_eq!(body["duplicates"], json!(["v-old"]));
    assert!(String::from_utf8_lossy(&output.stderr).contains("several visits in progress"));
}

// ──────────────────────────────────────────────
// 5. Plots, tasks and activities
// ──────────────────────────────────────────────

fn seed_farm(dir: &Path) {
    seed_store(
        dir,
        json!({
            "plots": {
                "plot-2": {"property_id": "prop-1", "name": "talhão 2"},
                "plot-1": {"property_id": "prop-1", "name": "Talhão 1"},
                "plot-9": {"property_id": "prop-9", "name": "Other"}
            },
            "crop_cycles": {
                "cc-1": {"plot_id": "plot-1", "crop": "soy", "status": "active"},
                "cc-0": {"plot_id": "plot-2", "crop": "maize", "status": "closed"}
            }
        }),
    );
}

#[test]
fn plots_of_property_sorted_by_name() {
    let dir = workspace();
    seed_farm(dir.path());
    let plots = json_stdout(fieldkit(dir.path()).args(["plots", "prop-1"]));
    assert_eq!(
        plots,
        json!([
            {"id": "plot-1", "label": "Talhão 1"},
            {"id": "plot-2", "label": "talhão 2"}
        ])
    );
}

#[test]
fn plots_of_unknown_property_is_empty() {
    let dir = workspace();
    seed_farm(dir.path());
    fieldkit(dir.path())
        .args(["plots", "prop-x"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no plots for property prop-x"));
}

#[test]
fn task_schedule_and_list() {
    let dir = workspace();
    for (title, due) in [("Second visit", "2026-12-01"), ("Scout aphids", "2026-11-03")] {
        fieldkit(dir.path())
            .args([
                "task", "schedule", "--title", title, "--due", due, "--property", "prop-1",
                "--plot", "plot-1",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("scheduled for"));
    }
    let tasks = json_stdout(fieldkit(dir.path()).args(["task", "list"]));
    let titles: Vec<_> = tasks
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["Scout aphids", "Second visit"]);
    assert_eq!(tasks[0]["status"], "pending");
}

#[test]
fn task_with_blank_fields_names_them() {
    let dir = workspace();
    fieldkit(dir.path())
        .args([
            "task", "schedule", "--title", " ", "--due", "2026-11-03", "--property", "prop-1",
            "--plot", "",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required field(s): title, plot"));
    assert!(!dir.path().join("store.json").exists());
}

#[test]
fn task_with_bad_date_fails() {
    let dir = workspace();
    fieldkit(dir.path())
        .args([
            "task", "schedule", "--title", "t", "--due", "2026-02-30", "--property", "p",
            "--plot", "q",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a calendar date"));
}

#[test]
fn activity_lands_under_active_cycle() {
    let dir = workspace();
    seed_farm(dir.path());
    fieldkit(dir.path())
        .args(["activity", "register", "--plot", "plot-1", "--kind", "spraying"])
        .assert()
        .success()
        .stdout(predicate::str::contains("spraying recorded on plot plot-1"));

    let store = read_store(dir.path());
    let activities = store["collections"]["crop_cycles/cc-1/activities"]
        .as_object()
        .unwrap();
    assert_eq!(activities.len(), 1);
}

#[test]
fn activity_without_active_cycle_fails() {
    let dir = workspace();
    seed_farm(dir.path());
    fieldkit(dir.path())
        .args(["activity", "register", "--plot", "plot-2", "--kind", "harvest"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("active crop cycle for plot 'plot-2' not found"));
}

#[test]
fn quiet_suppresses_output() {
    let dir = workspace();
    fieldkit(dir.path())
        .args(["--quiet", "route", "task"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
