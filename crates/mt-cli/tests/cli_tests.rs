//! Integration tests for the `mt` binary
//!
//! Each test writes a small deployment (config, a data directory and an
//! on-disk meta store) into a temp dir and drives the compiled binary.

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Path to the compiled mt binary
fn mt_bin() -> String {
    env!("CARGO_BIN_EXE_mt").to_string()
}

/// Run an `mt` CLI command and return (stdout, stderr, success).
fn run_mt(config: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(mt_bin())
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to execute mt with args {:?}: {}", args, e));
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

fn deployment() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(
        data.join("orders.csv"),
        "id,customer,amount\n1,ann,10\n2,bob,25\n3,ann,5\n",
    )
    .unwrap();

    let config = dir.path().join("modeltable.yml");
    std::fs::write(
        &config,
        "name: cli_test\n\
         default_project: proj\n\
         meta:\n  path: target/meta.duckdb\n\
         sources:\n  files:\n    type: files\n    path: data\n",
    )
    .unwrap();
    (dir, config)
}

#[test]
fn test_query_prints_table() {
    let (_dir, config) = deployment();
    let (stdout, stderr, ok) = run_mt(
        &config,
        &[
            "query",
            "SELECT customer, SUM(amount) AS total FROM files.orders GROUP BY customer ORDER BY customer",
        ],
    );
    assert!(ok, "query failed: {}", stderr);

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "customer  total");
    assert_eq!(lines[1], "--------  -----");
    assert_eq!(lines[2], "ann       15");
    assert_eq!(lines[3], "bob       25");
    assert_eq!(lines[4], "(2 rows)");
}

#[test]
fn test_query_json_output() {
    let (_dir, config) = deployment();
    let (stdout, stderr, ok) = run_mt(
        &config,
        &["query", "SELECT id FROM files.orders WHERE amount > 6 ORDER BY id", "-o", "json"],
    );
    assert!(ok, "query failed: {}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json, serde_json::json!([{"id": 1}, {"id": 2}]));
}

#[test]
fn test_query_error_exits_nonzero() {
    let (_dir, config) = deployment();
    let (_stdout, stderr, ok) = run_mt(&config, &["query", "SELECT * FROM files.missing"]);
    assert!(!ok);
    assert!(stderr.contains("missing"), "stderr: {}", stderr);
}

#[test]
fn test_models_empty() {
    let (_dir, config) = deployment();
    let (stdout, _stderr, ok) = run_mt(&config, &["models", "list"]);
    assert!(ok);
    assert!(stdout.contains("No models found."));
}

#[test]
fn test_scheduler_once_runs_created_job() {
    let (_dir, config) = deployment();
    let (_stdout, stderr, ok) = run_mt(
        &config,
        &[
            "jobs",
            "create",
            "count_orders",
            "SELECT COUNT(*) AS n FROM files.orders",
            "--every",
            "every day",
        ],
    );
    assert!(ok, "jobs create failed: {}", stderr);

    let (stdout, stderr, ok) = run_mt(&config, &["scheduler", "--once"]);
    assert!(ok, "scheduler failed: {}", stderr);
    assert!(stdout.contains("1 job(s) ran, 0 failed"), "stdout: {}", stdout);

    let (stdout, _stderr, ok) = run_mt(&config, &["jobs", "list"]);
    assert!(ok);
    assert!(stdout.contains("count_orders"));
    assert!(stdout.contains("every day"));

    let (stdout, _stderr, ok) = run_mt(&config, &["jobs", "history", "count_orders"]);
    assert!(ok);
    let runs: Vec<&str> = stdout
        .lines()
        .filter(|l| l.contains("count_orders"))
        .collect();
    assert_eq!(runs.len(), 1);

    // the next run is a day away
    let (stdout, _stderr, ok) = run_mt(&config, &["scheduler", "--once"]);
    assert!(ok);
    assert!(stdout.contains("0 job(s) ran, 0 failed"));

    let (_stdout, _stderr, ok) = run_mt(&config, &["jobs", "drop", "count_orders"]);
    assert!(ok);
    let (stdout, _stderr, _ok) = run_mt(&config, &["jobs", "list"]);
    assert!(stdout.contains("No jobs found."));
    let (stdout, _stderr, _ok) = run_mt(&config, &["jobs", "history"]);
    assert!(stdout.contains("count_orders"), "history is kept: {}", stdout);
}

#[test]
fn test_jobs_create_rejects_bad_schedule() {
    let (_dir, config) = deployment();
    let (_stdout, stderr, ok) = run_mt(
        &config,
        &["jobs", "create", "j1", "SELECT 1", "--every", "every fortnight"],
    );
    assert!(!ok);
    assert!(stderr.contains("every fortnight"), "stderr: {}", stderr);
}

#[test]
fn test_model_lifecycle() {
    let (_dir, config) = deployment();
    let (stdout, stderr, ok) = run_mt(
        &config,
        &[
            "models",
            "create",
            "spend",
            "--predict",
            "amount",
            "--from",
            "SELECT * FROM files.orders",
        ],
    );
    assert!(ok, "models create failed: {}", stderr);
    assert!(stdout.contains("proj.spend version 1 is complete (active)"), "{}", stdout);

    let (stdout, stderr, ok) = run_mt(
        &config,
        &["models", "retrain", "spend", "--tag", "second", "--no-activate"],
    );
    assert!(ok, "models retrain failed: {}", stderr);
    assert!(stdout.contains("version 2 is complete"), "{}", stdout);
    assert!(!stdout.contains("(active)"), "{}", stdout);

    let (stdout, _stderr, ok) = run_mt(
        &config,
        &["query", "SELECT predictor_version FROM spend", "-o", "json"],
    );
    assert!(ok);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json, serde_json::json!([{"predictor_version": 1}]));

    let (_stdout, stderr, ok) = run_mt(&config, &["models", "activate", "spend", "2"]);
    assert!(ok, "activate failed: {}", stderr);

    // the active version cannot be deleted, the old one can
    let (_stdout, _stderr, ok) = run_mt(&config, &["models", "delete-version", "spend", "2"]);
    assert!(!ok);
    let (_stdout, stderr, ok) = run_mt(&config, &["models", "delete-version", "spend", "1"]);
    assert!(ok, "delete-version failed: {}", stderr);

    let (stdout, _stderr, ok) = run_mt(&config, &["models", "list", "--versions"]);
    assert!(ok);
    let versions: Vec<&str> = stdout.lines().filter(|l| l.contains("spend")).collect();
    assert_eq!(versions.len(), 1);
    assert!(versions[0].contains("second"));

    let (_stdout, stderr, ok) = run_mt(&config, &["models", "drop", "spend"]);
    assert!(ok, "drop failed: {}", stderr);
    let (stdout, _stderr, _ok) = run_mt(&config, &["models", "list"]);
    assert!(stdout.contains("No models found."));
}

#[test]
fn test_view_create_query_drop() {
    let (_dir, config) = deployment();
    let (_stdout, stderr, ok) = run_mt(
        &config,
        &[
            "views",
            "create",
            "big_orders",
            "SELECT id, amount FROM files.orders WHERE amount > 6",
        ],
    );
    assert!(ok, "views create failed: {}", stderr);

    let (stdout, _stderr, ok) = run_mt(&config, &["views", "list"]);
    assert!(ok);
    assert!(stdout.contains("big_orders"));

    let (stdout, stderr, ok) = run_mt(
        &config,
        &["query", "SELECT COUNT(*) AS n FROM big_orders", "-o", "json"],
    );
    assert!(ok, "query failed: {}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json, serde_json::json!([{"n": 2}]));

    let (_stdout, stderr, ok) = run_mt(&config, &["views", "create", "big_orders", "SELECT 1"]);
    assert!(!ok);
    assert!(stderr.contains("already exists"), "stderr: {}", stderr);

    let (_stdout, _stderr, ok) = run_mt(&config, &["views", "drop", "big_orders"]);
    assert!(ok);
    let (_stdout, _stderr, ok) = run_mt(&config, &["query", "SELECT * FROM big_orders"]);
    assert!(!ok);
}

#[test]
fn test_describe_file_table() {
    let (_dir, config) = deployment();
    let (stdout, stderr, ok) = run_mt(&config, &["describe", "files.orders"]);
    assert!(ok, "describe failed: {}", stderr);

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "COLUMN    TYPE");
    let customer = lines
        .iter()
        .find(|l| l.starts_with("customer"))
        .unwrap_or_else(|| panic!("no customer column: {}", stdout));
    assert!(customer.ends_with("text"), "{}", customer);

    let (_stdout, stderr, ok) = run_mt(&config, &["describe", "files.missing"]);
    assert!(!ok);
    assert!(stderr.contains("missing"), "stderr: {}", stderr);
}
