//! CLI integration tests.

use std::process::{Command, Output};
use tempfile::TempDir;

fn regflow_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_regflow"));
    cmd.env_remove("REGFLOW_REGISTRY")
        .env_remove("REGFLOW_NAMESPACE")
        .env_remove("RUST_LOG");
    cmd
}

fn run_in(dir: &TempDir, args: &[&str]) -> Output {
    regflow_cmd()
        .args(["--registry", dir.path().to_str().unwrap()])
        .args(args)
        .output()
        .expect("run")
}

fn setup_registry() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    let output = run_in(&dir, &["init"]);
    assert!(output.status.success());
    dir
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_cli_init() {
    let dir = TempDir::new().expect("temp dir");
    let output = run_in(&dir, &["init"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("Registry initialized"));
    assert!(dir.path().join("registry.db").exists());
}

#[test]
fn test_cli_stats_empty() {
    let dir = setup_registry();
    let output = run_in(&dir, &["stats"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Runs:     0"));
    assert!(out.contains("Models:   0"));
}

#[test]
fn test_cli_stats_uninitialized_fails() {
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("nope");
    let output = regflow_cmd()
        .args(["--registry", missing.to_str().unwrap(), "stats"])
        .output()
        .expect("stats");

    assert!(!output.status.success());
    assert!(stderr(&output).starts_with("Error:"));
}

#[test]
fn test_cli_demo() {
    let dir = setup_registry();
    let output = run_in(&dir, &["demo"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("> register model in registry 1.0"));
    assert!(out.contains("> register model in registry 2.0"));
    assert!(out.contains("> Use model for prediction"));
    assert!(out.contains("> Transition model to another stage"));
    assert!(out.contains("Name: demo-RandomForestRegressionModel"));
    assert!(out.contains("Version: 1"));
    assert!(out.contains("Stage: None"));
    assert!(out.contains("model_pred: [1.0]"));

    let get = run_in(
        &dir,
        &["model", "get", "demo-RandomForestRegressionModel", "-v", "1"],
    );
    assert!(get.status.success());
    assert!(stdout(&get).contains("Stage: Staging"));
}

#[test]
fn test_cli_demo_namespace_flag_and_env() {
    let dir = setup_registry();

    let output = run_in(&dir, &["demo", "--namespace", "flag"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Name: flag-RandomForestRegressionModel"));

    let output = regflow_cmd()
        .env("REGFLOW_NAMESPACE", "env")
        .args(["--registry", dir.path().to_str().unwrap(), "demo"])
        .output()
        .expect("demo");
    assert!(output.status.success());
    assert!(stdout(&output).contains("Name: env-RandomForestRegressionModel"));

    // Flag wins over environment
    let output = regflow_cmd()
        .env("REGFLOW_NAMESPACE", "env")
        .args([
            "--registry",
            dir.path().to_str().unwrap(),
            "demo",
            "--namespace",
            "flag",
        ])
        .output()
        .expect("demo");
    assert!(stdout(&output).contains("Version: 2"));
}

#[test]
fn test_cli_demo_invalid_stage() {
    let dir = setup_registry();
    let output = run_in(&dir, &["demo", "--stage", "Canary"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Canary"));
    // Nothing was tracked
    assert!(stdout(&run_in(&dir, &["stats"])).contains("Runs:     0"));
}

#[test]
fn test_cli_demo_with_config_file() {
    let dir = setup_registry();
    let config = dir.path().join("workflow.toml");
    std::fs::write(&config, "namespace = \"cfg\"\ntarget_stage = \"Production\"\n")
        .expect("write config");

    let output = run_in(&dir, &["--config", config.to_str().unwrap(), "demo"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("to Production"));

    let list = run_in(&dir, &["model", "list", "cfg-RandomForestRegressionModel"]);
    assert!(stdout(&list).contains("Production"));
}

#[test]
fn test_cli_model_stage_and_list() {
    let dir = setup_registry();
    run_in(&dir, &["demo"]);
    run_in(&dir, &["demo"]);

    let output = run_in(
        &dir,
        &[
            "model",
            "stage",
            "demo-RandomForestRegressionModel",
            "-v",
            "2",
            "-t",
            "production",
        ],
    );
    assert!(output.status.success());
    assert!(stdout(&output).contains("from Staging to Production"));

    let output = run_in(&dir, &["model", "list"]);
    assert!(stdout(&output).contains("demo-RandomForestRegressionModel"));

    let output = run_in(
        &dir,
        &["model", "get", "demo-RandomForestRegressionModel", "-v", "Production"],
    );
    assert!(stdout(&output).contains("Version: 2"));
}

#[test]
fn test_cli_model_stage_invalid_target() {
    let dir = setup_registry();
    run_in(&dir, &["demo"]);

    let output = run_in(
        &dir,
        &[
            "model",
            "stage",
            "demo-RandomForestRegressionModel",
            "-v",
            "1",
            "-t",
            "Canary",
        ],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Error:"));
}

#[test]
fn test_cli_model_download() {
    let dir = setup_registry();
    run_in(&dir, &["demo"]);
    let target = dir.path().join("model.json");

    let output = run_in(
        &dir,
        &[
            "model",
            "download",
            "demo-RandomForestRegressionModel",
            "-v",
            "latest",
            "-o",
            target.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());

    let bytes = std::fs::read(&target).expect("downloaded");
    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(json["flavor"], "random_forest_regressor");
}

#[test]
fn test_cli_predict() {
    let dir = setup_registry();
    run_in(&dir, &["demo"]);

    let output = run_in(
        &dir,
        &[
            "predict",
            "models:/demo-RandomForestRegressionModel/Staging",
            "--row",
            "0,1,0",
        ],
    );
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "model_pred: [1.0]");
}

#[test]
fn test_cli_predict_wrong_width() {
    let dir = setup_registry();
    run_in(&dir, &["demo"]);

    let output = run_in(
        &dir,
        &[
            "predict",
            "models:/demo-RandomForestRegressionModel/1",
            "--row",
            "0,1",
        ],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("expected 3"));
}

#[test]
fn test_cli_predict_malformed_uri() {
    let dir = setup_registry();
    let output = run_in(&dir, &["predict", "s3://bucket/model", "--row", "0,1,0"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Error:"));
}

#[test]
fn test_cli_run_get_and_list() {
    let dir = setup_registry();
    run_in(&dir, &["demo"]);

    let list = stdout(&run_in(&dir, &["run", "list"]));
    assert!(list.contains("logging model example"));
    let run_id = list
        .lines()
        .nth(1)
        .and_then(|line| line.split_whitespace().next())
        .expect("run id");

    let output = run_in(&dir, &["run", "get", run_id]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Status:     FINISHED"));
    assert!(out.contains("n_estimators: 4"));
    assert!(out.contains("random_state: 42"));
}

#[test]
fn test_cli_run_get_unknown() {
    let dir = setup_registry();
    let output = run_in(&dir, &["run", "get", "00000000000000000000000000000000"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not found"));
}

#[test]
fn test_cli_run_get_malformed_id() {
    let dir = setup_registry();
    let output = run_in(&dir, &["run", "get", "not-a-uuid"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid run id: not-a-uuid"));
}
