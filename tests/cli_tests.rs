// ABOUTME: Integration tests for the CLI application
// ABOUTME: Runs the beaconflow binary and the command functions against temp plan files

use std::collections::HashMap;
use std::process::Command;

use beaconflow::cli::commands;
use beaconflow::cli::Config;

mod common;
use common::{TestEnvironment, TestPlanBuilder};

fn beaconflow(env: &TestEnvironment, args: &[&str]) -> std::process::Output {
    let config = env.create_file("beaconflow.yaml", "logging:\n  level: warn\n  format: compact\n");
    Command::new(env!("CARGO_BIN_EXE_beaconflow"))
        .arg("--no-color")
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("Failed to execute beaconflow")
}

#[test]
fn test_cli_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_beaconflow"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("validate"));
    assert!(stdout.contains("--help"));
}

#[test]
fn test_cli_lists_task_types() {
    let env = TestEnvironment::new();
    let output = beaconflow(&env, &["tasks"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["check_clients_are_healthy", "run_tasks", "run_tasks_concurrent", "sleep"] {
        assert!(stdout.contains(name), "missing {} in {}", name, stdout);
    }
}

#[test]
fn test_cli_runs_plan() {
    let env = TestEnvironment::new();
    let plan = env.create_plan_file(
        "short",
        &TestPlanBuilder::new("short-plan")
            .with_task("sleep", "{ duration: 10ms }")
            .with_timed_task("sleep", "5s", "{ duration: 10ms }"),
    );

    let output = beaconflow(&env, &["run", plan.to_str().unwrap(), "-V", "height=100"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {}", stdout);
    assert!(stdout.contains("short-plan"));
    assert!(stdout.contains("succeeded"));
}

#[test]
fn test_cli_run_fails_on_invalid_task_config() {
    let env = TestEnvironment::new();
    let plan = env.create_plan_file(
        "invalid",
        &TestPlanBuilder::new("invalid-plan").with_task("sleep", "{ duration: later }"),
    );

    let output = beaconflow(&env, &["run", plan.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_validate_plan_command() {
    let env = TestEnvironment::new();
    let valid = env.create_plan_file(
        "valid",
        &TestPlanBuilder::new("valid-plan")
            .with_task("check_clients_are_healthy", "{ poll_interval: 5s }")
            .with_task("run_tasks", "{ tasks: [ { name: sleep, config: { duration: 1s } } ] }"),
    );
    assert!(commands::validate_plan(valid, &Config::default()).is_ok());

    let unknown = env.create_plan_file(
        "unknown",
        &TestPlanBuilder::new("unknown-plan").with_task("deploy_contract", "{}"),
    );
    let err = commands::validate_plan(unknown, &Config::default()).unwrap_err();
    assert!(format!("{:#}", err).contains("Unknown task type"));

    let bad_child = env.create_plan_file(
        "bad_child",
        &TestPlanBuilder::new("bad-child-plan")
            .with_task("run_tasks", "{ tasks: [ { name: sleep, config: { duration: -1 } } ] }"),
    );
    assert!(commands::validate_plan(bad_child, &Config::default()).is_err());
}

#[test]
fn test_variables_are_layered() {
    let env = TestEnvironment::new();
    let plan = env.create_plan_file(
        "layered",
        &TestPlanBuilder::new("layered-plan")
            .with_variable("network", "plan-net")
            .with_variable("height", "1")
            .with_variable("slot", "7")
            .with_task("sleep", "{ duration: 1s }"),
    );

    let mut config = Config::default();
    config
        .variables
        .insert("network".to_string(), serde_json::json!("config-net"));
    config
        .variables
        .insert("height".to_string(), serde_json::json!(50));
    let cli_vars = HashMap::from([("height".to_string(), serde_json::json!(100))]);

    let services = commands::build_services(&config).unwrap();
    let (_, scheduler) = commands::load_plan(&plan, cli_vars, &config, services).unwrap();

    let vars = scheduler.variables();
    assert_eq!(vars.get("network"), Some(serde_json::json!("config-net")));
    assert_eq!(vars.get("height"), Some(serde_json::json!(100)));
    assert_eq!(vars.get("slot"), Some(serde_json::json!(7)));
    assert_eq!(scheduler.root_tasks().len(), 1);
}

#[test]
fn test_build_services_rejects_bad_endpoints() {
    let mut config = Config::default();
    config.endpoints = serde_yaml::from_str(
        "- name: a\n  consensus_url: http://127.0.0.1:5052\n- name: a\n  consensus_url: http://127.0.0.1:5053\n",
    )
    .unwrap();
    assert!(commands::build_services(&config).is_err());

    config.endpoints = serde_yaml::from_str("- name: b\n  execution_url: ftp://127.0.0.1\n").unwrap();
    assert!(commands::build_services(&config).is_err());

    config.endpoints = serde_yaml::from_str("- name: c\n  execution_url: http://127.0.0.1:8545\n").unwrap();
    let services = commands::build_services(&config).unwrap();
    assert_eq!(services.client_pool().execution_clients().len(), 1);
    assert!(services.client_pool().consensus_clients().is_empty());
}
