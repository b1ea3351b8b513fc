// ABOUTME: Command implementations for the beaconflow CLI
// ABOUTME: Handles execution of the run, validate and tasks commands

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::Config;
use crate::engine::{RunSummary, TaskScheduler};
use crate::parser::TestPlan;
use crate::services::{ClientPool, RpcHealthProbe, ServicesProvider, ValidatorNames};
use crate::tasks::TaskRegistry;
use crate::vars::Variables;

/// Build the shared services from the configured endpoints and name inventory.
pub fn build_services(config: &Config) -> Result<ServicesProvider> {
    let probe = RpcHealthProbe::new(config.probe_timeout)?;
    let pool = ClientPool::with_probe(Arc::new(probe));
    for endpoint in &config.endpoints {
        pool.add_client(endpoint.clone())?;
    }
    let names = ValidatorNames::new(&config.validator_names)?;
    info!(
        "Loaded {} client(s) and {} validator name range(s)",
        pool.len(),
        names.len()
    );
    Ok(ServicesProvider::from_pool(Arc::new(pool), names))
}

/// Parse a plan and register its tasks as root tasks of a new scheduler.
/// Variables are layered plan < config < command line.
pub fn load_plan(
    plan_path: &Path,
    cli_vars: HashMap<String, serde_json::Value>,
    config: &Config,
    services: ServicesProvider,
) -> Result<(TestPlan, TaskScheduler)> {
    let mut plan = TestPlan::from_file(plan_path)
        .with_context(|| format!("Failed to load test plan {}", plan_path.display()))?;
    plan.merge_variables(config.variables.clone());
    plan.merge_variables(cli_vars);

    let registry = Arc::new(TaskRegistry::with_builtin_tasks());
    let scheduler = TaskScheduler::new(
        registry,
        services,
        Variables::from_map(plan.variables.clone()),
    );
    for (index, options) in plan.tasks.iter().enumerate() {
        scheduler
            .add_root_task(options.clone())
            .with_context(|| format!("Invalid task #{} ({})", index, options.title()))?;
    }
    Ok((plan, scheduler))
}

/// Execute a test plan
pub async fn run_plan(
    plan_path: PathBuf,
    vars: HashMap<String, serde_json::Value>,
    start_index: usize,
    config: &Config,
) -> Result<()> {
    info!("Starting test plan: {}", plan_path.display());

    let services = build_services(config)?;
    let (plan, scheduler) = load_plan(&plan_path, vars, config, services)?;
    info!("Loaded test plan '{}' with {} task(s)", plan.name, plan.tasks.len());

    let token = CancellationToken::new();
    let ctrl_c = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling test plan");
                token.cancel();
            }
        })
    };

    let result = scheduler.run_tasks(&token, start_index).await;
    ctrl_c.abort();

    let summary = scheduler.summary();
    print_summary(&plan.name, &summary);

    match result {
        Ok(()) => {
            info!("Test plan completed");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Test plan '{}' failed: {}", plan.name, e)),
    }
}

/// Validate a test plan file
pub fn validate_plan(plan_path: PathBuf, config: &Config) -> Result<()> {
    info!("Validating test plan: {}", plan_path.display());

    // Validation never probes, so the configured endpoints are not needed
    let names = ValidatorNames::new(&config.validator_names)?;
    let services = ServicesProvider::from_pool(Arc::new(ClientPool::new()?), names);
    let (plan, scheduler) = load_plan(&plan_path, HashMap::new(), config, services)?;

    println!("✓ Test plan '{}' is valid", plan.name);
    println!("  Root tasks: {}", plan.tasks.len());
    println!("  Resolved tasks: {}", scheduler.summary().tasks.len());
    println!("  Variables: {}", plan.variables.len());

    info!("Test plan validation completed successfully");
    Ok(())
}

/// List the registered task types
pub fn list_tasks() -> Result<()> {
    let registry = TaskRegistry::with_builtin_tasks();
    let width = registry.list().iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, description) in registry.list() {
        println!("  {:<width$}  {}", name, description, width = width);
    }
    Ok(())
}

fn print_summary(plan_name: &str, summary: &RunSummary) {
    println!(
        "Test plan '{}' finished with status: {} ({}/{} root tasks succeeded)",
        plan_name, summary.status, summary.roots.succeeded, summary.roots.total
    );
    for task in &summary.tasks {
        let duration = task
            .duration
            .map(|d| format!("{:.1}s", d.as_secs_f64()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>4}  {:<10} {:>8}  {}{}",
            task.id.to_string(),
            task.status.to_string(),
            duration,
            "  ".repeat(task.depth),
            task.title
        );
        if let Some(ref error) = task.error {
            println!("        {}{}", "  ".repeat(task.depth), error);
        }
    }
}
