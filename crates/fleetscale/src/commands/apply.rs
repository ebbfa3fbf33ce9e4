use crate::utils;
use anyhow::Context;
use colored::Colorize;
use fleetscale_cloud::StateManager;
use std::path::Path;

const TEMPLATE_FILE: &str = "template.json";

pub async fn handle(config_path: &Path) -> anyhow::Result<()> {
    let project = utils::load_project(config_path)?;
    let state_manager = StateManager::new(&project.base_dir);
    let lock = state_manager.acquire_lock().await?;

    let result = apply(&project, &state_manager).await;
    settle(result, lock.release().await)
}

/// An apply failure takes precedence over a failed lock release
fn settle(
    result: anyhow::Result<()>,
    release: fleetscale_cloud::Result<()>,
) -> anyhow::Result<()> {
    match (result, release) {
        (Err(err), Err(release_err)) => {
            tracing::warn!("Failed to release state lock: {}", release_err);
            Err(err)
        }
        (result, Ok(())) => result,
        (Ok(()), Err(release_err)) => {
            Err::<(), _>(release_err).context("Failed to release state lock")
        }
    }
}

async fn apply(
    project: &fleetscale_core::Project,
    state_manager: &StateManager,
) -> anyhow::Result<()> {
    let (provider, provisioned) = utils::run_pass(project).await?;
    let resources = provider.resources().await;

    let mut state = state_manager.load().await?;
    let plan = fleetscale_cloud::Plan::diff(&resources, &state);
    utils::print_plan(&plan);

    if !plan.has_changes {
        println!("{}", "No changes. Nothing to apply.".green());
        return Ok(());
    }

    let template_path = state_manager.state_dir().join(TEMPLATE_FILE);
    let template = serde_json::to_string_pretty(&provider.template().await?)?;
    tokio::fs::write(&template_path, template)
        .await
        .with_context(|| format!("Failed to write {}", template_path.display()))?;

    state.record(&resources);
    state_manager.save(&state).await?;
    tracing::info!("Recorded {} resource(s)", resources.len());

    println!();
    println!(
        "{} Applied {} fleet(s), template at {}",
        "✓".green().bold(),
        provisioned.len(),
        template_path.display().to_string().cyan()
    );
    for fleet in &provisioned {
        println!("  {}: {}", fleet.fleet.logical_id().cyan(), fleet.output.value);
    }
    Ok(())
}
