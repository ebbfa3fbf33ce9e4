use anyhow::Context;
use colored::Colorize;
use fleetscale_cloud::state::STATE_DIR;
use fleetscale_cloud::{Plan, ResourceSet, StateManager};
use fleetscale_cloud_synth::{CATALOG_FILE, ImageCatalog, SynthProvider};
use fleetscale_core::{Project, ProvisionedFleet, Provisioner};
use std::path::{Path, PathBuf};

/// `--config` if given, otherwise the discovered fleet.kdl
pub fn resolve_config_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(fleetscale_config::find_fleet_file()?),
    }
}

pub fn load_project(config_path: &Path) -> anyhow::Result<Project> {
    fleetscale_core::parse_kdl_file(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))
}

/// Synthesizing provider with the project's image catalog
pub async fn provider_for(project: &Project) -> anyhow::Result<SynthProvider> {
    let catalog_path = project.base_dir.join(STATE_DIR).join(CATALOG_FILE);
    let catalog = ImageCatalog::load(&catalog_path)
        .await
        .with_context(|| format!("Failed to load image catalog {}", catalog_path.display()))?;
    Ok(SynthProvider::new(project.region.clone()).with_catalog(catalog))
}

/// Run one provisioning pass and return what it declared
pub async fn run_pass(
    project: &Project,
) -> anyhow::Result<(SynthProvider, Vec<ProvisionedFleet>)> {
    let provider = provider_for(project).await?;
    let provisioned = Provisioner::new(&provider)
        .with_base_dir(&project.base_dir)
        .provision_project(project)
        .await?;
    Ok((provider, provisioned))
}

/// Diff the declared resources against the recorded state
pub async fn plan_against_state(
    project: &Project,
    resources: &ResourceSet,
) -> anyhow::Result<Plan> {
    let state = StateManager::new(&project.base_dir).load().await?;
    Ok(Plan::diff(resources, &state))
}

pub fn print_plan(plan: &Plan) {
    for action in &plan.actions {
        use fleetscale_cloud::ActionType;
        let line = match action.action_type {
            ActionType::Create => format!("  + {}", action.description).green(),
            ActionType::Update => format!("  ~ {}", action.description).yellow(),
            ActionType::Delete => format!("  - {}", action.description).red(),
            ActionType::NoOp => format!("    {}", action.description).dimmed(),
        };
        println!("{}", line);
    }
    println!();
    println!("{}", plan.summary().to_string().bold());
}
