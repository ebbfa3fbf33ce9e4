use crate::utils;
use colored::Colorize;
use std::path::Path;

pub async fn handle(config_path: &Path) -> anyhow::Result<()> {
    let project = utils::load_project(config_path)?;
    let (provider, _) = utils::run_pass(&project).await?;
    let plan = utils::plan_against_state(&project, &provider.resources().await).await?;

    println!("{}", format!("Plan for {}", project.name).blue().bold());
    println!();
    utils::print_plan(&plan);

    if !plan.has_changes {
        println!("{}", "No changes. Everything is up to date.".green());
    }
    Ok(())
}
