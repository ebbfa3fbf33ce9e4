use crate::utils;
use anyhow::Context;
use colored::Colorize;
use std::path::Path;

pub async fn handle(config_path: &Path, out: Option<&Path>) -> anyhow::Result<()> {
    let project = utils::load_project(config_path)?;
    let (provider, provisioned) = utils::run_pass(&project).await?;
    let template = serde_json::to_string_pretty(&provider.template().await?)?;

    match out {
        Some(path) => {
            std::fs::write(path, &template)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} {} fleet(s) written to {}",
                "✓".green(),
                provisioned.len(),
                path.display().to_string().cyan()
            );
        }
        None => println!("{}", template),
    }
    Ok(())
}
