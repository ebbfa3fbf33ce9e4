use crate::utils;
use std::path::Path;

pub async fn handle(config_path: &Path, fleet: Option<&str>) -> anyhow::Result<()> {
    let project = utils::load_project(config_path)?;
    if let Some(id) = fleet
        && project.fleet(id).is_none()
    {
        anyhow::bail!("Unknown fleet: {}", id);
    }

    let (_, provisioned) = utils::run_pass(&project).await?;
    for declared in provisioned
        .iter()
        .filter(|p| fleet.is_none_or(|id| p.fleet.logical_id() == id))
    {
        println!("{}", declared.output.value);
    }
    Ok(())
}
