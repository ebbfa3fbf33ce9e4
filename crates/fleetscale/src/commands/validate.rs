use crate::utils;
use colored::Colorize;
use fleetscale_cloud_synth::SynthProvider;
use fleetscale_core::Provisioner;
use std::path::Path;

pub async fn handle(config_path: &Path) -> anyhow::Result<()> {
    println!("{}", "Validating configuration...".blue());
    println!("Configuration: {}", config_path.display().to_string().cyan());

    let project = utils::load_project(config_path)?;

    // Nothing is declared, the provider only has to exist
    let provider = SynthProvider::new(project.region.clone());
    let provisioner = Provisioner::new(&provider).with_base_dir(&project.base_dir);

    let mut failures = 0;
    for fleet in &project.fleets {
        let result = project
            .network_for(fleet)
            .and_then(|network| provisioner.validate(fleet, network));
        match result {
            Ok(bootstrap) => println!(
                "  {} {} ({} x {}..={}, {} byte user data)",
                "✓".green(),
                fleet.id.cyan(),
                fleet.instance_type,
                fleet.capacity.min(),
                fleet.capacity.max(),
                bootstrap.len()
            ),
            Err(e) => {
                failures += 1;
                println!("  {} {}: {}", "✗".red(), fleet.id.cyan(), e);
            }
        }
    }

    println!();
    if failures > 0 {
        anyhow::bail!("{} of {} fleet(s) failed validation", failures, project.fleets.len());
    }

    println!("{}", "✓ Configuration is valid".green().bold());
    println!("  Networks: {}", project.networks.len());
    println!("  Fleets: {}", project.fleets.len());
    Ok(())
}
