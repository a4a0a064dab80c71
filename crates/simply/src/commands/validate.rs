use anyhow::{Context, Result};
use simply_core::registry::ProviderRegistry;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating {}...", config_path.display());

    let config = super::load(config_path)?;

    // Composition checks provider names and provider-specific keys
    let registry = ProviderRegistry::new();
    for name in config.setup_order() {
        registry
            .compose_from(&config, name)
            .with_context(|| format!("Platform '{name}' is invalid"))?;
    }

    println!("✓ Configuration valid");
    if let Some(version) = &config.version {
        println!("  Version: {version}");
    }
    println!("  Platforms: {}", config.platforms.len());
    for name in config.setup_order() {
        let spec = config.platform(name)?;
        println!(
            "  - {name}: {} on {} ({} hosts, {} script operations)",
            spec.frontend,
            spec.backend,
            spec.hosts.len(),
            spec.operations.len()
        );
    }

    Ok(())
}
