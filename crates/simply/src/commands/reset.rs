use anyhow::{Context, Result};
use simply_core::backends::ResetMode;
use std::path::Path;

pub async fn run(config_path: &Path, platform: &str, mode: ResetMode) -> Result<()> {
    let config = super::load(config_path)?;
    let mut platform = super::compose(&config, platform, &[])?;

    platform
        .reset(mode)
        .await
        .with_context(|| format!("Failed to reset platform '{}'", platform.name()))?;
    println!("✓ Platform {} reset ({mode})", platform.name());
    Ok(())
}
