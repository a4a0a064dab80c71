pub mod call;
pub mod hosts;
pub mod reset;
pub mod run;
pub mod setup;
pub mod validate;

use anyhow::{Context, Result};
use simply_config::{Config, parser};
use simply_core::platform::Platform;
use simply_core::registry::ProviderRegistry;
use std::path::Path;

/// Load and validate the configuration file
pub fn load(config_path: &Path) -> Result<Config> {
    parser::parse_file(config_path)
        .with_context(|| format!("Failed to parse configuration {}", config_path.display()))
}

/// Compose one platform, applying `key=value` overrides to its spec
pub fn compose(config: &Config, name: &str, overrides: &[String]) -> Result<Platform> {
    let spec = config.platform(name)?;
    let parsed = overrides
        .iter()
        .map(|o| parser::parse_override(o))
        .collect::<Result<Vec<_>, _>>()?;
    let spec = spec.with_overrides(parsed.iter().map(|(k, v)| (k.as_str(), v.clone())))?;

    ProviderRegistry::new()
        .compose(name, &spec)
        .with_context(|| format!("Failed to compose platform '{name}'"))
}
