use anyhow::{Context, Result};
use simply_config::parser;
use simply_core::capability::Args;
use std::path::Path;

pub async fn run(
    config_path: &Path,
    platform: &str,
    operation: &str,
    host: Option<&str>,
    args: &[String],
) -> Result<()> {
    let config = super::load(config_path)?;
    let platform = super::compose(&config, platform, &[])?;

    let mut kwargs = Args::new();
    for arg in args {
        let (key, value) = parser::parse_override(arg)?;
        kwargs.insert(key, value);
    }

    let result = platform
        .call(operation, host, &kwargs)
        .await
        .with_context(|| format!("'{operation}' failed on platform '{}'", platform.name()))?;
    println!("{}", serde_json::to_string_pretty(&result.into_json()?)?);
    Ok(())
}
