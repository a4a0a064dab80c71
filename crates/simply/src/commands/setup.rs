use anyhow::{Context, Result};
use simply_core::backends::ResetMode;
use std::io::{self, Write};
use std::path::Path;

pub async fn run(config_path: &Path, platforms: Vec<String>, reset: Option<ResetMode>) -> Result<()> {
    let config = super::load(config_path)?;

    let names: Vec<String> = if platforms.is_empty() {
        config.setup_order().into_iter().map(str::to_string).collect()
    } else {
        platforms
    };

    println!("Setting up {} platforms...", names.len());
    for name in &names {
        let mut platform = super::compose(&config, name, &[])?;

        print!("Setting up {name}...");
        io::stdout().flush()?;
        match platform.setup(reset).await {
            Ok(()) => println!(" ✓"),
            Err(e) => {
                println!(" ✗");
                return Err(e).with_context(|| format!("Failed to set up platform '{name}'"));
            }
        }
    }

    Ok(())
}
