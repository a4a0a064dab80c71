use anyhow::Result;
use comfy_table::Table;
use std::path::Path;

pub async fn run(config_path: &Path, platform: &str) -> Result<()> {
    let config = super::load(config_path)?;
    let platform = super::compose(&config, platform, &[])?;

    let mut table = Table::new();
    table.set_header(vec!["HOST", "ADDRESS"]);
    for host in platform.hosts().iter() {
        table.add_row(vec![host.id, host.address]);
    }

    println!(
        "Platform {} ({} on {})",
        platform.name(),
        platform.frontend().type_name(),
        platform.backend().type_name()
    );
    println!("{table}");
    Ok(())
}
