use anyhow::{Context, Result, bail};
use command_executor::{CommandResult, ExecOptions};
use std::path::Path;

pub async fn run(
    config_path: &Path,
    platform: &str,
    command: &str,
    host: Option<&str>,
    echo: bool,
    overrides: &[String],
) -> Result<()> {
    let config = super::load(config_path)?;
    let platform = super::compose(&config, platform, overrides)?;

    let targets: Vec<&str> = match host {
        Some(id) => vec![id],
        None => platform.hosts().ids().collect(),
    };

    // One host at a time so each gets its own echo prefix
    let mut results = Vec::with_capacity(targets.len());
    for id in targets {
        let options = if echo {
            ExecOptions::new().echo_prefix(format!("{id}| "))
        } else {
            ExecOptions::new()
        };
        let result = platform
            .run_command(command, Some(id), options)
            .await
            .with_context(|| format!("Failed to run command on '{id}'"))?
            .into_single()
            .context("expected a single result")?;
        results.push((id, result));
    }

    if !echo {
        let prefixed = results.len() > 1;
        for (id, result) in &results {
            print_output(id, result, prefixed);
        }
    }

    let failed: Vec<String> = results
        .iter()
        .filter(|(_, r)| !r.success())
        .map(|(id, r)| format!("{id} (exit code {})", r.exit_code))
        .collect();
    if !failed.is_empty() {
        bail!("Command failed on {}", failed.join(", "));
    }
    Ok(())
}

fn print_output(id: &str, result: &CommandResult, prefixed: bool) {
    if !prefixed {
        print!("{}", result.stdout);
        eprint!("{}", result.stderr);
        return;
    }
    for line in result.stdout_lines() {
        println!("{id}| {line}");
    }
    for line in result.stderr.lines() {
        eprintln!("{id}| {line}");
    }
}
