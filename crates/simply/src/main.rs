//! `simply`: compose test platforms from a YAML file and drive their hosts

use anyhow::Result;
use clap::{Parser, Subcommand};
use simply_core::backends::ResetMode;
use std::path::PathBuf;
use tracing::Level;

mod commands;

#[derive(Parser)]
#[command(name = "simply")]
#[command(about = "Simply - compose test platforms and run operations on their hosts")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "platforms.yaml")]
    config: PathBuf,

    /// Log every command and lifecycle step
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    Validate,

    /// List the hosts of a platform
    Hosts {
        /// Platform name
        platform: String,
    },

    /// Prepare and start platforms
    Setup {
        /// Platforms to set up (empty means all, in sequence order)
        platforms: Vec<String>,

        /// Reset hosts first: stop, rm_container, rm_image or uproot
        #[arg(short, long)]
        reset: Option<ResetMode>,
    },

    /// Run a shell command on one host or on every host
    Run {
        /// Platform name
        platform: String,

        /// Shell command
        command: String,

        /// Only run on this host
        #[arg(long)]
        host: Option<String>,

        /// Stream output while the command runs
        #[arg(short, long)]
        echo: bool,

        /// Override a platform key for this run (key=value)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },

    /// Call an operation or read an attribute; prints JSON
    Call {
        /// Platform name
        platform: String,

        /// Operation or attribute name
        operation: String,

        /// Only call on this host
        #[arg(long)]
        host: Option<String>,

        /// Keyword argument (key=value)
        #[arg(short, long = "arg", value_name = "KEY=VALUE")]
        args: Vec<String>,
    },

    /// Stop or destroy the hosts of a platform
    Reset {
        /// Platform name
        platform: String,

        /// stop, rm_container, rm_image or uproot
        #[arg(short, long, default_value = "rm_container")]
        mode: ResetMode,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    smol::block_on(async {
        match cli.command {
            Commands::Validate => commands::validate::run(&cli.config).await,
            Commands::Hosts { platform } => commands::hosts::run(&cli.config, &platform).await,
            Commands::Setup { platforms, reset } => {
                commands::setup::run(&cli.config, platforms, reset).await
            }
            Commands::Run {
                platform,
                command,
                host,
                echo,
                overrides,
            } => {
                commands::run::run(&cli.config, &platform, &command, host.as_deref(), echo, &overrides)
                    .await
            }
            Commands::Call {
                platform,
                operation,
                host,
                args,
            } => commands::call::run(&cli.config, &platform, &operation, host.as_deref(), &args).await,
            Commands::Reset { platform, mode } => {
                commands::reset::run(&cli.config, &platform, mode).await
            }
        }
    })
}
