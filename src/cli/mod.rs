//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod check;
pub mod common;
pub mod run;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "autoupdate")]
#[command(version)]
#[command(about = "Keep host plugins up to date from their package registry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the configured packages and install updates until Ctrl-C
    Run {
        /// Config file (defaults to ~/.autoupdate/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Compare a package's installed version against its registry
    Check {
        /// Package name
        name: String,
        /// Registry to query instead of the configured one
        #[arg(long)]
        endpoint: Option<String>,
        /// Config file (defaults to ~/.autoupdate/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Run { config }) => {
            run::cmd_run(config).await?;
        }
        Some(Commands::Check {
            name,
            endpoint,
            config,
        }) => {
            check::cmd_check(&name, endpoint, config).await?;
        }
    }

    Ok(())
}
